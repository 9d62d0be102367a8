//! Partitioning of the term list into query windows

use std::ops::Range;

/// Separator substituted for every run of whitespace inside a term
pub const SPACE_TOKEN: &str = "%20";

/// Delimiter placed between the terms of one window
pub const TERM_DELIMITER: char = ',';

/// Contiguous slice of the term list searched in a single round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub len: usize,
}

impl Window {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Render the terms of `window` as a single search argument
///
/// Each term is trimmed, internal whitespace runs collapse to `%20` and the
/// terms are joined with `,`. The caller keeps `window` inside `terms`.
///
/// ```
/// use eutils_automater::automater::{query_string, Window};
///
/// let terms = vec!["foo bar".to_string(), " baz  qux ".to_string()];
/// assert_eq!(query_string(&terms, Window::new(0, 2)), "foo%20bar,baz%20qux");
/// ```
pub fn query_string<S: AsRef<str>>(terms: &[S], window: Window) -> String {
    let mut query = String::new();
    for term in &terms[window.range()] {
        if !query.is_empty() {
            query.push(TERM_DELIMITER);
        }
        let words: Vec<&str> = term.as_ref().split_whitespace().collect();
        query.push_str(&words.join(SPACE_TOKEN));
    }
    query
}

/// Window of up to `size` terms starting at `offset`
///
/// The last window of a list is clamped to the terms that remain, so a list
/// of `total` terms is covered by `ceil(total / size)` windows.
pub fn window_at(offset: usize, size: usize, total: usize) -> Window {
    Window::new(offset, size.max(1).min(total.saturating_sub(offset)))
}
