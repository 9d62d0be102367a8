//! Search and fetch collaborators backed by NCBI E-utilities
//!
//! The automater only talks to the [`EntrezService`] trait. [`EutilsClient`]
//! is the production implementation; tests substitute their own.

mod client;
mod responses;

use std::fmt;
use std::io::Cursor;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

pub use client::EutilsClient;

/// Result of resolving a query string to record identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Record identifiers returned by the search
    pub ids: Vec<String>,
    /// Total number of matching records reported by the server
    pub count: usize,
    /// History server session, when the search was posted to it
    pub webenv: Option<String>,
    pub query_key: Option<String>,
}

impl SearchOutcome {
    /// Outcome holding only an identifier list
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        Self {
            count: ids.len(),
            ids,
            webenv: None,
            query_key: None,
        }
    }

    /// True when the search matched nothing worth fetching
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Byte stream of a fetch response
///
/// The payload is consumed exactly once by a
/// [`PayloadParser`](crate::automater::PayloadParser).
pub struct Payload {
    reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl Payload {
    pub fn new(reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            reader: Box::pin(reader),
        }
    }

    /// In-memory payload, mostly useful for tests and custom services
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(Cursor::new(text.into().into_bytes()))
    }

    /// Read the whole payload as UTF-8 text
    pub async fn read_to_string(mut self) -> Result<String> {
        let mut text = String::new();
        self.reader.read_to_string(&mut text).await?;
        Ok(text)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload").finish_non_exhaustive()
    }
}

/// Remote search-then-fetch collaborator
///
/// Either call may fail with a transient error; the automater counts and
/// retries those failures itself, so implementations should not retry.
#[async_trait]
pub trait EntrezService: Send + Sync {
    /// Resolve a query string to record identifiers
    async fn search(&self, term: &str) -> Result<SearchOutcome>;

    /// Retrieve the full records for a previous search
    async fn fetch(&self, outcome: &SearchOutcome) -> Result<Payload>;
}
