use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error, info, instrument, warn};

use super::batch::{Window, query_string, window_at};
use super::pacing::Pacer;
use super::parser::{ListenerParser, PayloadParser};
use super::{RunState, Shared};
use crate::error::Result;
use crate::eutils::EntrezService;

/// Message sent to output listeners when the error budget is exhausted
pub const MAX_ERRORS_EXCEEDED: &str = "Maximum error count exceeded - terminating queries.";

/// Message sent to output listeners when a search, fetch or parser panics
pub const WORKER_PANICKED: &str = "Query worker failed unexpectedly - terminating queries.";

/// Background task driving every window through search and fetch
pub(crate) struct Worker {
    pub(crate) shared: Arc<Shared>,
    pub(crate) service: Arc<dyn EntrezService>,
    pub(crate) pacer: Arc<Pacer>,
    pub(crate) default_parser: Arc<ListenerParser>,
}

impl Worker {
    /// Run to completion and return the terminal state
    ///
    /// The caller has already announced the start and moved the state to
    /// `Running`. A panic in the service or a parser aborts the run.
    #[instrument(skip(self), fields(terms = self.shared.terms.len()))]
    pub(crate) async fn run(self) -> RunState {
        info!("Automated queries started");

        let state = match AssertUnwindSafe(self.process()).catch_unwind().await {
            Ok(state) => state,
            Err(panic) => {
                error!(reason = panic_message(&*panic), "Worker panicked, aborting run");
                self.shared.output_listeners.notify_error(WORKER_PANICKED);
                RunState::Aborted
            }
        };

        self.shared.set_state(state);
        info!(state = ?state, "Automated queries finished");
        self.shared.thread_listeners.notify_finish(state);
        state
    }

    async fn process(&self) -> RunState {
        let total = self.shared.terms.len();
        let mut offset = 0;
        let mut errors = 0;

        while offset < total {
            let size = self.shared.max_retrieval();
            let window = window_at(offset, size, total);
            if window.len < size {
                debug!(remaining = window.len, "Flushing remaining terms as a final batch");
            }

            match self.process_window(window).await {
                Ok(found) => {
                    debug!(
                        start = window.start,
                        len = window.len,
                        records = found,
                        "Batch completed"
                    );
                    offset = window.end();
                }
                Err(err) => {
                    errors += 1;
                    let max_errors = self.shared.max_error_count();
                    if errors > max_errors {
                        error!(errors, max_errors, error = %err, "Error budget exhausted");
                        self.shared.output_listeners.notify_error(MAX_ERRORS_EXCEEDED);
                        return RunState::Aborted;
                    }

                    warn!(
                        start = window.start,
                        len = window.len,
                        errors,
                        max_errors,
                        error = %err,
                        "Batch failed, retrying after pacing delay"
                    );
                    self.shared.output_listeners.notify_notice(&format!(
                        "{} for terms {}..{} ({}/{} errors): {}",
                        err.failure_reason(),
                        window.start,
                        window.end(),
                        errors,
                        max_errors,
                        err
                    ));
                }
            }

            if offset < total {
                self.pacer.pace().await;
            }
        }

        RunState::Completed
    }

    /// Search one window and, when it matched anything, fetch and parse it
    ///
    /// Returns the number of identifiers found.
    async fn process_window(&self, window: Window) -> Result<usize> {
        let query = query_string(&self.shared.terms, window);
        let outcome = self.service.search(&query).await?;

        if outcome.is_empty() {
            debug!(query = %query, "Search returned no identifiers, skipping fetch");
            return Ok(0);
        }

        let payload = self.service.fetch(&outcome).await?;
        let parser: Arc<dyn PayloadParser> = match self.shared.parser() {
            Some(custom) => custom,
            None => self.default_parser.clone(),
        };
        parser.parse(payload).await?;

        Ok(outcome.ids.len())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
