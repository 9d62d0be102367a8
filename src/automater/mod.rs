//! Batched search-then-fetch automation
//!
//! An [`Automater`] is created with a list of search terms and started once.
//! A background task then walks the terms in windows of
//! [`set_max_retrieval`](Automater::set_max_retrieval) terms, searches each
//! window, fetches the matching records and hands the payload to a
//! [`PayloadParser`]. By default payloads go to the registered
//! [`OutputListener`]s, or to standard output when there are none.
//!
//! Failed searches or fetches are retried on the same window after the
//! pacing delay. Every failure counts against a budget shared by the whole
//! run; once the budget is exceeded the run aborts and the listeners receive
//! a single error notification.
//!
//! ```no_run
//! use eutils_automater::Automater;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let automater = Automater::new(["BRCA1", "TP53 mutation"])?;
//!     automater.set_max_retrieval(2)?;
//!
//!     // payloads are printed to stdout since no listener is registered
//!     let state = automater.start()?.await?;
//!     println!("Finished: {:?}", state);
//!     Ok(())
//! }
//! ```

mod batch;
mod listener;
mod pacing;
mod parser;
mod worker;

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{AutomaterError, Result};
use crate::eutils::{EntrezService, EutilsClient};

pub use batch::{SPACE_TOKEN, TERM_DELIMITER, Window, query_string, window_at};
pub use listener::{ListenerRegistry, OutputListener, ThreadListener};
pub use pacing::{MIN_SLEEP_PATTERN, Pacer};
pub use parser::{ListenerParser, OutputSink, PayloadParser};
pub use worker::{MAX_ERRORS_EXCEEDED, WORKER_PANICKED};

/// Largest number of terms sent in one search
pub const MAX_RETRIEVAL_LIMIT: usize = 100;

/// Default number of terms per search
pub const DEFAULT_MAX_RETRIEVAL: usize = 1;

/// Default number of tolerated failures before a run aborts
pub const DEFAULT_MAX_ERROR_COUNT: usize = 4;

/// Lifecycle of an automater run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RunState {
    /// Created, not started yet
    Idle = 0,
    Running = 1,
    /// Every term was processed
    Completed = 2,
    /// The error budget was exceeded
    Aborted = 3,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunState::Idle,
            1 => RunState::Running,
            2 => RunState::Completed,
            _ => RunState::Aborted,
        }
    }
}

/// State shared between the automater handle and its worker
pub(crate) struct Shared {
    pub(crate) terms: Arc<[String]>,
    /// Set by the first successful `start`
    started: AtomicBool,
    state: AtomicU8,
    max_retrieval: AtomicUsize,
    max_error_count: AtomicUsize,
    pub(crate) output_listeners: Arc<ListenerRegistry<dyn OutputListener>>,
    pub(crate) thread_listeners: ListenerRegistry<dyn ThreadListener>,
    parser: RwLock<Option<Arc<dyn PayloadParser>>>,
}

impl Shared {
    pub(crate) fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: RunState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn max_retrieval(&self) -> usize {
        self.max_retrieval.load(Ordering::Acquire)
    }

    pub(crate) fn max_error_count(&self) -> usize {
        self.max_error_count.load(Ordering::Acquire)
    }

    pub(crate) fn parser(&self) -> Option<Arc<dyn PayloadParser>> {
        self.parser
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Runs a list of search terms through search and fetch in paced batches
///
/// An automater is single-use: [`start`](Automater::start) succeeds once and
/// later calls fail with [`AutomaterError::IllegalState`].
pub struct Automater {
    shared: Arc<Shared>,
    service: Arc<dyn EntrezService>,
    sink: OutputSink,
    pacer: Arc<Pacer>,
}

impl Automater {
    /// Create an automater backed by the default E-utilities client
    ///
    /// # Errors
    ///
    /// * `AutomaterError::InvalidArgument` - If `terms` is empty
    /// * `AutomaterError::RequestError` - If the HTTP client cannot be built
    pub fn new<I, S>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terms = collect_terms(terms)?;
        let service = Arc::new(EutilsClient::new()?);
        Ok(Self::build(terms, service))
    }

    /// Create an automater backed by a custom search/fetch service
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use eutils_automater::{Automater, ClientConfig, EutilsClient};
    ///
    /// let client = EutilsClient::with_config(ClientConfig::new().with_tool("my-tool")).unwrap();
    /// let automater = Automater::with_service(["NM_000546"], Arc::new(client)).unwrap();
    /// assert!(!automater.is_running());
    /// ```
    pub fn with_service<I, S>(terms: I, service: Arc<dyn EntrezService>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terms = collect_terms(terms)?;
        Ok(Self::build(terms, service))
    }

    fn build(terms: Arc<[String]>, service: Arc<dyn EntrezService>) -> Self {
        Self {
            shared: Arc::new(Shared {
                terms,
                started: AtomicBool::new(false),
                state: AtomicU8::new(RunState::Idle as u8),
                max_retrieval: AtomicUsize::new(DEFAULT_MAX_RETRIEVAL),
                max_error_count: AtomicUsize::new(DEFAULT_MAX_ERROR_COUNT),
                output_listeners: Arc::new(ListenerRegistry::new()),
                thread_listeners: ListenerRegistry::new(),
                parser: RwLock::new(None),
            }),
            service,
            sink: OutputSink::stdout(),
            pacer: Arc::new(Pacer::default()),
        }
    }

    /// Write payloads to `writer` instead of stdout when no listener is registered
    pub fn with_output_sink(mut self, writer: impl std::io::Write + Send + 'static) -> Self {
        self.sink = OutputSink::new(writer);
        self
    }

    /// Override the delay between query cycles
    ///
    /// Defaults to [`MIN_SLEEP_PATTERN`], the interval NCBI asks automated
    /// clients to respect. Shorter intervals are meant for mirrors and tests.
    pub fn with_pacing_interval(mut self, interval: Duration) -> Self {
        self.pacer = Arc::new(Pacer::new(interval));
        self
    }

    /// Launch the background worker and return immediately
    ///
    /// Thread listeners receive `on_start` on the calling task, before the
    /// state becomes [`RunState::Running`]. The returned handle resolves to
    /// the terminal [`RunState`]. Failures during the run are reported
    /// through the output listeners only.
    ///
    /// # Errors
    ///
    /// * `AutomaterError::IllegalState` - If the automater was already started
    ///   or no tokio runtime is available
    pub fn start(&self) -> Result<JoinHandle<RunState>> {
        let runtime = Handle::try_current().map_err(|_| {
            AutomaterError::IllegalState("start requires a running tokio runtime".to_string())
        })?;

        if self.shared.started.swap(true, Ordering::AcqRel) {
            return Err(AutomaterError::IllegalState(format!(
                "automater cannot be restarted (state: {:?})",
                self.shared.state()
            )));
        }

        // thread listeners hear about the start before the run is visible as running
        self.shared.thread_listeners.notify_start();
        self.shared.set_state(RunState::Running);

        let worker = worker::Worker {
            shared: Arc::clone(&self.shared),
            service: Arc::clone(&self.service),
            pacer: Arc::clone(&self.pacer),
            default_parser: Arc::new(ListenerParser::new(
                Arc::clone(&self.shared.output_listeners),
                self.sink.clone(),
            )),
        };

        debug!(terms = self.shared.terms.len(), "Spawning automater worker");
        Ok(runtime.spawn(worker.run()))
    }

    /// Set how many terms are searched at once (1..=100)
    ///
    /// Takes effect from the next window when changed during a run.
    pub fn set_max_retrieval(&self, max: usize) -> Result<()> {
        if !(1..=MAX_RETRIEVAL_LIMIT).contains(&max) {
            return Err(AutomaterError::InvalidArgument(format!(
                "maximum retrieval must be between 1 and {}, got {}",
                MAX_RETRIEVAL_LIMIT, max
            )));
        }
        self.shared.max_retrieval.store(max, Ordering::Release);
        Ok(())
    }

    pub fn max_retrieval(&self) -> usize {
        self.shared.max_retrieval()
    }

    /// Set how many failures are tolerated before the run aborts
    ///
    /// The `count + 1`-th failure aborts the run.
    ///
    /// # Errors
    ///
    /// * `AutomaterError::IllegalState` - While the worker is running, whatever `count` is
    /// * `AutomaterError::InvalidArgument` - If `count` is zero
    pub fn set_max_error_count(&self, count: usize) -> Result<()> {
        if self.is_running() {
            return Err(AutomaterError::IllegalState(
                "cannot set the max error count after the worker has started".to_string(),
            ));
        }
        if count < 1 {
            return Err(AutomaterError::InvalidArgument(
                "maximum error count must be greater than zero".to_string(),
            ));
        }
        self.shared.max_error_count.store(count, Ordering::Release);
        Ok(())
    }

    pub fn max_error_count(&self) -> usize {
        self.shared.max_error_count()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state() == RunState::Running
    }

    pub fn state(&self) -> RunState {
        self.shared.state()
    }

    pub fn terms(&self) -> &[String] {
        &self.shared.terms
    }

    pub fn add_output_listener(&self, listener: Arc<dyn OutputListener>) {
        self.shared.output_listeners.add(listener);
    }

    pub fn remove_output_listener(&self, listener: &Arc<dyn OutputListener>) -> bool {
        self.shared.output_listeners.remove(listener)
    }

    pub fn add_thread_listener(&self, listener: Arc<dyn ThreadListener>) {
        self.shared.thread_listeners.add(listener);
    }

    pub fn remove_thread_listener(&self, listener: &Arc<dyn ThreadListener>) -> bool {
        self.shared.thread_listeners.remove(listener)
    }

    /// Install a custom payload parser, or restore the default with `None`
    ///
    /// While a custom parser is installed, output listeners receive no data
    /// notifications; notices and errors are unaffected.
    pub fn set_parser(&self, parser: Option<Arc<dyn PayloadParser>>) {
        *self
            .shared
            .parser
            .write()
            .unwrap_or_else(PoisonError::into_inner) = parser;
    }

    /// Cut the current pacing delay short
    pub fn interrupt_pacing(&self) {
        self.pacer.interrupt();
    }
}

fn collect_terms<I, S>(terms: I) -> Result<Arc<[String]>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let terms: Vec<String> = terms.into_iter().map(Into::into).collect();
    if terms.is_empty() {
        return Err(AutomaterError::InvalidArgument(
            "cannot perform an automated query on fewer than 1 term".to_string(),
        ));
    }
    Ok(terms.into())
}
