//! # eutils-automater
//!
//! Batch automation of NCBI E-utilities searches. A list of search terms is
//! split into windows, each window is searched with ESearch, the matching
//! records are fetched with EFetch and the payloads are streamed to
//! registered listeners.
//!
//! ## Features
//!
//! - **Batched queries**: up to 100 terms per search, remaining terms flushed as a final batch
//! - **Paced requests**: a fixed courtesy delay between query cycles
//! - **Error budget**: transient failures are retried on the same batch until a threshold is hit
//! - **Listener fan-out**: data, notices and errors delivered to any number of observers
//! - **Pluggable parsing**: replace the default fan-out with a custom payload parser
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use eutils_automater::{Automater, OutputListener};
//!
//! struct Printer;
//!
//! impl OutputListener for Printer {
//!     fn on_data(&self, data: &str) {
//!         println!("{} bytes of records", data.len());
//!     }
//!
//!     fn on_error(&self, message: &str) {
//!         eprintln!("aborted: {}", message);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let automater = Automater::new(["NM_000546", "NM_007294", "NM_000059"])?;
//!     automater.set_max_retrieval(2)?;
//!     automater.add_output_listener(Arc::new(Printer));
//!
//!     let state = automater.start()?.await?;
//!     println!("Run finished: {:?}", state);
//!     Ok(())
//! }
//! ```

pub mod automater;
pub mod config;
pub mod error;
pub mod eutils;

// Re-export main types for convenience
pub use automater::{
    Automater, ListenerRegistry, OutputListener, PayloadParser, RunState, ThreadListener,
};
pub use config::{ClientConfig, EntrezParameters};
pub use error::{AutomaterError, Result};
pub use eutils::{EntrezService, EutilsClient, Payload, SearchOutcome};
