//! Consumption of fetched payloads

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::listener::{ListenerRegistry, OutputListener};
use crate::error::Result;
use crate::eutils::Payload;

/// Strategy consuming the payload of each successful fetch
///
/// Installing a custom parser on the automater replaces the default data
/// fan-out; output listeners then receive no data notifications unless the
/// parser forwards them itself.
#[async_trait]
pub trait PayloadParser: Send + Sync {
    async fn parse(&self, payload: Payload) -> Result<()>;
}

/// Destination for payloads when no output listener is registered
#[derive(Clone)]
pub struct OutputSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn write_payload(&self, text: &str) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(text.as_bytes())?;
        writer.flush()
    }
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::stdout()
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink").finish_non_exhaustive()
    }
}

/// Default parser: forwards each payload as one unit to the output
/// listeners, or to the output sink when none are registered
pub struct ListenerParser {
    listeners: Arc<ListenerRegistry<dyn OutputListener>>,
    sink: OutputSink,
}

impl ListenerParser {
    pub fn new(listeners: Arc<ListenerRegistry<dyn OutputListener>>, sink: OutputSink) -> Self {
        Self { listeners, sink }
    }
}

#[async_trait]
impl PayloadParser for ListenerParser {
    async fn parse(&self, payload: Payload) -> Result<()> {
        let raw = payload.read_to_string().await?;

        // every line newline-terminated, CRLF normalised
        let mut text = String::with_capacity(raw.len() + 1);
        for line in raw.lines() {
            text.push_str(line);
            text.push('\n');
        }

        // listeners and the sink write synchronously, keep them off the async workers
        let listeners = Arc::clone(&self.listeners);
        let sink = self.sink.clone();
        tokio::task::spawn_blocking(move || {
            let notified = listeners.notify_data(&text);
            if notified == 0 {
                debug!(bytes = text.len(), "No output listeners, writing payload to sink");
                sink.write_payload(&text)?;
            }
            Ok::<_, io::Error>(())
        })
        .await
        .map_err(io::Error::other)??;

        Ok(())
    }
}
