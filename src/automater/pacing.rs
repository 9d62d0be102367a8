//! Fixed-interval pacing between remote call cycles

use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::debug;

/// Minimum courtesy interval between NCBI query cycles
pub const MIN_SLEEP_PATTERN: Duration = Duration::from_millis(3000);

/// Blocking-free delay applied by the worker after each batch attempt
///
/// [`Pacer::interrupt`] ends a pending delay early; the worker treats that
/// exactly like an elapsed delay.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    interrupt: Notify,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(MIN_SLEEP_PATTERN)
    }
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            interrupt: Notify::new(),
        }
    }

    /// Wait for the pacing interval or until interrupted
    pub async fn pace(&self) {
        if self.interval.is_zero() {
            return;
        }

        tokio::select! {
            _ = sleep(self.interval) => {}
            _ = self.interrupt.notified() => {
                debug!("Pacing delay interrupted");
            }
        }
    }

    /// Wake the delay currently in progress, if any
    pub fn interrupt(&self) {
        self.interrupt.notify_waiters();
    }
}
