use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use eutils_automater::{OutputListener, RunState, ThreadListener};
use tracing::{error, info, warn};

/// Appends every fetched payload to a file
pub struct FileListener {
    file: Mutex<File>,
}

impl FileListener {
    pub fn create(path: &Path, append: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .with_context(|| format!("Failed to open output file {}", path.display()))?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl OutputListener for FileListener {
    fn on_data(&self, data: &str) {
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = file.write_all(data.as_bytes()) {
            error!("Failed to write payload: {}", e);
        }
    }

    fn on_notice(&self, message: &str) {
        warn!("{}", message);
    }

    fn on_error(&self, message: &str) {
        error!("{}", message);
    }
}

/// Logs worker start and finish
pub struct ProgressLogger;

impl ThreadListener for ProgressLogger {
    fn on_start(&self) {
        info!("Started automated queries");
    }

    fn on_finish(&self, state: RunState) {
        info!(state = ?state, "Automated queries finished");
    }
}
