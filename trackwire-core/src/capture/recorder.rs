//! Append-only capture writer.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::{CaptureError, RX_TIME_FIELD};

/// Writes accepted messages to a JSON Lines capture file.
///
/// Every record is flushed as soon as it is written. The file handle is
/// released by [`CaptureRecorder::stop`] or, failing that, when the recorder
/// is dropped.
#[derive(Debug, Default)]
pub struct CaptureRecorder {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    records_written: u64,
}

impl CaptureRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `path` for a new capture, truncating any previous content.
    ///
    /// An already running capture is stopped first.
    ///
    /// # Errors
    ///
    /// - `CaptureError::Open` - If the file cannot be created or opened for writing
    pub fn start(&mut self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
        let path = path.as_ref();
        self.stop();

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|source| CaptureError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        self.writer = Some(BufWriter::new(file));
        self.path = Some(path.to_path_buf());
        self.records_written = 0;
        tracing::info!(path = %path.display(), "Capture recording started");
        Ok(())
    }

    /// Appends one message annotated with `rx_time`. No-op while stopped.
    ///
    /// # Errors
    ///
    /// - `CaptureError::Serialize` - If the record cannot be encoded
    /// - `CaptureError::Write` - If writing or flushing the file fails
    pub fn write(&mut self, message: &Map<String, Value>, rx_time: f64) -> Result<(), CaptureError> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        let mut record = message.clone();
        record.insert(RX_TIME_FIELD.to_string(), Value::from(rx_time));

        serde_json::to_writer(&mut *writer, &record)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        self.records_written += 1;
        Ok(())
    }

    /// Flushes and releases the capture file. Safe to call when stopped.
    pub fn stop(&mut self) {
        let Some(mut writer) = self.writer.take() else {
            return;
        };

        if let Err(error) = writer.flush() {
            tracing::warn!(%error, "Failed to flush capture file on stop");
        }
        if let Some(path) = self.path.take() {
            tracing::info!(
                path = %path.display(),
                records = self.records_written,
                "Capture recording stopped"
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Path of the running capture, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Records written since the last `start`.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

impl Drop for CaptureRecorder {
    fn drop(&mut self) {
        self.stop();
    }
}
