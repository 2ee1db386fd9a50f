//! CSV recorder keeping the newest rows on disk

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RecorderConfig;
use crate::types::{Frame, PacketSchema};
use crate::{Result, TelemetryError};

/// Rolling CSV log of decoded frames.
///
/// Holds at most `max_rows` rows and rewrites the whole file (header, then
/// rows oldest first) on each flush, so the file always shows the most recent
/// window of telemetry.
#[derive(Debug)]
pub struct CsvRecorder {
    path: PathBuf,
    columns: Vec<String>,
    rows: VecDeque<Vec<f64>>,
    max_rows: usize,
    /// Rows recorded since the last flush
    dirty: bool,
}

impl CsvRecorder {
    /// Create the file with its header row.
    pub fn create(path: impl Into<PathBuf>, columns: Vec<String>, max_rows: usize) -> Result<Self> {
        if columns.is_empty() {
            return Err(TelemetryError::config("recorder needs at least one column"));
        }
        if max_rows == 0 {
            return Err(TelemetryError::config("recorder.max_rows must be at least 1"));
        }

        let recorder =
            Self { path: path.into(), columns, rows: VecDeque::with_capacity(max_rows), max_rows, dirty: false };
        recorder.write_file()?;

        info!(path = %recorder.path.display(), columns = recorder.columns.len(), "Recording to CSV");
        Ok(recorder)
    }

    /// Create from configuration; without explicit columns every signal is
    /// recorded in element order.
    pub fn from_config(config: &RecorderConfig, schema: &PacketSchema) -> Result<Self> {
        let columns = match &config.columns {
            Some(columns) => columns.clone(),
            None => schema.signals_by_index().into_iter().map(|(name, _)| name.to_string()).collect(),
        };
        Self::create(&config.path, columns, config.max_rows)
    }

    /// Append a row for `frame`, evicting the oldest row when full.
    ///
    /// Columns the frame does not carry are written as 0.
    pub fn record(&mut self, frame: &Frame) {
        if self.rows.len() == self.max_rows {
            self.rows.pop_front();
        }
        self.rows.push_back(self.columns.iter().map(|column| frame.get_or_zero(column)).collect());
        self.dirty = true;
    }

    /// Rewrite the file if rows were recorded since the last flush.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.write_file()?;
        self.dirty = false;
        debug!(rows = self.rows.len(), "CSV flushed");
        Ok(())
    }

    /// Rows currently held.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows are held.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Path of the CSV file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self) -> Result<()> {
        let mut writer = csv::Writer::from_path(&self.path).map_err(|e| self.csv_error(e))?;
        writer.write_record(&self.columns).map_err(|e| self.csv_error(e))?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|value| value.to_string())).map_err(|e| self.csv_error(e))?;
        }
        writer.flush().map_err(|e| TelemetryError::file_error(self.path.clone(), e))?;
        Ok(())
    }

    /// I/O failures keep the file path; anything else is a CSV error.
    fn csv_error(&self, error: csv::Error) -> TelemetryError {
        match error.into_kind() {
            csv::ErrorKind::Io(source) => TelemetryError::file_error(self.path.clone(), source),
            other => TelemetryError::Parse {
                context: format!("CSV recorder {}", self.path.display()),
                details: format!("{other:?}"),
            },
        }
    }

    /// Record every frame seen on `frames`, flushing every `flush_interval`.
    ///
    /// Samples the hand-off slot, so frames published faster than the task is
    /// scheduled are skipped. Runs until `cancel` fires or the listener stops,
    /// then flushes one last time.
    pub fn spawn(
        mut self,
        mut frames: watch::Receiver<Option<Arc<Frame>>>,
        flush_interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = frames.changed() => {
                        if changed.is_err() {
                            debug!("Frame source closed, stopping recorder");
                            break;
                        }
                        let frame = frames.borrow_and_update().clone();
                        if let Some(frame) = frame {
                            self.record(&frame);
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.flush() {
                            warn!("CSV flush failed: {}", e);
                        }
                    }
                }
            }

            self.flush()?;
            info!(path = %self.path.display(), rows = self.rows.len(), "Recorder stopped");
            Ok(())
        })
    }
}
