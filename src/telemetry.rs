//! Append-only CSV log of readings, written at most once per interval.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use embassy_time::{Duration, Instant};
use log::{debug, info};
use thiserror::Error;

use crate::model::{SensorReading, SensorVariant};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("log file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
}

pub struct TelemetryLog<W: Write> {
    writer: csv::Writer<W>,
    variant: SensorVariant,
    interval: Duration,
    last_write: Option<Instant>,
}

impl TelemetryLog<File> {
    /// Open `path` for appending, creating it if absent. The header row is
    /// only written when the file is empty.
    pub fn open(
        path: impl AsRef<Path>,
        variant: SensorVariant,
        interval: Duration,
    ) -> Result<Self, TelemetryError> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let fresh = file.metadata()?.len() == 0;
        info!(
            "Logging to {} ({})",
            path.display(),
            if fresh { "new file" } else { "appending" }
        );
        Self::new(file, fresh, variant, interval)
    }
}

impl<W: Write> TelemetryLog<W> {
    pub fn new(
        inner: W,
        write_header: bool,
        variant: SensorVariant,
        interval: Duration,
    ) -> Result<Self, TelemetryError> {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        let mut log = Self {
            writer,
            variant,
            interval,
            last_write: None,
        };
        if write_header {
            log.writer.write_record(variant.columns())?;
            log.writer.flush()?;
        }
        Ok(log)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the rate limit at `now`: the first record is due one interval
    /// later.
    pub fn begin(&mut self, now: Instant) {
        self.last_write = Some(now);
    }

    /// Whether a reading captured at `now` is due for the log.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_write {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Append `reading` if the interval has elapsed since the last write.
    /// Returns whether a record was written. A written record is flushed
    /// before returning.
    pub fn maybe_append(
        &mut self,
        reading: &SensorReading,
        now: Instant,
    ) -> Result<bool, TelemetryError> {
        if !self.is_due(now) {
            return Ok(false);
        }
        let record = self.record(reading);
        self.writer.write_record(&record)?;
        self.writer.flush()?;
        self.last_write = Some(now);
        debug!("Logged reading at {}", record[0]);
        Ok(true)
    }

    fn record(&self, reading: &SensorReading) -> Vec<String> {
        let mut record = Vec::with_capacity(self.variant.columns().len());
        record.push(reading.timestamp().format(TIMESTAMP_FORMAT).to_string());
        record.extend(reading.particulate().iter().map(|(_, v)| format!("{v:.2}")));
        if self.variant == SensorVariant::ParticulateAndEnvironment {
            match reading.environment() {
                Some(env) => record.extend(
                    [env.temperature, env.pressure, env.humidity].map(|v| format!("{v:.2}")),
                ),
                None => record.extend(std::iter::repeat_n(String::new(), 3)),
            }
        }
        record
    }

    /// Flush and release the destination.
    pub fn close(self) -> Result<(), TelemetryError> {
        self.into_inner().map(drop)
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W, TelemetryError> {
        self.writer
            .into_inner()
            .map_err(|e| TelemetryError::Io(std::io::Error::other(e.to_string())))
    }
}
