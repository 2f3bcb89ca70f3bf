//! Business logic layer (hardware-independent)

use core::fmt::Write as _;
use std::io::Write;

use embassy_sync::{blocking_mutex::raw::RawMutex, signal::Signal};
use embassy_time::{Duration, Instant, with_timeout};
use log::{error, info, warn};
use thiserror::Error;

use crate::model::SensorReading;
use crate::severity::PmThresholds;
use crate::telemetry::{TelemetryError, TelemetryLog};
use crate::traits::{Frame, Renderer, SensorSource};

/// `HH:MM:SS`
pub type Runtime = heapless::String<16>;

/// Loop lifecycle. `Recovering` only holds while a failed source is being
/// reinitialized inside `step`, so between ticks `state()` reports
/// `Running` or `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Recovering,
    Stopped,
}

#[derive(Debug, Error)]
pub enum LoopError {
    #[error("telemetry log failed: {0}")]
    Telemetry(#[from] TelemetryError),
}

/// Format elapsed time like a wall clock; hours wrap at 24.
pub fn format_runtime(elapsed: Duration) -> Runtime {
    let secs = elapsed.as_secs();
    let mut buffer = Runtime::new();
    let _ = write!(
        buffer,
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    );
    buffer
}

/// Polls a source every tick, fans readings out to renderers and the log,
/// and recovers from sensor failures by reinitializing the source.
pub struct AcquisitionLoop<S, W: Write> {
    source: S,
    renderers: Vec<Box<dyn Renderer>>,
    log: TelemetryLog<W>,
    thresholds: PmThresholds,
    tick: Duration,
    started: Instant,
    state: LoopState,
}

impl<S: SensorSource, W: Write> AcquisitionLoop<S, W> {
    /// `started` is both the runtime epoch and the start of the log's rate
    /// limit, so the first record lands one log interval after it.
    pub fn new(
        source: S,
        mut log: TelemetryLog<W>,
        thresholds: PmThresholds,
        tick: Duration,
        started: Instant,
    ) -> Self {
        log.begin(started);
        Self {
            source,
            renderers: Vec::new(),
            log,
            thresholds,
            tick,
            started,
            state: LoopState::Running,
        }
    }

    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderers.push(Box::new(renderer));
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run one tick without sleeping: poll, then either fan out or recover.
    ///
    /// Returns the reading when the poll succeeded.
    pub fn step(&mut self, now: Instant) -> Result<Option<SensorReading>, LoopError> {
        match self.source.poll() {
            Ok(reading) => {
                self.publish(&reading, now)?;
                Ok(Some(reading))
            }
            Err(e) => {
                self.state = LoopState::Recovering;
                error!("{} {e}, reinitializing", self.source.name());
                if let Err(e) = self.source.reinitialize() {
                    error!("{} reinitialization failed: {e}", self.source.name());
                }
                self.state = LoopState::Running;
                Ok(None)
            }
        }
    }

    fn publish(&mut self, reading: &SensorReading, now: Instant) -> Result<(), LoopError> {
        let colors = self.thresholds.classify(reading.particulate());
        let runtime = format_runtime(now.saturating_duration_since(self.started));
        let frame = Frame {
            reading,
            colors,
            runtime: &runtime,
        };
        for renderer in self.renderers.iter_mut() {
            if let Err(e) = renderer.render(&frame) {
                warn!("{} renderer failed: {e}", renderer.name());
            }
        }
        self.log.maybe_append(reading, now)?;
        Ok(())
    }

    /// Loop until `stop` is signaled. The signal is checked before every
    /// poll and cuts the tick sleep short.
    pub async fn run<M: RawMutex>(&mut self, stop: &Signal<M, ()>) -> Result<(), LoopError> {
        info!(
            "Polling {} every {} ms, logging every {} ms",
            self.source.name(),
            self.tick.as_millis(),
            self.log.interval().as_millis()
        );
        let result = self.poll_until(stop).await;
        self.state = LoopState::Stopped;
        result
    }

    async fn poll_until<M: RawMutex>(&mut self, stop: &Signal<M, ()>) -> Result<(), LoopError> {
        loop {
            if stop.signaled() {
                return Ok(());
            }
            self.step(Instant::now())?;
            if with_timeout(self.tick, stop.wait()).await.is_ok() {
                return Ok(());
            }
        }
    }

    /// Give up the loop and hand back its log.
    pub fn into_log(self) -> TelemetryLog<W> {
        self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_is_clock_formatted() {
        assert_eq!(format_runtime(Duration::from_secs(0)).as_str(), "00:00:00");
        assert_eq!(format_runtime(Duration::from_secs(3_723)).as_str(), "01:02:03");
        assert_eq!(format_runtime(Duration::from_secs(86_400 + 61)).as_str(), "00:01:01");
    }
}
