//! Process setup shared by the binaries: logging, signal handling, hardware
//! bring-up and the acquisition loop.

use std::io::Write;

use anyhow::Context;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use embassy_time::{Instant, Timer};
use log::{info, warn};

use crate::config::Config;
use crate::display::PanelRenderer;
use crate::hardware::{self, Bme280Probe};
use crate::logic::AcquisitionLoop;
use crate::sources::{EnviroSource, ParticulateSource};
use crate::telemetry::TelemetryLog;
use crate::terminal::TerminalRenderer;
use crate::traits::SensorSource;

/// Raised by SIGINT/SIGTERM.
pub static STOP: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// `RUST_LOG`-driven logger, `info` by default, timestamps in local time.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<8} {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .init();
}

pub async fn run(config: &Config) -> anyhow::Result<()> {
    ctrlc::set_handler(|| STOP.signal(())).context("installing signal handler")?;
    let started = Instant::now();

    let serial = config.serial;
    let pms = ParticulateSource::connect(move || hardware::connect_pms5003(&serial))
        .context("connecting PMS5003")?;

    match config.i2c_bus {
        Some(bus) => {
            let probe = Bme280Probe::open(bus).context("opening BME280")?;
            acquire(EnviroSource::new(pms, probe), config, started).await
        }
        None => acquire(pms, config, started).await,
    }
}

async fn acquire<S: SensorSource>(
    source: S,
    config: &Config,
    started: Instant,
) -> anyhow::Result<()> {
    let log = TelemetryLog::open(config.log_path, config.variant, config.log_interval)
        .with_context(|| format!("opening {}", config.log_path))?;

    let mut acquisition = AcquisitionLoop::new(source, log, config.thresholds, config.tick, started)
        .with_renderer(TerminalRenderer::stdout());
    if let Some(panel) = &config.panel {
        match hardware::open_panel(panel) {
            Ok(display) => acquisition = acquisition.with_renderer(PanelRenderer::new(display)),
            Err(e) => warn!("Panel unavailable, terminal only: {e:#}"),
        }
    }

    Timer::after(config.settle).await;
    acquisition.run(&STOP).await?;
    acquisition.into_log().close()?;
    info!("Program interrupted. Exiting...");
    Ok(())
}
