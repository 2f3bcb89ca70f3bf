//! Fixed build configurations.

use embassy_time::Duration;

use crate::display::{PanelGeometry, Rotation};
use crate::model::SensorVariant;
use crate::severity::{PmThresholds, Thresholds};

/// Same numeric triple for every bucket, kept per bucket so they can diverge.
pub const PM_THRESHOLDS: PmThresholds = PmThresholds([
    Thresholds::new(1.0, 200.0, 1000.0),
    Thresholds::new(1.0, 200.0, 1000.0),
    Thresholds::new(1.0, 200.0, 1000.0),
]);

/// PMS5003 UART and control lines
#[derive(Debug, Clone, Copy)]
pub struct SerialConfig {
    pub device: &'static str,
    pub baud_rate: u32,
    /// Per-read transport timeout
    pub timeout: std::time::Duration,
    pub gpio_chip: &'static str,
    pub enable_line: u32,
    pub reset_line: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct PanelConfig {
    pub spi_device: &'static str,
    pub spi_speed_hz: u32,
    pub gpio_chip: &'static str,
    pub dc_line: u32,
    pub backlight_line: u32,
    pub geometry: PanelGeometry,
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub variant: SensorVariant,
    pub log_path: &'static str,
    pub log_interval: Duration,
    pub tick: Duration,
    /// Pause after sensor bring-up before the first poll
    pub settle: Duration,
    pub thresholds: PmThresholds,
    pub serial: SerialConfig,
    /// I2C bus of the BME280, dual-sensor build only
    pub i2c_bus: Option<&'static str>,
    pub panel: Option<PanelConfig>,
}

const SERIAL: SerialConfig = SerialConfig {
    device: "/dev/ttyAMA0",
    baud_rate: 9600,
    timeout: std::time::Duration::from_secs(4),
    gpio_chip: "/dev/gpiochip0",
    enable_line: 22,
    reset_line: 27,
};

const PANEL: PanelConfig = PanelConfig {
    spi_device: "/dev/spidev0.1",
    spi_speed_hz: 10_000_000,
    gpio_chip: "/dev/gpiochip0",
    dc_line: 9,
    backlight_line: 12,
    geometry: PanelGeometry {
        rotation: Rotation::Deg270,
        ..PanelGeometry::MINI_160X80
    },
};

impl Config {
    /// PMS5003 only, terminal output, a log row every tick.
    pub const PARTICULATE_ONLY: Config = Config {
        variant: SensorVariant::ParticulateOnly,
        log_path: "sensor_readings.csv",
        log_interval: Duration::from_secs(1),
        tick: Duration::from_secs(1),
        settle: Duration::from_secs(1),
        thresholds: PM_THRESHOLDS,
        serial: SERIAL,
        i2c_bus: None,
        panel: None,
    };

    /// PMS5003 + BME280 with the ST7735 panel, a log row every 5 s.
    pub const DUAL_SENSOR: Config = Config {
        variant: SensorVariant::ParticulateAndEnvironment,
        log_path: "sensor_readings.csv",
        log_interval: Duration::from_secs(5),
        tick: Duration::from_secs(1),
        settle: Duration::from_secs(1),
        thresholds: PM_THRESHOLDS,
        serial: SERIAL,
        i2c_bus: Some("/dev/i2c-1"),
        panel: Some(PANEL),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_log_at_different_rates() {
        assert_ne!(
            Config::PARTICULATE_ONLY.log_interval,
            Config::DUAL_SENSOR.log_interval
        );
        assert_eq!(Config::PARTICULATE_ONLY.log_interval, Config::PARTICULATE_ONLY.tick);
    }

    #[test]
    fn dual_panel_is_landscape() {
        let panel = Config::DUAL_SENSOR.panel.unwrap();
        assert_eq!(panel.geometry.logical_size(), (160, 80));
    }
}
