//! Raspberry Pi peripherals behind the sensor and panel abstractions.

use std::io::{self, Read};
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, anyhow};
use bme280::i2c::BME280;
use embedded_hal::digital::OutputPin;
use gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{CdevPin, Delay, I2cdev, SpidevDevice};
use log::info;
use serialport::{ClearBuffer, SerialPort};

use crate::config::{PanelConfig, SerialConfig};
use crate::display::St7735;
use crate::model::Environment;
use crate::pms5003::Pms5003;
use crate::traits::{EnvironmentProbe, SensorError};

const CONSUMER: &str = "envlog";
const RESET_PULSE: Duration = Duration::from_millis(100);

fn output_line(chip: &str, line: u32, initial: u8) -> Result<CdevPin, SensorError> {
    let init = |e: gpio_cdev::Error| SensorError::DeviceInit(format!("{chip} line {line}: {e}"));
    let handle = Chip::new(chip)
        .map_err(init)?
        .get_line(line)
        .map_err(init)?
        .request(LineRequestFlags::OUTPUT, initial, CONSUMER)
        .map_err(init)?;
    CdevPin::new(handle).map_err(init)
}

/// Serial port plus the control lines that must stay claimed while the
/// PMS5003 is in use.
pub struct PmsLink {
    port: Box<dyn SerialPort>,
    _enable: CdevPin,
    _reset: CdevPin,
}

impl Read for PmsLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

/// Power up and reset the PMS5003, then open its UART with any stale bytes
/// discarded.
pub fn connect_pms5003(cfg: &SerialConfig) -> Result<Pms5003<PmsLink>, SensorError> {
    let mut enable = output_line(cfg.gpio_chip, cfg.enable_line, 1)?;
    let mut reset = output_line(cfg.gpio_chip, cfg.reset_line, 1)?;
    let pin = |_| SensorError::DeviceInit("PMS5003 control line write failed".into());
    enable.set_high().map_err(pin)?;
    reset.set_low().map_err(pin)?;
    sleep(RESET_PULSE);
    reset.set_high().map_err(pin)?;

    let port = serialport::new(cfg.device, cfg.baud_rate)
        .timeout(cfg.timeout)
        .open()
        .map_err(|e| SensorError::DeviceInit(format!("{}: {e}", cfg.device)))?;
    port.clear(ClearBuffer::Input)
        .map_err(|e| SensorError::DeviceInit(format!("{}: {e}", cfg.device)))?;

    info!("PMS5003 on {} at {} baud", cfg.device, cfg.baud_rate);
    Ok(Pms5003::new(PmsLink {
        port,
        _enable: enable,
        _reset: reset,
    }))
}

/// BME280 on Linux I2C.
pub struct Bme280Probe {
    bus: String,
    sensor: BME280<I2cdev>,
    delay: Delay,
}

impl Bme280Probe {
    pub fn open(bus: &str) -> Result<Self, SensorError> {
        let i2c = I2cdev::new(bus).map_err(|e| SensorError::DeviceInit(format!("{bus}: {e}")))?;
        let mut sensor = BME280::new_primary(i2c);
        let mut delay = Delay;
        sensor
            .init(&mut delay)
            .map_err(|e| SensorError::DeviceInit(format!("BME280: {e:?}")))?;
        info!("BME280 on {bus}");
        Ok(Self {
            bus: bus.to_owned(),
            sensor,
            delay,
        })
    }
}

impl EnvironmentProbe for Bme280Probe {
    fn measure(&mut self) -> Result<Environment, SensorError> {
        let m = self
            .sensor
            .measure(&mut self.delay)
            .map_err(|e| SensorError::Bus(format!("BME280: {e:?}")))?;
        Ok(Environment {
            temperature: m.temperature,
            pressure: m.pressure / 100.0,
            humidity: m.humidity,
        })
    }

    fn reinitialize(&mut self) -> Result<(), SensorError> {
        let bus = self.bus.clone();
        *self = Self::open(&bus)?;
        Ok(())
    }
}

pub type PanelHardware = St7735<SpidevDevice, CdevPin, CdevPin>;

/// Open and initialise the ST7735.
pub fn open_panel(cfg: &PanelConfig) -> anyhow::Result<PanelHardware> {
    let mut spi = SpidevDevice::open(cfg.spi_device)
        .map_err(|e| anyhow!("{e:?}"))
        .with_context(|| format!("opening {}", cfg.spi_device))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(cfg.spi_speed_hz)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.0
        .configure(&options)
        .with_context(|| format!("configuring {}", cfg.spi_device))?;

    let dc = output_line(cfg.gpio_chip, cfg.dc_line, 0).context("panel DC line")?;
    let backlight =
        output_line(cfg.gpio_chip, cfg.backlight_line, 0).context("panel backlight line")?;

    let mut panel = St7735::new(spi, dc, backlight, cfg.geometry);
    panel.init(&mut Delay).context("initialising ST7735")?;
    info!("ST7735 on {}", cfg.spi_device);
    Ok(panel)
}
