//! Hardware abstraction traits

use thiserror::Error;

use crate::display::FrameBuffer;
use crate::model::{Environment, SensorReading};
use embedded_graphics::pixelcolor::Rgb888;

/// Failures of a sensor poll or of sensor bring-up.
#[derive(Debug, Error)]
pub enum SensorError {
    /// The transport did not answer inside its protocol window.
    #[error("read timeout")]
    ReadTimeout,

    /// Polled while no link is established (last reinit failed).
    #[error("sensor not connected")]
    Disconnected,

    /// Transport or bus fault other than a timeout.
    #[error("bus error: {0}")]
    Bus(String),

    /// Opening or resetting the device failed.
    #[error("device initialisation failed: {0}")]
    DeviceInit(String),
}

/// One physical sensor, or a fixed set of sensors polled together.
pub trait SensorSource {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Poll once. Either the whole snapshot is returned or the poll fails.
    fn poll(&mut self) -> Result<SensorReading, SensorError>;

    /// Drop the current link and establish it again from scratch.
    fn reinitialize(&mut self) -> Result<(), SensorError>;
}

/// Environmental sensor sampled as part of a combined poll
pub trait EnvironmentProbe {
    fn measure(&mut self) -> Result<Environment, SensorError>;

    /// Reopen the bus and configure the sensor again.
    fn reinitialize(&mut self) -> Result<(), SensorError>;
}

/// Everything a renderer needs for one tick.
pub struct Frame<'a> {
    pub reading: &'a SensorReading,
    /// Severity color per particulate bucket, indexed by `PmSize::index`
    pub colors: [Rgb888; 3],
    /// Elapsed runtime, `HH:MM:SS`
    pub runtime: &'a str,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct RenderError(pub String);

/// Presentation side effect run on every successful tick
pub trait Renderer {
    fn name(&self) -> &str;

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), RenderError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PanelError {
    #[error("SPI write failed")]
    Spi,
    #[error("GPIO write failed")]
    Pin,
    #[error("frame is {got:?}, panel expects {expected:?}")]
    Geometry {
        got: (u32, u32),
        expected: (u32, u32),
    },
}

/// Trait for pixel panels that take a whole frame at a time
pub trait PanelDisplay {
    /// Logical (post-rotation) size in pixels
    fn size(&self) -> (u32, u32);

    /// Replace the visible image with `frame`
    fn show(&mut self, frame: &FrameBuffer) -> Result<(), PanelError>;
}
