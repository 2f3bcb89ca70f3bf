// Model of the data read in this app

use chrono::{DateTime, Local};

/// Particle size buckets reported by the particulate sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmSize {
    Pm1_0,
    Pm2_5,
    Pm10,
}

impl PmSize {
    pub const ALL: [PmSize; 3] = [PmSize::Pm1_0, PmSize::Pm2_5, PmSize::Pm10];

    pub fn label(self) -> &'static str {
        match self {
            PmSize::Pm1_0 => "PM1.0",
            PmSize::Pm2_5 => "PM2.5",
            PmSize::Pm10 => "PM10",
        }
    }

    pub fn index(self) -> usize {
        match self {
            PmSize::Pm1_0 => 0,
            PmSize::Pm2_5 => 1,
            PmSize::Pm10 => 2,
        }
    }
}

/// Mass concentrations in µg/m³, at full sensor precision.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Particulate {
    pub pm1_0: f32,
    pub pm2_5: f32,
    pub pm10: f32,
}

impl Particulate {
    pub fn get(&self, size: PmSize) -> f32 {
        match size {
            PmSize::Pm1_0 => self.pm1_0,
            PmSize::Pm2_5 => self.pm2_5,
            PmSize::Pm10 => self.pm10,
        }
    }

    /// Buckets in display and log column order.
    pub fn iter(&self) -> impl Iterator<Item = (PmSize, f32)> + '_ {
        PmSize::ALL.into_iter().map(move |size| (size, self.get(size)))
    }
}

/// Temperature, pressure and humidity from the environmental sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    /// °C
    pub temperature: f32,
    /// hPa
    pub pressure: f32,
    /// %RH
    pub humidity: f32,
}

/// Which sensors a build carries. Drives log columns and terminal layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorVariant {
    ParticulateOnly,
    ParticulateAndEnvironment,
}

impl SensorVariant {
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            SensorVariant::ParticulateOnly => &["Timestamp", "PM1.0", "PM2.5", "PM10"],
            SensorVariant::ParticulateAndEnvironment => &[
                "Timestamp",
                "PM1.0",
                "PM2.5",
                "PM10",
                "Temperature",
                "Pressure",
                "Humidity",
            ],
        }
    }
}

/// Snapshot of one successful polling cycle.
///
/// Only built from a complete poll; fields are private so a reading cannot be
/// patched after capture.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    timestamp: DateTime<Local>,
    particulate: Particulate,
    environment: Option<Environment>,
}

impl SensorReading {
    pub fn new(
        timestamp: DateTime<Local>,
        particulate: Particulate,
        environment: Option<Environment>,
    ) -> Self {
        Self {
            timestamp,
            particulate,
            environment,
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn particulate(&self) -> &Particulate {
        &self.particulate
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }
}
