//! Value to color grading.
//!
//! Each metric has three thresholds `[low, mid, high]`. At or below `low` the
//! color is pure green; between `low` and `mid` it blends green to yellow;
//! between `mid` and `high` yellow to red; above `high` it stays red.

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

use crate::model::{Particulate, PmSize};

pub const COLOR_GOOD: Rgb888 = Rgb888::new(0, 255, 0);
pub const COLOR_WARNING: Rgb888 = Rgb888::new(255, 255, 0);
pub const COLOR_CRITICAL: Rgb888 = Rgb888::new(255, 0, 0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl Thresholds {
    pub const fn new(low: f32, mid: f32, high: f32) -> Self {
        Self { low, mid, high }
    }
}

/// Thresholds per particulate bucket, indexed by `PmSize::index`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmThresholds(pub [Thresholds; 3]);

impl PmThresholds {
    pub fn get(&self, size: PmSize) -> Thresholds {
        self.0[size.index()]
    }

    pub fn classify(&self, pm: &Particulate) -> [Rgb888; 3] {
        PmSize::ALL.map(|size| classify(pm.get(size), self.get(size)))
    }
}

/// Map `value` onto the green/yellow/red ramp defined by `t`.
///
/// Total over every `f32`; NaN compares false everywhere and ends up red.
pub fn classify(value: f32, t: Thresholds) -> Rgb888 {
    if value <= t.low {
        COLOR_GOOD
    } else if value <= t.mid {
        blend(COLOR_GOOD, COLOR_WARNING, value, t.low, t.mid)
    } else if value <= t.high {
        blend(COLOR_WARNING, COLOR_CRITICAL, value, t.mid, t.high)
    } else {
        COLOR_CRITICAL
    }
}

fn blend(from: Rgb888, to: Rgb888, value: f32, start: f32, end: f32) -> Rgb888 {
    let span = end - start;
    if span <= 0.0 {
        return to;
    }
    let scale = ((value - start) / span).clamp(0.0, 1.0);
    Rgb888::new(
        channel(from.r(), to.r(), scale),
        channel(from.g(), to.g(), scale),
        channel(from.b(), to.b(), scale),
    )
}

// Truncates toward zero, like an integer cast of the blended channel.
fn channel(from: u8, to: u8, scale: f32) -> u8 {
    let from = f32::from(from);
    (from + (f32::from(to) - from) * scale) as u8
}
