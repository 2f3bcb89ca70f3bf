//! Particulate and environment telemetry for a Raspberry Pi.
//!
//! A single cooperative loop polls the sensors once per tick, renders the
//! latest reading to the terminal (and optionally an ST7735 panel) and
//! appends it to a CSV log at a fixed rate.

pub mod app;
pub mod config;
pub mod display;
pub mod hardware;
pub mod logic;
pub mod model;
pub mod pms5003;
pub mod severity;
pub mod sources;
pub mod telemetry;
pub mod terminal;
pub mod traits;
