//! Plantower PMS5003 frame reader.
//!
//! The sensor streams 32-byte frames over a 9600 baud UART:
//! `0x42 0x4D`, a big-endian length (28), 13 big-endian data words and a
//! 16-bit additive checksum of every preceding byte.

use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::model::{Particulate, PmSize};
use crate::traits::SensorError;

const START_OF_FRAME: [u8; 2] = [0x42, 0x4D];
const FRAME_LENGTH: u16 = 28;
/// How long to hunt for a start of frame before giving up.
pub const READ_WINDOW: Duration = Duration::from_secs(5);

/// One decoded PMS5003 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pms5003Data {
    /// PM1.0 / PM2.5 / PM10 [μg/m³], standard particle (CF=1)
    pub standard: [u16; 3],
    /// PM1.0 / PM2.5 / PM10 [μg/m³], atmospheric environment
    pub atmospheric: [u16; 3],
    /// Particles beyond 0.3, 0.5, 1.0, 2.5, 5.0 and 10 μm per 0.1 L of air
    pub counts: [u16; 6],
}

impl Pms5003Data {
    /// Decode the 28 bytes following the length field.
    ///
    /// `None` when the checksum does not match.
    pub fn parse(length: [u8; 2], payload: &[u8; FRAME_LENGTH as usize]) -> Option<Self> {
        let expected = u16::from_be_bytes([payload[26], payload[27]]);
        let sum = START_OF_FRAME
            .iter()
            .chain(length.iter())
            .chain(payload[..26].iter())
            .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)));
        if sum != expected {
            return None;
        }

        let word = |i: usize| u16::from_be_bytes([payload[i * 2], payload[i * 2 + 1]]);
        Some(Self {
            standard: [word(0), word(1), word(2)],
            atmospheric: [word(3), word(4), word(5)],
            counts: [word(6), word(7), word(8), word(9), word(10), word(11)],
        })
    }

    pub fn pm_ug_per_m3(&self, size: PmSize, atmospheric: bool) -> u16 {
        if atmospheric {
            self.atmospheric[size.index()]
        } else {
            self.standard[size.index()]
        }
    }

    /// Standard (CF=1) concentrations
    pub fn particulate(&self) -> Particulate {
        let pm = |size| f32::from(self.pm_ug_per_m3(size, false));
        Particulate {
            pm1_0: pm(PmSize::Pm1_0),
            pm2_5: pm(PmSize::Pm2_5),
            pm10: pm(PmSize::Pm10),
        }
    }
}

pub struct Pms5003<P> {
    port: P,
    window: Duration,
}

impl<P: Read> Pms5003<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            window: READ_WINDOW,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Read the next valid frame.
    ///
    /// Frames with a bad length or checksum are skipped. Fails with
    /// `ReadTimeout` when the port stops answering or no valid frame
    /// arrives inside the read window.
    pub fn read(&mut self) -> Result<Pms5003Data, SensorError> {
        let deadline = Instant::now() + self.window;
        loop {
            if Instant::now() > deadline {
                return Err(SensorError::ReadTimeout);
            }
            self.seek_start_of_frame(deadline)?;

            let mut length = [0u8; 2];
            self.fill(&mut length)?;
            if u16::from_be_bytes(length) != FRAME_LENGTH {
                warn!("PMS5003 frame length {} ignored", u16::from_be_bytes(length));
                continue;
            }

            let mut payload = [0u8; FRAME_LENGTH as usize];
            self.fill(&mut payload)?;
            match Pms5003Data::parse(length, &payload) {
                Some(data) => {
                    debug!("PMS5003 frame {:?}", data);
                    return Ok(data);
                }
                None => warn!("PMS5003 checksum mismatch, frame dropped"),
            }
        }
    }

    fn seek_start_of_frame(&mut self, deadline: Instant) -> Result<(), SensorError> {
        let mut matched = 0;
        let mut byte = [0u8; 1];
        while matched < START_OF_FRAME.len() {
            if Instant::now() > deadline {
                return Err(SensorError::ReadTimeout);
            }
            self.fill(&mut byte)?;
            matched = match (matched, byte[0]) {
                (0, b) if b == START_OF_FRAME[0] => 1,
                (1, b) if b == START_OF_FRAME[1] => 2,
                (1, b) if b == START_OF_FRAME[0] => 1,
                _ => 0,
            };
        }
        Ok(())
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), SensorError> {
        self.port.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::TimedOut | ErrorKind::UnexpectedEof | ErrorKind::WouldBlock => {
                SensorError::ReadTimeout
            }
            _ => SensorError::Bus(e.to_string()),
        })
    }
}
