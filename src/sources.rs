//! Sensor sources polled by the acquisition loop.

use std::io::Read;

use chrono::Local;
use log::info;

use crate::model::{Particulate, SensorReading};
use crate::pms5003::Pms5003;
use crate::traits::{EnvironmentProbe, SensorError, SensorSource};

/// PMS5003 behind a reconnectable link.
///
/// `connect` builds a fresh driver from scratch; it runs once at startup and
/// again on every `reinitialize`.
pub struct ParticulateSource<P, C> {
    sensor: Option<Pms5003<P>>,
    connect: C,
}

impl<P, C> ParticulateSource<P, C>
where
    P: Read,
    C: FnMut() -> Result<Pms5003<P>, SensorError>,
{
    pub fn connect(mut connect: C) -> Result<Self, SensorError> {
        let sensor = connect()?;
        info!("PMS5003 connected");
        Ok(Self {
            sensor: Some(sensor),
            connect,
        })
    }

    #[cfg(test)]
    fn is_connected(&self) -> bool {
        self.sensor.is_some()
    }

    fn read_particulate(&mut self) -> Result<Particulate, SensorError> {
        let sensor = self.sensor.as_mut().ok_or(SensorError::Disconnected)?;
        Ok(sensor.read()?.particulate())
    }
}

impl<P, C> SensorSource for ParticulateSource<P, C>
where
    P: Read,
    C: FnMut() -> Result<Pms5003<P>, SensorError>,
{
    fn name(&self) -> &str {
        "PMS5003"
    }

    fn poll(&mut self) -> Result<SensorReading, SensorError> {
        let particulate = self.read_particulate()?;
        Ok(SensorReading::new(Local::now(), particulate, None))
    }

    fn reinitialize(&mut self) -> Result<(), SensorError> {
        // Release the old port before opening it again.
        self.sensor = None;
        self.sensor = Some((self.connect)()?);
        Ok(())
    }
}

/// Which half of a combined poll failed last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Particulate,
    Environment,
}

/// PMS5003 plus an environmental probe, read as one snapshot.
pub struct EnviroSource<P, C, E> {
    particulate: ParticulateSource<P, C>,
    environment: E,
    fault: Option<Fault>,
}

impl<P, C, E> EnviroSource<P, C, E>
where
    P: Read,
    C: FnMut() -> Result<Pms5003<P>, SensorError>,
    E: EnvironmentProbe,
{
    pub fn new(particulate: ParticulateSource<P, C>, environment: E) -> Self {
        Self {
            particulate,
            environment,
            fault: None,
        }
    }
}

impl<P, C, E> SensorSource for EnviroSource<P, C, E>
where
    P: Read,
    C: FnMut() -> Result<Pms5003<P>, SensorError>,
    E: EnvironmentProbe,
{
    fn name(&self) -> &str {
        "PMS5003+BME280"
    }

    fn poll(&mut self) -> Result<SensorReading, SensorError> {
        let particulate = self
            .particulate
            .read_particulate()
            .inspect_err(|_| self.fault = Some(Fault::Particulate))?;
        let environment = self
            .environment
            .measure()
            .inspect_err(|_| self.fault = Some(Fault::Environment))?;
        self.fault = None;
        Ok(SensorReading::new(
            Local::now(),
            particulate,
            Some(environment),
        ))
    }

    /// Re-establish whichever sensor failed the last poll. The other one
    /// keeps its link.
    fn reinitialize(&mut self) -> Result<(), SensorError> {
        match self.fault.take() {
            Some(Fault::Environment) => {
                info!("Reopening BME280");
                self.environment.reinitialize()
            }
            Some(Fault::Particulate) | None => self.particulate.reinitialize(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Environment;
    use crate::pms5003::tests::frame;
    use std::cell::Cell;
    use std::io::Cursor;

    struct FixedProbe {
        result: Result<Environment, ()>,
        reopens: usize,
    }

    impl FixedProbe {
        fn new(result: Result<Environment, ()>) -> Self {
            Self { result, reopens: 0 }
        }
    }

    impl EnvironmentProbe for FixedProbe {
        fn measure(&mut self) -> Result<Environment, SensorError> {
            self.result
                .map_err(|_| SensorError::Bus("i2c nack".into()))
        }

        fn reinitialize(&mut self) -> Result<(), SensorError> {
            self.reopens += 1;
            Ok(())
        }
    }

    const ENV: Environment = Environment {
        temperature: 20.5,
        pressure: 1001.0,
        humidity: 55.0,
    };

    #[test]
    fn particulate_source_polls_and_reconnects() {
        let mut connects = 0;
        let mut source = ParticulateSource::connect(|| {
            connects += 1;
            Ok(Pms5003::new(Cursor::new(frame([1, 2, 3], [0, 0, 0]))))
        })
        .unwrap();

        let reading = source.poll().unwrap();
        assert_eq!(reading.particulate().pm2_5, 2.0);
        assert!(reading.environment().is_none());

        // The cursor is drained; the next poll times out until reconnected.
        assert!(matches!(source.poll(), Err(SensorError::ReadTimeout)));
        source.reinitialize().unwrap();
        assert!(source.poll().is_ok());

        drop(source);
        assert_eq!(connects, 2);
    }

    #[test]
    fn failed_reinit_leaves_source_disconnected() {
        let mut attempts = 0;
        let mut source = ParticulateSource::connect(|| {
            attempts += 1;
            if attempts == 1 {
                Ok(Pms5003::new(Cursor::new(Vec::new())))
            } else {
                Err(SensorError::DeviceInit("no such device".into()))
            }
        })
        .unwrap();

        assert!(matches!(source.reinitialize(), Err(SensorError::DeviceInit(_))));
        assert!(!source.is_connected());
        assert!(matches!(source.poll(), Err(SensorError::Disconnected)));
    }

    #[test]
    fn enviro_source_yields_complete_snapshot() {
        let pms = ParticulateSource::connect(|| {
            Ok(Pms5003::new(Cursor::new(frame([4, 5, 6], [0, 0, 0]))))
        })
        .unwrap();
        let mut source = EnviroSource::new(pms, FixedProbe::new(Ok(ENV)));

        let reading = source.poll().unwrap();
        assert_eq!(reading.particulate().pm10, 6.0);
        assert_eq!(reading.environment(), Some(&ENV));
    }

    #[test]
    fn enviro_source_fails_whole_poll_when_probe_fails() {
        let pms = ParticulateSource::connect(|| {
            Ok(Pms5003::new(Cursor::new(frame([4, 5, 6], [0, 0, 0]))))
        })
        .unwrap();
        let mut source = EnviroSource::new(pms, FixedProbe::new(Err(())));

        assert!(matches!(source.poll(), Err(SensorError::Bus(_))));
    }

    #[test]
    fn probe_fault_reopens_probe_and_keeps_particulate_link() {
        let connects = Cell::new(0);
        let pms = ParticulateSource::connect(|| {
            connects.set(connects.get() + 1);
            Ok(Pms5003::new(Cursor::new(frame([4, 5, 6], [0, 0, 0]).repeat(3))))
        })
        .unwrap();
        let mut source = EnviroSource::new(pms, FixedProbe::new(Err(())));

        for _ in 0..3 {
            assert!(matches!(source.poll(), Err(SensorError::Bus(_))));
            source.reinitialize().unwrap();
        }

        assert_eq!(connects.get(), 1);
        assert_eq!(source.environment.reopens, 3);
    }

    #[test]
    fn particulate_fault_reconnects_pms_and_keeps_probe() {
        let connects = Cell::new(0);
        let pms = ParticulateSource::connect(|| {
            connects.set(connects.get() + 1);
            Ok(Pms5003::new(Cursor::new(Vec::new())))
        })
        .unwrap();
        let mut source = EnviroSource::new(pms, FixedProbe::new(Ok(ENV)));

        assert!(matches!(source.poll(), Err(SensorError::ReadTimeout)));
        source.reinitialize().unwrap();

        assert_eq!(connects.get(), 2);
        assert_eq!(source.environment.reopens, 0);
    }
}
