use log::{info, warn};

use crate::{
    display::RenderedLines,
    error::PeripheralError,
    state::{Rgb, SensorSample, SensorSnapshot},
};

pub trait LightStrip {
    fn set_color(&mut self, color: Rgb) -> Result<(), PeripheralError>;
}

pub trait TextDisplay {
    /// Replaces whatever is on screen with `lines`. Empty clears the screen.
    fn paint_lines(&mut self, lines: &RenderedLines) -> Result<(), PeripheralError>;
}

pub trait EnvironmentSensor {
    fn sample(&mut self) -> Result<SensorSample, PeripheralError>;
}

pub trait NetworkLink {
    fn is_connected(&self) -> bool;
    fn local_address(&self) -> Option<String>;

    /// Only called once the station is up. Returns the access point address,
    /// or `None` when the link has no access point to offer.
    fn start_access_point(&mut self) -> Result<Option<String>, PeripheralError> {
        Ok(None)
    }
}

/// Takes the single startup reading. A failed sample leaves the readings
/// unavailable for the life of the process.
pub fn sample_once<S: EnvironmentSensor + ?Sized>(sensor: &mut S) -> SensorSnapshot {
    match sensor.sample() {
        Ok(sample) => {
            info!(
                "sensor: {:.1}°C, {:.1}% humidity",
                sample.temperature_c, sample.humidity_pct
            );
            SensorSnapshot::from(sample)
        }
        Err(err) => {
            warn!("sensor unavailable until reset: {err}");
            SensorSnapshot::unavailable()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FixedSensor(Result<SensorSample, PeripheralError>);

    impl EnvironmentSensor for FixedSensor {
        fn sample(&mut self) -> Result<SensorSample, PeripheralError> {
            self.0.clone()
        }
    }

    #[test]
    fn successful_sample_fills_both_readings() {
        let mut sensor = FixedSensor(Ok(SensorSample {
            temperature_c: 21.0,
            humidity_pct: 40.0,
        }));

        assert_eq!(
            sample_once(&mut sensor),
            SensorSnapshot {
                temperature_c: Some(21.0),
                humidity_pct: Some(40.0),
            }
        );
    }

    #[test]
    fn failed_sample_is_unavailable() {
        let mut sensor = FixedSensor(Err(PeripheralError::Sensor("timeout".to_string())));

        assert_eq!(sample_once(&mut sensor), SensorSnapshot::unavailable());
    }
}
