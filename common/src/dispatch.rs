use log::{debug, info, warn};

use crate::{
    command::Command,
    config::DisplayLimits,
    display::{wrap_message, RenderedLines},
    error::PeripheralError,
    peripherals::{LightStrip, TextDisplay},
    state::{DeviceState, Rgb, SensorSnapshot},
};

/// Result of applying one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Unchanged,
    Applied,
    /// State was updated but the peripheral write failed. The state is not
    /// rolled back, so the hardware may lag behind it until the next write.
    PeripheralFault(PeripheralError),
}

/// Sole owner of the device state and the output peripherals.
pub struct Controller<L, D> {
    state: DeviceState,
    limits: DisplayLimits,
    light: L,
    display: D,
}

impl<L: LightStrip, D: TextDisplay> Controller<L, D> {
    pub fn new(light: L, display: D, limits: DisplayLimits, sensor: SensorSnapshot) -> Self {
        Self {
            state: DeviceState::new(sensor, limits.max_chars),
            limits,
            light,
            display,
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn limits(&self) -> &DisplayLimits {
        &self.limits
    }

    pub fn light_mut(&mut self) -> &mut L {
        &mut self.light
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// Paints `message` without recording it as the last message. Used for
    /// boot and status banners.
    pub fn show_banner(&mut self, message: &str) -> Result<(), PeripheralError> {
        let lines = wrap_message(message, &self.limits);
        self.display.paint_lines(&lines)
    }

    pub fn apply(&mut self, command: Command) -> Outcome {
        match command {
            Command::SetColor { r, g, b } => self.apply_color(Rgb::clamped(r, g, b)),
            Command::SetMessage { text } => self.apply_message(&text),
            Command::None => Outcome::Unchanged,
        }
    }

    fn apply_color(&mut self, color: Rgb) -> Outcome {
        self.state.set_color(color);
        debug!("color set to {color} ({})", color.hex());

        match self.light.set_color(color) {
            Ok(()) => Outcome::Applied,
            Err(err) => {
                warn!("light strip out of sync with state: {err}");
                Outcome::PeripheralFault(err)
            }
        }
    }

    fn apply_message(&mut self, text: &str) -> Outcome {
        let stored = self.state.set_message(text);
        let lines: RenderedLines = wrap_message(stored, &self.limits);
        info!("display message `{stored}` ({} line(s))", lines.len());

        match self.display.paint_lines(&lines) {
            Ok(()) => Outcome::Applied,
            Err(err) => {
                warn!("display out of sync with state: {err}");
                Outcome::PeripheralFault(err)
            }
        }
    }
}
