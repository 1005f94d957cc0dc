use std::fmt;

use crate::display::truncate_chars;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Saturates each raw channel into `0..=255`.
    pub fn clamped(r: i64, g: i64, b: i64) -> Self {
        Self {
            r: clamp_channel(r),
            g: clamp_channel(g),
            b: clamp_channel(b),
        }
    }

    /// `#rrggbb`, lowercase.
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

pub fn clamp_channel(value: i64) -> u8 {
    // Lossless after the clamp.
    value.clamp(0, 255) as u8
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Last known sensor values. `None` renders as "unavailable".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorSnapshot {
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
}

impl SensorSnapshot {
    pub const fn unavailable() -> Self {
        Self {
            temperature_c: None,
            humidity_pct: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.temperature_c.is_some() || self.humidity_pct.is_some()
    }
}

impl From<SensorSample> for SensorSnapshot {
    fn from(sample: SensorSample) -> Self {
        Self {
            temperature_c: Some(sample.temperature_c),
            humidity_pct: Some(sample.humidity_pct),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    color: Rgb,
    last_message: String,
    sensor: SensorSnapshot,
    max_message_chars: usize,
}

impl DeviceState {
    pub fn new(sensor: SensorSnapshot, max_message_chars: usize) -> Self {
        Self {
            color: Rgb::default(),
            last_message: String::new(),
            sensor,
            max_message_chars,
        }
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    pub fn sensor(&self) -> SensorSnapshot {
        self.sensor
    }

    pub fn max_message_chars(&self) -> usize {
        self.max_message_chars
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.color = color;
    }

    /// Stores at most `max_message_chars` characters of `message` and
    /// returns what was kept.
    pub fn set_message(&mut self, message: &str) -> &str {
        self.last_message.clear();
        self.last_message
            .push_str(truncate_chars(message, self.max_message_chars));
        &self.last_message
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new(SensorSnapshot::unavailable(), 64)
    }
}
