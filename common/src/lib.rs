pub mod command;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod network;
pub mod peripherals;
pub mod render;
pub mod server;
pub mod state;

pub use command::{parse_request, Command};
pub use config::{DisplayLimits, RuntimeConfig, StaticAddressing};
pub use dispatch::{Controller, Outcome};
pub use display::{wrap_message, RenderedLines};
pub use error::{BringupError, ConfigError, DecodeError, ParseError, PeripheralError, ServeError};
pub use network::{bring_up, wait_for_link, RetryPolicy};
pub use peripherals::{sample_once, EnvironmentSensor, LightStrip, NetworkLink, TextDisplay};
pub use render::{http_response, render_page};
pub use server::{process_request, run_blocking, serve_connection};
pub use state::{DeviceState, Rgb, SensorSample, SensorSnapshot};
