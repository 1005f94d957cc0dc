use thiserror::Error;

/// Why a request line could not be turned into a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing `{0}` parameter")]
    MissingParam(&'static str),
    #[error("malformed query pair `{0}`")]
    MalformedPair(String),
    #[error("invalid integer `{value}` for `{key}`")]
    InvalidNumber { key: &'static str, value: String },
    #[error("no value after `{0}` marker")]
    MissingValue(&'static str),
}

/// A driver write or read that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeripheralError {
    #[error("light strip write failed: {0}")]
    Light(String),
    #[error("display paint failed: {0}")]
    Display(String),
    #[error("sensor sample failed: {0}")]
    Sensor(String),
    #[error("network interface failed: {0}")]
    Network(String),
    #[error("{0} is not available")]
    Unavailable(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("request is not valid UTF-8: {0}")]
pub struct DecodeError(#[from] pub std::str::Utf8Error);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BringupError {
    #[error("network not connected after {attempts} attempt(s)")]
    NotConnected { attempts: u32 },
    #[error("network connected but no local address assigned")]
    NoAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("`{0}` is required when use_static_ip is true")]
    MissingStaticField(&'static str),
    #[error("subnet mask {0:?} is not contiguous")]
    InvalidMask([u8; 4]),
    #[error("gateway {gateway:?} is outside {ip:?}/{prefix_len}")]
    GatewayOutsideSubnet {
        ip: [u8; 4],
        gateway: [u8; 4],
        prefix_len: u8,
    },
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("connection i/o failed: {0}")]
    Io(#[from] std::io::Error),
}
