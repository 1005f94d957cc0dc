use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayLimits {
    pub chars_per_line: usize,
    pub max_chars: usize,
    pub max_lines: usize,
}

impl Default for DisplayLimits {
    fn default() -> Self {
        Self {
            chars_per_line: 16,
            max_chars: 64,
            max_lines: 4,
        }
    }
}

impl DisplayLimits {
    /// The panel is 16 characters by 4 rows; limits may only shrink it.
    pub fn sanitize(&mut self) {
        let panel = Self::default();
        self.chars_per_line = self.chars_per_line.clamp(1, panel.chars_per_line);
        self.max_chars = self.max_chars.clamp(1, panel.max_chars);
        self.max_lines = self.max_lines.clamp(1, panel.max_lines);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub use_static_ip: bool,
    pub static_ip: Option<[u8; 4]>,
    pub gateway: Option<[u8; 4]>,
    pub subnet: Option<[u8; 4]>,
    pub dns: Option<[u8; 4]>,
    pub connect_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            use_static_ip: false,
            static_ip: None,
            gateway: None,
            subnet: None,
            dns: None,
            connect_attempts: 10,
            retry_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AccessPointConfig {
    pub enabled: bool,
    pub ssid: String,
    pub password: String,
    pub channel: u8,
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ssid: "lumapanel".to_string(),
            password: "lumapanel".to_string(),
            channel: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub read_buffer_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 80,
            read_buffer_bytes: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HardwareConfig {
    pub led_pin: i32,
    pub dht_pin: i32,
    pub i2c_sda_pin: i32,
    pub i2c_scl_pin: i32,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            led_pin: 48,
            dht_pin: 4,
            i2c_sda_pin: 8,
            i2c_scl_pin: 9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub network: NetworkConfig,
    pub access_point: AccessPointConfig,
    pub server: ServerConfig,
    pub display: DisplayLimits,
    pub hardware: HardwareConfig,
    pub boot_message: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            access_point: AccessPointConfig::default(),
            server: ServerConfig::default(),
            display: DisplayLimits::default(),
            hardware: HardwareConfig::default(),
            boot_message: "HELLO".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.network.sanitize();
        self.access_point.sanitize();
        self.server.sanitize();
        self.display.sanitize();
    }
}

/// Fixed IPv4 settings for the station interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticAddressing {
    pub ip: [u8; 4],
    pub gateway: [u8; 4],
    pub prefix_len: u8,
    pub dns: [u8; 4],
}

impl NetworkConfig {
    /// `None` when the station uses DHCP. DNS falls back to the gateway.
    pub fn static_addressing(&self) -> Result<Option<StaticAddressing>, ConfigError> {
        if !self.use_static_ip {
            return Ok(None);
        }

        let ip = self.static_ip.ok_or(ConfigError::MissingStaticField("static_ip"))?;
        let gateway = self.gateway.ok_or(ConfigError::MissingStaticField("gateway"))?;
        let subnet = self.subnet.ok_or(ConfigError::MissingStaticField("subnet"))?;

        let mask = u32::from_be_bytes(subnet);
        if mask.leading_ones() + mask.trailing_zeros() != 32 {
            return Err(ConfigError::InvalidMask(subnet));
        }
        let prefix_len = mask.leading_ones() as u8;

        if u32::from_be_bytes(ip) & mask != u32::from_be_bytes(gateway) & mask {
            return Err(ConfigError::GatewayOutsideSubnet {
                ip,
                gateway,
                prefix_len,
            });
        }

        Ok(Some(StaticAddressing {
            ip,
            gateway,
            prefix_len,
            dns: self.dns.unwrap_or(gateway),
        }))
    }

    pub fn sanitize(&mut self) {
        if self.connect_attempts == 0 {
            self.connect_attempts = 1;
        }
        self.retry_delay_ms = self.retry_delay_ms.clamp(100, 60_000);
    }
}

impl AccessPointConfig {
    pub fn sanitize(&mut self) {
        // WPA2 rejects passphrases shorter than eight characters.
        if self.password.len() < 8 {
            self.password = Self::default().password;
        }
        self.channel = self.channel.clamp(1, 13);
    }
}

impl ServerConfig {
    pub fn sanitize(&mut self) {
        self.read_buffer_bytes = self.read_buffer_bytes.clamp(64, 4096);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let raw = r#"{"network":{"wifi_ssid":"lab"},"server":{"port":8081}}"#;
        let config: RuntimeConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.network.wifi_ssid, "lab");
        assert_eq!(config.network.connect_attempts, 10);
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.read_buffer_bytes, 1024);
        assert_eq!(config.display, DisplayLimits::default());
        assert_eq!(config.hardware.led_pin, 48);
    }

    #[test]
    fn sanitize_repairs_out_of_range_values() {
        let mut config = RuntimeConfig::default();
        config.network.connect_attempts = 0;
        config.network.retry_delay_ms = 5;
        config.access_point.password = "short".to_string();
        config.access_point.channel = 40;
        config.server.read_buffer_bytes = 1;
        config.display.max_lines = 0;

        config.sanitize();

        assert_eq!(config.network.connect_attempts, 1);
        assert_eq!(config.network.retry_delay_ms, 100);
        assert_eq!(config.access_point.password, "lumapanel");
        assert_eq!(config.access_point.channel, 13);
        assert_eq!(config.server.read_buffer_bytes, 64);
        assert_eq!(config.display.max_lines, 1);
    }

    #[test]
    fn display_limits_never_exceed_the_panel() {
        let raw = r#"{"display":{"chars_per_line":40,"max_chars":200,"max_lines":9}}"#;
        let mut config: RuntimeConfig = serde_json::from_str(raw).unwrap();

        config.sanitize();

        assert_eq!(config.display, DisplayLimits::default());
    }

    #[test]
    fn smaller_display_limits_are_kept() {
        let mut limits = DisplayLimits {
            chars_per_line: 10,
            max_chars: 32,
            max_lines: 2,
        };

        limits.sanitize();

        assert_eq!(
            limits,
            DisplayLimits {
                chars_per_line: 10,
                max_chars: 32,
                max_lines: 2
            }
        );
    }

    fn static_network(subnet: [u8; 4], gateway: [u8; 4]) -> NetworkConfig {
        NetworkConfig {
            use_static_ip: true,
            static_ip: Some([192, 168, 1, 50]),
            gateway: Some(gateway),
            subnet: Some(subnet),
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn dhcp_has_no_static_addressing() {
        assert_eq!(NetworkConfig::default().static_addressing(), Ok(None));
    }

    #[test]
    fn static_addressing_defaults_dns_to_gateway() {
        let network = static_network([255, 255, 255, 0], [192, 168, 1, 1]);

        assert_eq!(
            network.static_addressing(),
            Ok(Some(StaticAddressing {
                ip: [192, 168, 1, 50],
                gateway: [192, 168, 1, 1],
                prefix_len: 24,
                dns: [192, 168, 1, 1],
            }))
        );
    }

    #[test]
    fn static_addressing_rejects_bad_settings() {
        let mut missing = static_network([255, 255, 255, 0], [192, 168, 1, 1]);
        missing.gateway = None;
        assert_eq!(
            missing.static_addressing(),
            Err(ConfigError::MissingStaticField("gateway"))
        );

        assert_eq!(
            static_network([255, 0, 255, 0], [192, 168, 1, 1]).static_addressing(),
            Err(ConfigError::InvalidMask([255, 0, 255, 0]))
        );

        assert_eq!(
            static_network([255, 255, 255, 0], [192, 168, 2, 1]).static_addressing(),
            Err(ConfigError::GatewayOutsideSubnet {
                ip: [192, 168, 1, 50],
                gateway: [192, 168, 2, 1],
                prefix_len: 24,
            })
        );
    }
}
