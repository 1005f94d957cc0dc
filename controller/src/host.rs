use std::{
    io::ErrorKind,
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use anyhow::Context;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tracing::{info, warn};

use lumapanel_common::{
    bring_up, process_request, sample_once, Controller, EnvironmentSensor, LightStrip,
    NetworkLink, PeripheralError, RenderedLines, RetryPolicy, Rgb, RuntimeConfig, SensorSample,
    ServeError, TextDisplay,
};

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_SIM_TEMP_C: f32 = 22.0;
const DEFAULT_SIM_HUMIDITY: f32 = 45.0;
const BRINGUP_FAILED_BANNER: &str = "Wi-Fi Failed";

type HostController = Controller<ConsoleLight, ConsoleDisplay>;

/// Logs color writes in place of the LED strip.
struct ConsoleLight;

impl LightStrip for ConsoleLight {
    fn set_color(&mut self, color: Rgb) -> Result<(), PeripheralError> {
        info!("[light] {color} {}", color.hex());
        Ok(())
    }
}

/// Logs painted lines in place of the OLED.
struct ConsoleDisplay;

impl TextDisplay for ConsoleDisplay {
    fn paint_lines(&mut self, lines: &RenderedLines) -> Result<(), PeripheralError> {
        if lines.is_empty() {
            info!("[display] cleared");
        }
        for (row, line) in lines.iter().enumerate() {
            info!("[display] {row}: {line}");
        }
        Ok(())
    }
}

/// Readings come from `LUMAPANEL_SIM_TEMP_C` / `LUMAPANEL_SIM_HUMIDITY`; the
/// value `off` simulates a sensor fault.
struct SimulatedSensor {
    temperature_c: Option<String>,
    humidity_pct: Option<String>,
}

impl SimulatedSensor {
    fn from_env() -> Self {
        Self {
            temperature_c: std::env::var("LUMAPANEL_SIM_TEMP_C").ok(),
            humidity_pct: std::env::var("LUMAPANEL_SIM_HUMIDITY").ok(),
        }
    }
}

impl EnvironmentSensor for SimulatedSensor {
    fn sample(&mut self) -> Result<SensorSample, PeripheralError> {
        Ok(SensorSample {
            temperature_c: simulated_reading(self.temperature_c.as_deref(), DEFAULT_SIM_TEMP_C)?,
            humidity_pct: simulated_reading(self.humidity_pct.as_deref(), DEFAULT_SIM_HUMIDITY)?,
        })
    }
}

fn simulated_reading(raw: Option<&str>, default: f32) -> Result<f32, PeripheralError> {
    match raw.map(str::trim) {
        None => Ok(default),
        Some("off") => Err(PeripheralError::Sensor("simulated fault".to_string())),
        Some(value) => value
            .parse::<f32>()
            .map_err(|_| PeripheralError::Sensor(format!("invalid simulated reading `{value}`"))),
    }
}

/// Off-target there is no radio; the link is up once the listener is bound.
struct ListenerLink {
    local: SocketAddr,
}

impl NetworkLink for ListenerLink {
    fn is_connected(&self) -> bool {
        true
    }

    fn local_address(&self) -> Option<String> {
        let ip = self.local.ip();
        if ip.is_unspecified() {
            Some(Ipv4Addr::LOCALHOST.to_string())
        } else {
            Some(ip.to_string())
        }
    }
}

struct ConfigStore {
    runtime_path: PathBuf,
}

impl ConfigStore {
    fn new() -> Self {
        let data_dir = std::env::var("LUMAPANEL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.lumapanel"));

        Self {
            runtime_path: data_dir.join("runtime.json"),
        }
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        match tokio::fs::read(&self.runtime_path).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!(
            "failed to load runtime config from {}: {err:#}",
            store.runtime_path.display()
        );
        RuntimeConfig::default()
    });
    runtime.sanitize();

    let mut controller = Controller::new(
        ConsoleLight,
        ConsoleDisplay,
        runtime.display,
        sample_once(&mut SimulatedSensor::from_env()),
    );
    if let Err(err) = controller.show_banner(&runtime.boot_message) {
        warn!("failed to paint boot message: {err}");
    }

    let port = std::env::var("LUMAPANEL_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_HTTP_PORT);
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind panel server at {addr}"))?;

    let mut link = ListenerLink {
        local: listener.local_addr()?,
    };
    let address = match bring_up(&mut link, RetryPolicy::from(&runtime.network), std::thread::sleep) {
        Ok(address) => address,
        Err(err) => {
            if let Err(paint_err) = controller.show_banner(BRINGUP_FAILED_BANNER) {
                warn!("failed to paint bring-up failure: {paint_err}");
            }
            return Err(err).context("network bring-up failed");
        }
    };

    info!("panel listening on http://{address}:{port}");
    serve(listener, &mut controller, runtime.server.read_buffer_bytes).await
}

/// Accepts one connection at a time. Connection failures are logged and
/// never end the loop.
async fn serve(
    listener: TcpListener,
    controller: &mut HostController,
    read_buffer_bytes: usize,
) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!("accept failed: {err}");
                continue;
            }
        };

        info!("connection from {peer}");
        match serve_connection(stream, controller, read_buffer_bytes).await {
            Ok(()) => {}
            Err(ServeError::Decode(err)) => warn!("closing {peer} without response: {err}"),
            Err(ServeError::Io(err)) => warn!("connection {peer} failed: {err}"),
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    controller: &mut HostController,
    read_buffer_bytes: usize,
) -> Result<(), ServeError> {
    let mut buffer = vec![0_u8; read_buffer_bytes];
    let len = stream.read(&mut buffer).await?;

    let response = process_request(controller, &buffer[..len])?;
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_reading_defaults_and_faults() {
        assert_eq!(simulated_reading(None, 22.0), Ok(22.0));
        assert_eq!(simulated_reading(Some(" 19.5 "), 22.0), Ok(19.5));
        assert!(simulated_reading(Some("off"), 22.0).is_err());
        assert!(simulated_reading(Some("warm"), 22.0).is_err());
    }

    #[test]
    fn unspecified_listener_reports_loopback() {
        let link = ListenerLink {
            local: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
        };

        assert!(link.is_connected());
        assert_eq!(link.local_address().as_deref(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn loads_partial_runtime_config() {
        let dir = std::env::temp_dir().join(format!("lumapanel-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("runtime.json"), br#"{"boot_message":"HI THERE"}"#)
            .await
            .unwrap();

        let store = ConfigStore {
            runtime_path: dir.join("runtime.json"),
        };
        let runtime = store.load_runtime_config().await.unwrap();

        assert_eq!(runtime.boot_message, "HI THERE");
        assert_eq!(runtime.server.port, 80);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn missing_runtime_config_uses_defaults() {
        let store = ConfigStore {
            runtime_path: PathBuf::from("/nonexistent/lumapanel/runtime.json"),
        };

        let runtime = store.load_runtime_config().await.unwrap();

        assert_eq!(runtime.boot_message, RuntimeConfig::default().boot_message);
    }

    #[tokio::test]
    async fn serves_one_request_over_tokio_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"GET /?r=255&g=128&b=0 HTTP/1.1\r\n\r\n")
                .await
                .unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();
            response
        });

        let mut controller = Controller::new(
            ConsoleLight,
            ConsoleDisplay,
            Default::default(),
            Default::default(),
        );
        let (stream, _) = listener.accept().await.unwrap();
        serve_connection(stream, &mut controller, 1024).await.unwrap();

        let response = client.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("#ff8000"));
        assert_eq!(controller.state().color(), Rgb::new(255, 128, 0));
    }
}
