use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener},
    thread,
    time::Duration,
};

use anyhow::{anyhow, Context};
use dht_sensor::dht11;
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use embedded_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration,
};
use esp_idf_hal::{
    delay::Ets,
    gpio::{AnyIOPin, AnyOutputPin, InputOutput, PinDriver, Pull},
    i2c::{I2cConfig, I2cDriver, I2C0},
    rmt::{config::TransmitConfig, FixedLengthSignal, PinState, Pulse, TxRmtDriver, CHANNEL0},
    units::FromValueType,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    ipv4::{
        ClientConfiguration as IpClientConfiguration, ClientSettings as IpClientSettings,
        Configuration as IpConfiguration, Mask, Subnet,
    },
    log::EspLogger,
    netif::{EspNetif, NetifConfiguration},
    nvs::{EspDefaultNvsPartition, EspNvs},
    sys::EspError,
    wifi::{BlockingWifi, EspWifi},
};
use log::{info, warn};
use ssd1306::{mode::BufferedGraphicsMode, prelude::*, I2CDisplayInterface, Ssd1306};

use lumapanel_common::{
    config::{AccessPointConfig, HardwareConfig, NetworkConfig},
    bring_up, run_blocking, sample_once, wrap_message, Controller, EnvironmentSensor,
    LightStrip, NetworkLink, PeripheralError, RenderedLines, RetryPolicy, Rgb, RuntimeConfig,
    SensorSample, TextDisplay,
};

const NVS_NAMESPACE: &str = "lumapanel";
const NVS_RUNTIME_KEY: &str = "runtime_json";

const BRINGUP_FAILED_BANNER: &str = "Wi-Fi Failed";
const DHT11_SETTLE_MS: u64 = 1_000;

const OLED_X_OFFSET: i32 = 5;
const OLED_LINE_HEIGHT: i32 = 16;

// WS2812 bit timings.
const T0H_NS: u64 = 350;
const T0L_NS: u64 = 800;
const T1H_NS: u64 = 700;
const T1L_NS: u64 = 600;

type OledDriver = Ssd1306<
    I2CInterface<I2cDriver<'static>>,
    DisplaySize128x64,
    BufferedGraphicsMode<DisplaySize128x64>,
>;

enum LightBackend {
    Rmt(TxRmtDriver<'static>),
    Disabled,
}

/// Single WS2812 pixel driven by one RMT channel.
struct NeoPixel {
    backend: LightBackend,
}

enum OledBackend {
    Ssd1306(Box<OledDriver>),
    Disabled,
}

/// 128x64 SSD1306 on I2C, four 16-pixel text rows.
struct Oled {
    backend: OledBackend,
    style: MonoTextStyle<'static, BinaryColor>,
}

struct Dht11 {
    pin: PinDriver<'static, AnyIOPin, InputOutput>,
    delay: Ets,
}

struct StationLink<'a> {
    wifi: &'a mut BlockingWifi<EspWifi<'static>>,
    client: ClientConfiguration,
    access_point: Option<AccessPointConfiguration>,
}

struct NvsStore {
    partition: EspDefaultNvsPartition,
}

impl NeoPixel {
    fn new(channel: CHANNEL0, pin: i32) -> anyhow::Result<Self> {
        if pin < 0 {
            return Err(anyhow!("invalid LED pin: {pin}"));
        }

        let config = TransmitConfig::new().clock_divider(1);
        let tx = TxRmtDriver::new(channel, unsafe { AnyOutputPin::new(pin) }, &config)
            .context("failed to init RMT LED driver")?;

        Ok(Self {
            backend: LightBackend::Rmt(tx),
        })
    }

    fn disabled() -> Self {
        Self {
            backend: LightBackend::Disabled,
        }
    }
}

fn write_pixel(tx: &mut TxRmtDriver<'static>, color: Rgb) -> Result<(), EspError> {
    let ticks_hz = tx.counter_clock()?;
    let zero = (
        Pulse::new_with_duration(ticks_hz, PinState::High, &Duration::from_nanos(T0H_NS))?,
        Pulse::new_with_duration(ticks_hz, PinState::Low, &Duration::from_nanos(T0L_NS))?,
    );
    let one = (
        Pulse::new_with_duration(ticks_hz, PinState::High, &Duration::from_nanos(T1H_NS))?,
        Pulse::new_with_duration(ticks_hz, PinState::Low, &Duration::from_nanos(T1L_NS))?,
    );

    // WS2812 expects green, red, blue, most significant bit first.
    let grb = (u32::from(color.g) << 16) | (u32::from(color.r) << 8) | u32::from(color.b);
    let mut signal = FixedLengthSignal::<24>::new();
    for bit in 0..24 {
        let pulses = if grb & (1 << (23 - bit)) != 0 {
            &one
        } else {
            &zero
        };
        signal.set(bit, pulses)?;
    }

    tx.start_blocking(&signal)
}

impl LightStrip for NeoPixel {
    fn set_color(&mut self, color: Rgb) -> Result<(), PeripheralError> {
        match &mut self.backend {
            LightBackend::Rmt(tx) => {
                write_pixel(tx, color).map_err(|err| PeripheralError::Light(err.to_string()))
            }
            LightBackend::Disabled => Err(PeripheralError::Unavailable("light strip")),
        }
    }
}

impl Oled {
    fn new(i2c: I2C0, hardware: &HardwareConfig) -> anyhow::Result<Self> {
        if hardware.i2c_sda_pin < 0 || hardware.i2c_scl_pin < 0 {
            return Err(anyhow!(
                "invalid I2C pins: sda={} scl={}",
                hardware.i2c_sda_pin,
                hardware.i2c_scl_pin
            ));
        }

        let config = I2cConfig::new().baudrate(400.kHz().into());
        let driver = I2cDriver::new(
            i2c,
            unsafe { AnyIOPin::new(hardware.i2c_sda_pin) },
            unsafe { AnyIOPin::new(hardware.i2c_scl_pin) },
            &config,
        )
        .context("failed to init I2C bus")?;

        let mut display = Ssd1306::new(
            I2CDisplayInterface::new(driver),
            DisplaySize128x64,
            DisplayRotation::Rotate0,
        )
        .into_buffered_graphics_mode();
        display
            .init()
            .map_err(|err| anyhow!("failed to init SSD1306: {err:?}"))?;

        Ok(Self {
            backend: OledBackend::Ssd1306(Box::new(display)),
            style: MonoTextStyle::new(&FONT_6X10, BinaryColor::On),
        })
    }

    fn disabled() -> Self {
        Self {
            backend: OledBackend::Disabled,
            style: MonoTextStyle::new(&FONT_6X10, BinaryColor::On),
        }
    }
}

impl TextDisplay for Oled {
    fn paint_lines(&mut self, lines: &RenderedLines) -> Result<(), PeripheralError> {
        let OledBackend::Ssd1306(display) = &mut self.backend else {
            return Err(PeripheralError::Unavailable("display"));
        };

        display.clear_buffer();
        let mut y = 0;
        for line in lines.iter() {
            Text::with_baseline(line, Point::new(OLED_X_OFFSET, y), self.style, Baseline::Top)
                .draw(&mut **display)
                .map_err(|err| PeripheralError::Display(format!("{err:?}")))?;
            y += OLED_LINE_HEIGHT;
        }

        display
            .flush()
            .map_err(|err| PeripheralError::Display(format!("{err:?}")))
    }
}

impl Dht11 {
    fn new(pin: i32) -> anyhow::Result<Self> {
        if pin < 0 {
            return Err(anyhow!("invalid DHT11 pin: {pin}"));
        }

        let mut pin = PinDriver::input_output_od(unsafe { AnyIOPin::new(pin) })?;
        pin.set_pull(Pull::Up)?;
        pin.set_high()?;

        Ok(Self { pin, delay: Ets })
    }
}

impl EnvironmentSensor for Dht11 {
    fn sample(&mut self) -> Result<SensorSample, PeripheralError> {
        self.pin
            .set_high()
            .map_err(|err| PeripheralError::Sensor(format!("line not released: {err}")))?;

        let reading = dht11::blocking::read(&mut self.delay, &mut self.pin)
            .map_err(|err| PeripheralError::Sensor(format!("{err:?}")))?;

        Ok(SensorSample {
            temperature_c: f32::from(reading.temperature),
            humidity_pct: f32::from(reading.relative_humidity),
        })
    }
}

/// Stands in when the sensor pin cannot be claimed.
struct MissingSensor;

impl EnvironmentSensor for MissingSensor {
    fn sample(&mut self) -> Result<SensorSample, PeripheralError> {
        Err(PeripheralError::Unavailable("DHT11"))
    }
}

impl NetworkLink for StationLink<'_> {
    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.is_up().unwrap_or(false)
    }

    fn local_address(&self) -> Option<String> {
        let info = self.wifi.wifi().sta_netif().get_ip_info().ok()?;
        (!info.ip.is_unspecified()).then(|| info.ip.to_string())
    }

    fn start_access_point(&mut self) -> Result<Option<String>, PeripheralError> {
        let Some(access_point) = self.access_point.clone() else {
            return Ok(None);
        };
        let network_err = |err: EspError| PeripheralError::Network(err.to_string());

        self.wifi
            .set_configuration(&Configuration::Mixed(self.client.clone(), access_point))
            .map_err(network_err)?;
        // Reapplying the station config may drop the association.
        if !self.is_connected() {
            self.wifi.wifi_mut().connect().map_err(network_err)?;
        }

        let info = self.wifi.wifi().ap_netif().get_ip_info().map_err(network_err)?;
        Ok(Some(info.ip.to_string()))
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let nvs_store = NvsStore {
        partition: nvs_partition.clone(),
    };

    let mut runtime = nvs_store.load_runtime_config().unwrap_or_else(|err| {
        warn!("failed to load runtime config from NVS: {err:#}");
        RuntimeConfig::default()
    });
    runtime.sanitize();
    ensure_wifi_defaults(&mut runtime);

    info!(
        "NVS config loaded: ssid=`{}`, static_ip={}, ap={}, port={}",
        runtime.network.wifi_ssid,
        runtime.network.use_static_ip,
        runtime.access_point.enabled,
        runtime.server.port,
    );

    let Peripherals {
        modem, rmt, i2c0, ..
    } = Peripherals::take()?;

    let mut display = Oled::new(i2c0, &runtime.hardware).unwrap_or_else(|err| {
        warn!("display unavailable, running without it: {err:#}");
        Oled::disabled()
    });
    if let Err(err) = display.paint_lines(&wrap_message(&runtime.boot_message, &runtime.display)) {
        warn!("failed to paint boot message: {err}");
    }
    info!("{}", runtime.boot_message);

    let light = NeoPixel::new(rmt.channel0, runtime.hardware.led_pin).unwrap_or_else(|err| {
        warn!("light strip unavailable, running without it: {err:#}");
        NeoPixel::disabled()
    });

    let sensor = match Dht11::new(runtime.hardware.dht_pin) {
        Ok(mut dht) => {
            thread::sleep(Duration::from_millis(DHT11_SETTLE_MS));
            sample_once(&mut dht)
        }
        Err(err) => {
            warn!("failed to claim DHT11 pin: {err:#}");
            sample_once(&mut MissingSensor)
        }
    };

    let mut controller = Controller::new(light, display, runtime.display, sensor);

    let client = client_configuration(&runtime.network)?;
    let access_point = if runtime.access_point.enabled {
        Some(access_point_configuration(&runtime.access_point)?)
    } else {
        None
    };

    let mut wifi = start_wifi(modem, sys_loop, nvs_partition, &runtime.network, &client)
        .context("wifi startup failed")?;
    let mut link = StationLink {
        wifi: &mut wifi,
        client,
        access_point,
    };
    let address = match bring_up(&mut link, RetryPolicy::from(&runtime.network), thread::sleep) {
        Ok(address) => address,
        Err(err) => {
            if let Err(paint_err) = controller.show_banner(BRINGUP_FAILED_BANNER) {
                warn!("failed to paint bring-up failure: {paint_err}");
            }
            return Err(err).context("network bring-up failed");
        }
    };
    info!("wifi connected, station address {address}");
    disable_wifi_power_save();

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, runtime.server.port));
    let listener = TcpListener::bind(addr)
        .with_context(|| format!("failed to bind panel server at {addr}"))?;
    info!("panel listening on http://{address}:{}", runtime.server.port);

    run_blocking(&listener, &mut controller, runtime.server.read_buffer_bytes)
}

fn ensure_wifi_defaults(runtime: &mut RuntimeConfig) {
    if runtime.network.wifi_ssid.is_empty() {
        if let Some(ssid) = option_env!("WIFI_SSID") {
            runtime.network.wifi_ssid = ssid.to_string();
        }
    }

    if runtime.network.wifi_pass.is_empty() {
        if let Some(pass) = option_env!("WIFI_PASS") {
            runtime.network.wifi_pass = pass.to_string();
        }
    }
}

fn ipv4_from_octets(ip: [u8; 4]) -> Ipv4Addr {
    Ipv4Addr::from(ip)
}

fn build_sta_netif(network: &NetworkConfig) -> anyhow::Result<Option<EspNetif>> {
    let Some(addressing) = network
        .static_addressing()
        .context("invalid static IP settings")?
    else {
        return Ok(None);
    };
    info!(
        "static IP {}/{} via {}",
        ipv4_from_octets(addressing.ip),
        addressing.prefix_len,
        ipv4_from_octets(addressing.gateway)
    );

    let conf = NetifConfiguration {
        ip_configuration: Some(IpConfiguration::Client(IpClientConfiguration::Fixed(
            IpClientSettings {
                ip: ipv4_from_octets(addressing.ip),
                subnet: Subnet {
                    gateway: ipv4_from_octets(addressing.gateway),
                    mask: Mask(addressing.prefix_len),
                },
                dns: Some(ipv4_from_octets(addressing.dns)),
                secondary_dns: None,
            },
        ))),
        ..NetifConfiguration::wifi_default_client()
    };

    Ok(Some(EspNetif::new_with_conf(&conf)?))
}

fn client_configuration(network: &NetworkConfig) -> anyhow::Result<ClientConfiguration> {
    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    Ok(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    })
}

fn access_point_configuration(
    access_point: &AccessPointConfig,
) -> anyhow::Result<AccessPointConfiguration> {
    Ok(AccessPointConfiguration {
        ssid: access_point
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("access point SSID too long"))?,
        password: access_point
            .password
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("access point password too long"))?,
        auth_method: AuthMethod::WPAWPA2Personal,
        channel: access_point.channel,
        ..Default::default()
    })
}

/// Starts the radio in station-only mode and issues a connect without
/// waiting for it.
fn start_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    network: &NetworkConfig,
    client: &ClientConfiguration,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;

    if let Some(sta_netif) = build_sta_netif(network)? {
        esp_wifi
            .swap_netif_sta(sta_netif)
            .context("failed to apply static IP netif configuration")?;
    }

    let mut wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;
    wifi.set_configuration(&Configuration::Client(client.clone()))?;
    wifi.start()?;
    info!("wifi started, connecting to `{}`", network.wifi_ssid);

    if let Err(err) = wifi.wifi_mut().connect() {
        warn!("wifi connect request failed: {err}");
    }

    Ok(wifi)
}

impl NvsStore {
    fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let nvs = EspNvs::new(self.partition.clone(), NVS_NAMESPACE, true)?;
        let mut buffer = vec![0_u8; 4096];

        match nvs.get_str(NVS_RUNTIME_KEY, &mut buffer)? {
            Some(value) => Ok(serde_json::from_str::<RuntimeConfig>(value)?),
            None => Ok(RuntimeConfig::default()),
        }
    }
}

fn disable_wifi_power_save() {
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_set_ps(0) };
    if rc == esp_idf_svc::sys::ESP_OK {
        info!("wifi power save disabled");
    } else {
        warn!("failed to disable wifi power save: esp_err_t={rc}");
    }
}
