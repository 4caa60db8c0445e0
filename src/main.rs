//! AC Control Bridge: Main Entry Point
//!
//! Hexagonal architecture around a single control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  TwaiBus        LogEventSink   NvsAdapter    Esp32Time         │
//! │  (BusPort)      (EventSink)    (Config+NVS)                    │
//! │  WifiAdapter    WsBroadcaster  EspHttpServer MdnsAdapter       │
//! │  (Connectivity) (EventSink)    (/api, /ws)                     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AcService (pure logic)                    │    │
//! │  │  state record · frame codec · bus sweep                │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ApiBridge (httpd task ⇄ control loop) · event queue           │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{error, info, warn};

use accontrol::adapters::device_id::DeviceIdentity;
use accontrol::adapters::http_server;
use accontrol::adapters::log_sink::LogEventSink;
use accontrol::adapters::mdns::MdnsAdapter;
use accontrol::adapters::nvs::NvsAdapter;
use accontrol::adapters::time::Esp32TimeAdapter;
use accontrol::adapters::twai::TwaiBus;
use accontrol::adapters::wifi::{ConnectivityPort, WifiAdapter};
use accontrol::adapters::ws_push::{EspWsChannel, WsBroadcaster, WsClients};
use accontrol::api::ApiBridge;
use accontrol::app::ports::ConfigPort;
use accontrol::app::service::AcService;
use accontrol::config::{self, BuildOverrides, SystemConfig};
use accontrol::drivers::watchdog::Watchdog;
use accontrol::error::Error;
use accontrol::events::{self, push_event, Event};

const WIFI_CHECK_INTERVAL_MS: u64 = 1_000;
const SETTINGS_SAVE_CHECK_MS: u64 = 1_000;

/// Fires once every `interval_ms`.
struct Every {
    interval_ms: u64,
    next_ms: u64,
}

impl Every {
    fn new(interval_ms: u64, now_ms: u64) -> Self {
        Self {
            interval_ms,
            next_ms: now_ms + interval_ms,
        }
    }

    fn due(&mut self, now_ms: u64) -> bool {
        if now_ms < self.next_ms {
            return false;
        }
        self.next_ms = now_ms + self.interval_ms;
        true
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AC Control Bridge v{}            ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let watchdog = Watchdog::new();
    let time = Esp32TimeAdapter::new();

    // ── 2. Load config from NVS (seeded on first boot) ────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = if nvs.has_stored_config() {
        nvs.load().unwrap_or_else(|e| {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        })
    } else {
        let overrides = BuildOverrides::from_env();
        info!("First boot: seeding config ({:?})", overrides);
        config::seed(&nvs, &overrides).unwrap_or_else(|e| {
            error!("Config seeding failed ({}), using defaults", e);
            SystemConfig::default()
        })
    };

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let mut bus = TwaiBus::new(peripherals.can, &config).map_err(|e| {
        error!("TWAI init failed: {}", e);
        Error::from(e)
    })?;

    // ── 4. Network ────────────────────────────────────────────
    let mut wifi = WifiAdapter::new();
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs_partition))?;
    wifi.attach(BlockingWifi::wrap(esp_wifi, sysloop)?);

    let stored = nvs.wifi_credentials();
    let creds = match &stored {
        Some((ssid, pass)) => Some((ssid.as_str(), pass.as_str())),
        None => option_env!("ACCONTROL_WIFI_SSID")
            .map(|ssid| (ssid, option_env!("ACCONTROL_WIFI_PASS").unwrap_or(""))),
    };
    match creds {
        Some((ssid, pass)) => match wifi.set_credentials(ssid, pass) {
            Ok(()) => {
                if stored.is_none() && nvs.store_wifi_credentials(ssid, pass).is_err() {
                    warn!("WiFi credentials not persisted");
                }
                if let Err(e) = wifi.connect(time.uptime_ms()) {
                    warn!("WiFi: first connect failed ({}), retrying in background", e);
                }
            }
            Err(e) => error!("WiFi credentials rejected: {}", e),
        },
        None => warn!("No WiFi credentials; API unreachable until provisioned"),
    }

    let device = DeviceIdentity::read();
    info!("Device ID: {}", device);
    let mut mdns = MdnsAdapter::new(&device, config.http_port);
    if wifi.is_connected() {
        mdns.start();
    }

    // ── 5. Web API ────────────────────────────────────────────
    let bridge = Arc::new(ApiBridge::new());
    let ws_clients = Arc::new(WsClients::<EspWsChannel>::new(config.max_ws_clients));
    let _web = http_server::start(&config, bridge.clone(), ws_clients.clone())?;

    // ── 6. Application service ────────────────────────────────
    let mut service = AcService::new(&config);
    service.restore_settings(&nvs);

    let mut sink = (
        LogEventSink::new(),
        &*bridge,
        WsBroadcaster::new(ws_clients.clone()),
    );
    service.start(&mut sink);

    info!("System ready. Entering control loop.");

    // ── 7. Control loop ───────────────────────────────────────
    let now = time.uptime_ms();
    let mut status_timer = Every::new(u64::from(config.status_interval_secs) * 1000, now);
    let mut wifi_timer = Every::new(WIFI_CHECK_INTERVAL_MS, now);
    let mut save_timer = Every::new(SETTINGS_SAVE_CHECK_MS, now);

    loop {
        let now = time.uptime_ms();

        service.poll_bus(&mut bus, &mut sink);

        if status_timer.due(now) {
            push_event(Event::StatusTick);
        }
        if wifi_timer.due(now) {
            push_event(Event::WifiCheck);
        }
        if save_timer.due(now) {
            push_event(Event::SettingsSave);
        }
        push_event(Event::WatchdogTick);

        events::drain_events(|event| match event {
            Event::ApiCommand => {
                while let Some(cmd) = bridge.take_command() {
                    service.handle_command(cmd, &mut bus, &mut sink);
                }
            }

            Event::StatusTick => {
                let stats = service.stats();
                let clock = service
                    .last_clock()
                    .map_or_else(|| "unknown".to_string(), |c| c.to_string());
                info!(
                    "STATUS | up={}s | wifi={:?} rssi={:?} | ws={} | tx={} txfail={} rx={} decoded={} | clock={}",
                    time.uptime_secs(),
                    wifi.state(),
                    wifi.rssi(),
                    ws_clients.len(),
                    stats.sent,
                    stats.tx_failures,
                    stats.received,
                    stats.decoded,
                    clock,
                );
            }

            Event::WifiCheck => {
                wifi.poll(now);
                if wifi.is_connected() {
                    mdns.start();
                } else {
                    mdns.stop();
                }
            }

            Event::SettingsSave => {
                service.auto_save_if_needed(&mut nvs);
            }

            Event::WatchdogTick => watchdog.feed(),
        });

        // Commands whose wake-up event was dropped on a full queue.
        while let Some(cmd) = bridge.take_command() {
            service.handle_command(cmd, &mut bus, &mut sink);
        }

        service.tick(now, &mut bus, &mut sink);

        if events::queue_is_empty() {
            FreeRtos::delay_ms(config.control_loop_interval_ms);
        }
    }
}
