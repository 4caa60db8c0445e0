//! System configuration parameters
//!
//! All tunable parameters for the AC control bridge.
//! Values can be overridden via NVS (non-volatile storage). A unit with
//! nothing stored is seeded from build-time overrides on first boot.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigPort;
use crate::error::{Error, Result};
use crate::pins;
use crate::protocol::FrameIds;

/// Sockets httpd may hold open: lwIP's pool (`CONFIG_LWIP_MAX_SOCKETS=16`)
/// minus the three httpd keeps for its own control channel.
pub const HTTPD_SOCKET_LIMIT: usize = 13;

/// Sockets kept free for `/api` requests on top of the WebSocket clients.
pub const API_SOCKET_RESERVE: usize = 3;

/// Supported TWAI bit rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusBitrate {
    Kbps125,
    Kbps250,
    Kbps500,
}

impl BusBitrate {
    pub fn kbps(self) -> u32 {
        match self {
            Self::Kbps125 => 125,
            Self::Kbps250 => 250,
            Self::Kbps500 => 500,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Bus ---
    /// TWAI TX pin (to transceiver TXD)
    pub can_tx_gpio: i32,
    /// TWAI RX pin (from transceiver RXD)
    pub can_rx_gpio: i32,
    pub can_bitrate: BusBitrate,
    /// Identifiers of the controller's frames
    pub frame_ids: FrameIds,
    /// Log every received frame before decoding (bus sniffing)
    pub log_raw_frames: bool,

    // --- Web API ---
    /// HTTP port for `/api` and `/ws`
    pub http_port: u16,
    /// Concurrent WebSocket push clients
    pub max_ws_clients: u8,

    // --- Bus exercise ---
    /// Seconds between sweep steps; 0 disables the sweep
    pub sweep_interval_secs: u32,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Status log interval (seconds)
    pub status_interval_secs: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Bus
            can_tx_gpio: pins::CAN_TX_GPIO,
            can_rx_gpio: pins::CAN_RX_GPIO,
            can_bitrate: BusBitrate::Kbps125,
            frame_ids: FrameIds::default(),
            log_raw_frames: false,

            // Web API
            http_port: 80,
            max_ws_clients: 8,

            // Bus exercise
            sweep_interval_secs: 0,

            // Timing
            control_loop_interval_ms: 10, // 100 Hz bus poll
            status_interval_secs: 60,     // 1/min
        }
    }
}

impl SystemConfig {
    pub fn sweep_enabled(&self) -> bool {
        self.sweep_interval_secs > 0
    }

    /// httpd `max_open_sockets`: every push client plus the API reserve.
    pub fn http_open_sockets(&self) -> usize {
        usize::from(self.max_ws_clients) + API_SOCKET_RESERVE
    }
}

// ---------------------------------------------------------------------------
// First-boot seeding
// ---------------------------------------------------------------------------

/// Settings baked in at build time for units with no stored config.
///
/// | Variable               | Field                 | Accepts               |
/// |------------------------|-----------------------|-----------------------|
/// | `ACCONTROL_SWEEP_SECS` | `sweep_interval_secs` | decimal seconds       |
/// | `ACCONTROL_LOG_RAW`    | `log_raw_frames`      | `1/0 true/false on/off yes/no` |
/// | `ACCONTROL_POWER_ID`   | `frame_ids.power`     | decimal or `0x` hex   |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOverrides<'a> {
    pub sweep_secs: Option<&'a str>,
    pub log_raw: Option<&'a str>,
    pub power_id: Option<&'a str>,
}

impl BuildOverrides<'static> {
    pub fn from_env() -> Self {
        Self {
            sweep_secs: option_env!("ACCONTROL_SWEEP_SECS"),
            log_raw: option_env!("ACCONTROL_LOG_RAW"),
            power_id: option_env!("ACCONTROL_POWER_ID"),
        }
    }
}

impl BuildOverrides<'_> {
    pub fn is_empty(&self) -> bool {
        self.sweep_secs.is_none() && self.log_raw.is_none() && self.power_id.is_none()
    }

    pub fn apply(&self, mut cfg: SystemConfig) -> Result<SystemConfig> {
        if let Some(v) = self.sweep_secs {
            cfg.sweep_interval_secs = v
                .trim()
                .parse()
                .map_err(|_| Error::Config("ACCONTROL_SWEEP_SECS is not a number"))?;
        }
        if let Some(v) = self.log_raw {
            cfg.log_raw_frames =
                parse_flag(v).ok_or(Error::Config("ACCONTROL_LOG_RAW is not a boolean"))?;
        }
        if let Some(v) = self.power_id {
            let id = parse_frame_id(v)
                .ok_or(Error::Config("ACCONTROL_POWER_ID is not a frame identifier"))?;
            cfg.frame_ids.power = Some(id);
        }
        Ok(cfg)
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_frame_id(v: &str) -> Option<u32> {
    let v = v.trim();
    match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => v.parse().ok(),
    }
}

/// First-boot config: defaults plus `overrides`, validated and persisted.
pub fn seed(port: &impl ConfigPort, overrides: &BuildOverrides<'_>) -> Result<SystemConfig> {
    let cfg = overrides.apply(SystemConfig::default())?;
    port.save(&cfg)?;
    Ok(cfg)
}
