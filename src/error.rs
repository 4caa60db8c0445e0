//! Unified error types for the AC control firmware.
//!
//! Subsystem errors are `Copy` so they can travel inside
//! [`AppEvent`](crate::app::events::AppEvent)s without allocation.
//! [`Error`] collects the ones that stop the firmware from starting.

use core::fmt;

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Failures that abort start-up. Handed to `anyhow` in `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The TWAI controller could not be installed or started.
    Bus(BusError),
    /// Configuration is invalid or could not be stored.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(match e {
            ConfigError::ValidationFailed(msg) => msg,
            ConfigError::NotFound => "not found",
            ConfigError::Corrupted => "stored config corrupted",
            ConfigError::StorageFull => "storage full",
            ConfigError::IoError => "storage I/O error",
        })
    }
}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The transmit queue stayed full for the whole timeout.
    TxTimeout,
    /// The controller is bus-off or stopped.
    BusOff,
    /// Driver call failed with the given ESP-IDF error code.
    Driver(i32),
    /// The frame could not be represented by the driver.
    InvalidFrame,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TxTimeout => write!(f, "transmit timed out"),
            Self::BusOff => write!(f, "controller bus-off"),
            Self::Driver(rc) => write!(f, "driver error (rc={rc})"),
            Self::InvalidFrame => write!(f, "frame not representable"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Zone index outside `0..ZONE_COUNT`.
    InvalidZone(u8),
    /// No bus identifier is configured for this field.
    Unmapped(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidZone(z) => write!(f, "zone {z} out of range"),
            Self::Unmapped(field) => write!(f, "no frame identifier for {field}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// A WebSocket frame could not be delivered.
    WsSendFailed,
    /// Every push slot is taken.
    WsClientLimit,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WsSendFailed => write!(f, "WebSocket send failed"),
            Self::WsClientLimit => write!(f, "WebSocket client limit reached"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
