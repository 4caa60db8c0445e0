//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (web API, sweep
//! sequence) that the [`AcService`](super::service::AcService) turns into
//! bus frames.

use crate::protocol::{FanSpeed, Mode};

use super::state::AcSettings;

/// Commands that external adapters can send into the application core.
///
/// Single-field commands are always transmitted, even if the field already
/// holds the requested value. [`AppCommand::Apply`] only transmits fields
/// that differ from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    SetPower(bool),
    /// Clamped to 15..=30 °C.
    SetTemperature(u8),
    SetFanSpeed(FanSpeed),
    SetMode(Mode),
    SetZone { zone: u8, open: bool },

    /// Full desired settings, e.g. from `POST /api`.
    Apply(AcSettings),

    /// Advance the bus exercise sequence by one step.
    SweepStep,
}
