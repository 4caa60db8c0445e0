//! Frame codec: settings fields to frames and frames to [`BusReport`]s.
//!
//! Command frame layout (all extended, DLC 8):
//! ```text
//! zone       [1=open | 2=closed, 0x09, 0, 0, 0, 0, 0, 0]
//! fan speed  [1..=3,             0x09, 0, 0, 0, 0, 0, 0]
//! mode       [1..=5,             0x09, 0, 0, 0, 0, 0, 0]
//! power      [1=on | 2=off,      0x09, 0, 0, 0, 0, 0, 0]
//! set temp   [centi-°C lo, centi-°C hi, 0, 0, 0, 0, 0, 0]
//! ```
//!
//! Status broadcast:
//! ```text
//! byte   0    1    2    3    4        5        6
//!        HH   MM   SS   --   YY       MM       DD
//!                            temp lo  temp hi          (centi-°C, LE)
//! ```
//! Bytes 4 and 5 are read under both interpretations; which one the
//! controller actually means is not settled, so both are reported.

use crate::error::ProtocolError;

use super::frame::CanFrame;
use super::ids::FrameIds;
use super::types::{BusClock, FanSpeed, MAX_SET_TEMP_C, MIN_SET_TEMP_C, Mode, clamp_set_temp};

/// Second byte of every single-value command frame.
const COMMAND_MARKER: u8 = 0x09;

const FLAG_ON: u8 = 1;
const FLAG_OFF: u8 = 2;

/// A decoded frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BusReport {
    Status {
        clock: BusClock,
        current_temp_c: f32,
    },
    Zone {
        zone: u8,
        open: bool,
    },
    SetTemperature(u8),
    FanSpeed(FanSpeed),
    Mode(Mode),
    Power(bool),
}

// ── Encoding ─────────────────────────────────────────────────

fn command_frame(id: u32, value: u8) -> CanFrame {
    frame(id, [value, COMMAND_MARKER, 0, 0, 0, 0, 0, 0])
}

fn frame(id: u32, data: [u8; 8]) -> CanFrame {
    // Identifiers are range-checked when the config is validated.
    CanFrame::extended_masked(id, data)
}

fn on_off(flag: bool) -> u8 {
    if flag { FLAG_ON } else { FLAG_OFF }
}

pub fn encode_zone(ids: &FrameIds, zone: u8, open: bool) -> Result<CanFrame, ProtocolError> {
    let id = ids
        .zones
        .get(zone as usize)
        .ok_or(ProtocolError::InvalidZone(zone))?;
    Ok(command_frame(*id, on_off(open)))
}

/// The temperature is clamped to 15..=30 °C before encoding.
pub fn encode_set_temperature(ids: &FrameIds, celsius: u8) -> CanFrame {
    let centi = u16::from(clamp_set_temp(celsius)) * 100;
    let [lo, hi] = centi.to_le_bytes();
    frame(ids.set_temp, [lo, hi, 0, 0, 0, 0, 0, 0])
}

pub fn encode_fan_speed(ids: &FrameIds, speed: FanSpeed) -> CanFrame {
    command_frame(ids.fan_speed, speed.as_byte())
}

pub fn encode_mode(ids: &FrameIds, mode: Mode) -> CanFrame {
    command_frame(ids.mode, mode.as_byte())
}

pub fn encode_power(ids: &FrameIds, on: bool) -> Result<CanFrame, ProtocolError> {
    let id = ids.power.ok_or(ProtocolError::Unmapped("power"))?;
    Ok(command_frame(id, on_off(on)))
}

// ── Decoding ─────────────────────────────────────────────────

/// Decode a received frame. Returns `None` for frames this firmware does not
/// understand: unknown identifiers, standard or remote frames, short
/// payloads and out-of-range values.
pub fn decode(ids: &FrameIds, frame: &CanFrame) -> Option<BusReport> {
    if !frame.is_extended() || frame.is_remote() {
        return None;
    }
    let id = frame.id();
    let data = frame.data();

    if id == ids.status {
        return decode_status(data);
    }
    if let Some(zone) = ids.zone_index(id) {
        let open = decode_flag(data)?;
        return Some(BusReport::Zone { zone, open });
    }
    if id == ids.set_temp {
        return decode_set_temp(data);
    }
    if id == ids.fan_speed {
        let raw = *data.first()?;
        return FanSpeed::try_from(raw).ok().map(BusReport::FanSpeed);
    }
    if id == ids.mode {
        let raw = *data.first()?;
        return Mode::try_from(raw).ok().map(BusReport::Mode);
    }
    if ids.power == Some(id) {
        return decode_flag(data).map(BusReport::Power);
    }
    None
}

fn decode_flag(data: &[u8]) -> Option<bool> {
    match data.first()? {
        &FLAG_ON => Some(true),
        &FLAG_OFF => Some(false),
        _ => None,
    }
}

fn decode_set_temp(data: &[u8]) -> Option<BusReport> {
    let centi = u16::from_le_bytes([*data.first()?, *data.get(1)?]);
    let celsius = (u32::from(centi) + 50) / 100;
    let range = u32::from(MIN_SET_TEMP_C)..=u32::from(MAX_SET_TEMP_C);
    range
        .contains(&celsius)
        .then_some(BusReport::SetTemperature(celsius as u8))
}

fn decode_status(data: &[u8]) -> Option<BusReport> {
    if data.len() < 7 {
        return None;
    }
    let clock = BusClock {
        hour: data[0],
        minute: data[1],
        second: data[2],
        year: data[4],
        month: data[5],
        day: data[6],
    };
    let centi = u16::from_le_bytes([data[4], data[5]]);
    Some(BusReport::Status {
        clock,
        current_temp_c: f32::from(centi) / 100.0,
    })
}
