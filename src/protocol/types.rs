//! Field types carried by the bus frames.
//!
//! Enum discriminants are the raw byte values the controller puts in byte 0
//! of the fan-speed and mode frames. They serialise as plain numbers, which
//! is also what the web UI sends and expects.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Number of zone dampers on the controller.
pub const ZONE_COUNT: usize = 6;

/// Lowest set temperature the controller accepts (°C).
pub const MIN_SET_TEMP_C: u8 = 15;

/// Highest set temperature the controller accepts (°C).
pub const MAX_SET_TEMP_C: u8 = 30;

/// Set temperature after a factory reset / first boot (°C).
pub const DEFAULT_SET_TEMP_C: u8 = 24;

/// Clamp a requested set temperature into the controller's range.
pub fn clamp_set_temp(celsius: u8) -> u8 {
    celsius.clamp(MIN_SET_TEMP_C, MAX_SET_TEMP_C)
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Mode {
    Cool = 1,
    Heat = 2,
    Vent = 3,
    Dry = 4,
    Auto = 5,
}

impl Mode {
    pub const ALL: [Mode; 5] = [Mode::Cool, Mode::Heat, Mode::Vent, Mode::Dry, Mode::Auto];

    /// Map any raw number onto a mode, clamping into `1..=5`.
    pub fn from_clamped(raw: u8) -> Self {
        match raw.clamp(1, 5) {
            1 => Self::Cool,
            2 => Self::Heat,
            3 => Self::Vent,
            4 => Self::Dry,
            _ => Self::Auto,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Mode {
    type Error = InvalidValue;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            1..=5 => Ok(Self::from_clamped(raw)),
            _ => Err(InvalidValue { field: "mode", raw }),
        }
    }
}

impl From<Mode> for u8 {
    fn from(m: Mode) -> u8 {
        m.as_byte()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cool => "Cool",
            Self::Heat => "Heat",
            Self::Vent => "Vent",
            Self::Dry => "Dry",
            Self::Auto => "Auto",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Fan speed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum FanSpeed {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 3] = [FanSpeed::Low, FanSpeed::Medium, FanSpeed::High];

    /// Map any raw number onto a fan speed, clamping into `1..=3`.
    pub fn from_clamped(raw: u8) -> Self {
        match raw.clamp(1, 3) {
            1 => Self::Low,
            2 => Self::Medium,
            _ => Self::High,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FanSpeed {
    type Error = InvalidValue;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            1..=3 => Ok(Self::from_clamped(raw)),
            _ => Err(InvalidValue { field: "fanSpeed", raw }),
        }
    }
}

impl From<FanSpeed> for u8 {
    fn from(s: FanSpeed) -> u8 {
        s.as_byte()
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(label)
    }
}

/// A raw byte that does not name a variant of the target enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidValue {
    pub field: &'static str,
    pub raw: u8,
}

impl fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} value {}", self.field, self.raw)
    }
}

// ---------------------------------------------------------------------------
// Bus clock
// ---------------------------------------------------------------------------

/// Wall-clock time broadcast by the controller in the status frame.
///
/// Fields are passed through as received; the controller is not known to
/// validate them. Displayed unpadded, as the controller's own log shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusClock {
    /// Two-digit year; the full year is `2000 + year`.
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl fmt::Display for BusClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "20{}/{}/{} {}:{}:{}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}
