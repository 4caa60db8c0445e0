//! The in-memory state record mirrored between the bus and the web API.

use serde::{Deserialize, Serialize};

use crate::protocol::types::DEFAULT_SET_TEMP_C;
use crate::protocol::{FanSpeed, Mode, ZONE_COUNT};

/// The writable part of the controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcSettings {
    pub power: bool,
    pub mode: Mode,
    pub fan_speed: FanSpeed,
    /// Whole degrees Celsius, always within 15..=30.
    pub set_temp_c: u8,
    /// `true` = damper open.
    pub zones: [bool; ZONE_COUNT],
}

impl AcSettings {
    pub const DEFAULT: Self = Self {
        power: false,
        mode: Mode::Cool,
        fan_speed: FanSpeed::Low,
        set_temp_c: DEFAULT_SET_TEMP_C,
        zones: [false; ZONE_COUNT],
    };

    pub fn open_zone_count(&self) -> usize {
        self.zones.iter().filter(|z| **z).count()
    }
}

impl Default for AcSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Settings plus the read-only measurements reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcState {
    pub settings: AcSettings,
    /// `None` until the first status broadcast is seen.
    pub current_temp_c: Option<f32>,
}

impl AcState {
    pub const DEFAULT: Self = Self {
        settings: AcSettings::DEFAULT,
        current_temp_c: None,
    };
}

impl Default for AcState {
    fn default() -> Self {
        Self::DEFAULT
    }
}
