//! Bus identifiers for the controller's messages.
//!
//! The defaults are the identifiers observed on the installed system.
//! They live in [`SystemConfig`](crate::config::SystemConfig) so a
//! different controller revision can be remapped without reflashing.

use serde::{Deserialize, Serialize};

use super::types::ZONE_COUNT;

/// Status broadcast: bus clock in bytes 0..7, current temperature in 4..6.
pub const STATUS_ID: u32 = 0x0404_0001;

/// Zone 0 damper. Each further zone is `ZONE_ID_STRIDE` higher.
pub const ZONE_BASE_ID: u32 = 0x140C_0003;
pub const ZONE_ID_STRIDE: u32 = 0x2000;

pub const SET_TEMP_ID: u32 = 0x140C_0017;
pub const FAN_SPEED_ID: u32 = 0x140C_0015;
pub const MODE_ID: u32 = 0x140C_0014;

/// Identifier table used by the codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameIds {
    pub status: u32,
    pub zones: [u32; ZONE_COUNT],
    pub set_temp: u32,
    pub fan_speed: u32,
    pub mode: u32,
    /// No power identifier has been observed yet.
    pub power: Option<u32>,
}

impl FrameIds {
    /// Index of the zone whose identifier is `id`.
    pub fn zone_index(&self, id: u32) -> Option<u8> {
        self.zones.iter().position(|&z| z == id).map(|i| i as u8)
    }

    /// True if the same identifier appears twice in the table.
    pub fn has_duplicates(&self) -> bool {
        let mut all: heapless::Vec<u32, { ZONE_COUNT + 5 }> = heapless::Vec::new();
        let fixed = [self.status, self.set_temp, self.fan_speed, self.mode];
        for id in fixed
            .iter()
            .chain(self.zones.iter())
            .chain(self.power.iter())
        {
            if all.contains(id) {
                return true;
            }
            // Capacity covers every field above.
            let _ = all.push(*id);
        }
        false
    }
}

impl Default for FrameIds {
    fn default() -> Self {
        let mut zones = [0u32; ZONE_COUNT];
        for (i, z) in zones.iter_mut().enumerate() {
            *z = ZONE_BASE_ID + i as u32 * ZONE_ID_STRIDE;
        }
        Self {
            status: STATUS_ID,
            zones,
            set_temp: SET_TEMP_ID,
            fan_speed: FAN_SPEED_ID,
            mode: MODE_ID,
            power: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_zone_ids_match_installed_system() {
        let ids = FrameIds::default();
        assert_eq!(
            ids.zones,
            [0x140C0003, 0x140C2003, 0x140C4003, 0x140C6003, 0x140C8003, 0x140CA003]
        );
    }

    #[test]
    fn zone_lookup() {
        let ids = FrameIds::default();
        assert_eq!(ids.zone_index(0x140C4003), Some(2));
        assert_eq!(ids.zone_index(SET_TEMP_ID), None);
    }

    #[test]
    fn defaults_are_unique() {
        assert!(!FrameIds::default().has_duplicates());
    }

    #[test]
    fn detects_duplicate_power_id() {
        let ids = FrameIds {
            power: Some(MODE_ID),
            ..FrameIds::default()
        };
        assert!(ids.has_duplicates());
    }
}
