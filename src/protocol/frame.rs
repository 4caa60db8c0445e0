//! Driver-independent CAN frame.
//!
//! The TWAI adapter converts to and from `esp_idf_hal::can::Frame`; every
//! other module only ever sees this type, so the codec and the service are
//! testable on the host.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Classic CAN payload size.
pub const MAX_DATA_LEN: usize = 8;

/// Highest 29-bit extended identifier.
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// Highest 11-bit standard identifier.
pub const MAX_STANDARD_ID: u32 = 0x7FF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanFrame {
    id: u32,
    extended: bool,
    remote: bool,
    dlc: u8,
    data: [u8; MAX_DATA_LEN],
}

impl CanFrame {
    /// Build an extended data frame. Returns `None` if the identifier needs
    /// more than 29 bits or the payload is longer than 8 bytes.
    pub fn extended(id: u32, payload: &[u8]) -> Option<Self> {
        Self::new(id, true, false, payload)
    }

    /// Build a standard (11-bit) data frame.
    pub fn standard(id: u32, payload: &[u8]) -> Option<Self> {
        Self::new(id, false, false, payload)
    }

    pub fn new(id: u32, extended: bool, remote: bool, payload: &[u8]) -> Option<Self> {
        let max_id = if extended { MAX_EXTENDED_ID } else { MAX_STANDARD_ID };
        if id > max_id || payload.len() > MAX_DATA_LEN {
            return None;
        }
        let mut data = [0u8; MAX_DATA_LEN];
        data[..payload.len()].copy_from_slice(payload);
        Some(Self {
            id,
            extended,
            remote,
            dlc: payload.len() as u8,
            data,
        })
    }

    /// Full-length extended frame; bits above the 29-bit range are dropped.
    pub(crate) fn extended_masked(id: u32, data: [u8; MAX_DATA_LEN]) -> Self {
        Self {
            id: id & MAX_EXTENDED_ID,
            extended: true,
            remote: false,
            dlc: MAX_DATA_LEN as u8,
            data,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    pub fn dlc(&self) -> usize {
        self.dlc as usize
    }

    /// The valid bytes of the payload (`dlc` long).
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc()]
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended {
            write!(f, "id=0x{:08X} ext", self.id)?;
        } else {
            write!(f, "id=0x{:03X} std", self.id)?;
        }
        if self.remote {
            write!(f, " rtr")?;
        }
        write!(f, " dlc={} [", self.dlc)?;
        for (i, b) in self.data().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        write!(f, "]")
    }
}
