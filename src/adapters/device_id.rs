//! Identity of this bridge, taken from the factory MAC.
//!
//! The last three MAC bytes name the unit: `AC-5E107B` in logs and the
//! mDNS TXT record, `accontrol-5e107b` as its `.local` hostname.

use core::fmt::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    mac: [u8; 6],
}

impl DeviceIdentity {
    pub fn from_mac(mac: [u8; 6]) -> Self {
        Self { mac }
    }

    /// Factory MAC burned into eFuse.
    #[cfg(target_os = "espidf")]
    pub fn read() -> Self {
        let mut mac = [0u8; 6];
        // SAFETY: the buffer is the six bytes the call writes.
        unsafe {
            esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
        }
        Self::from_mac(mac)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn read() -> Self {
        Self::from_mac([0x24, 0x0A, 0xC4, 0x5E, 0x10, 0x7B])
    }

    pub fn id(&self) -> heapless::String<16> {
        let [.., a, b, c] = self.mac;
        let mut s = heapless::String::new();
        let _ = write!(s, "AC-{a:02X}{b:02X}{c:02X}");
        s
    }

    pub fn hostname(&self) -> heapless::String<24> {
        let [.., a, b, c] = self.mac;
        let mut s = heapless::String::new();
        let _ = write!(s, "accontrol-{a:02x}{b:02x}{c:02x}");
        s
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}
