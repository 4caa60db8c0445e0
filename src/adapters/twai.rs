//! TWAI (CAN) bus adapter.
//!
//! Implements [`BusPort`] on top of the ESP32's TWAI controller wired to
//! an SN65HVD230 transceiver. Frames are converted between the driver's
//! `Frame` and the host-testable [`CanFrame`] at this boundary only.
//!
//! - **`target_os = "espidf"`**: `esp_idf_hal::can::CanDriver`, pins and
//!   bit rate taken from [`SystemConfig`].
//! - **all other targets**: in-memory loopback used by host tests and
//!   simulation runs.

use log::{info, warn};

use crate::app::ports::BusPort;
use crate::config::{BusBitrate, SystemConfig};
use crate::error::BusError;
use crate::protocol::CanFrame;

#[cfg(target_os = "espidf")]
use esp_idf_hal::can::{self, CanDriver, Flags, Frame};

/// How long `transmit` may wait for room in the driver's TX queue.
#[cfg(target_os = "espidf")]
const TX_TIMEOUT_MS: u64 = 10;

// ───────────────────────────────────────────────────────────────
// ESP-IDF driver
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct TwaiBus {
    driver: CanDriver<'static>,
}

#[cfg(target_os = "espidf")]
impl TwaiBus {
    /// Install and start the driver on the configured pins.
    pub fn new(peripheral: can::CAN, config: &SystemConfig) -> Result<Self, BusError> {
        use esp_idf_hal::gpio::AnyIOPin;

        // SAFETY: pin numbers are validated against CAN_CAPABLE_GPIOS when
        // the config is loaded, and nothing else claims them.
        let tx = unsafe { AnyIOPin::new(config.can_tx_gpio) };
        let rx = unsafe { AnyIOPin::new(config.can_rx_gpio) };

        let timing = match config.can_bitrate {
            BusBitrate::Kbps125 => can::config::Timing::B125K,
            BusBitrate::Kbps250 => can::config::Timing::B250K,
            BusBitrate::Kbps500 => can::config::Timing::B500K,
        };
        let driver_config = can::config::Config::new().timing(timing);

        let mut driver = CanDriver::new(peripheral, tx, rx, &driver_config).map_err(map_esp_err)?;
        driver.start().map_err(map_esp_err)?;
        info!(
            "TWAI: started at {} kbit/s (tx=GPIO{} rx=GPIO{})",
            config.can_bitrate.kbps(),
            config.can_tx_gpio,
            config.can_rx_gpio
        );
        Ok(Self { driver })
    }
}

#[cfg(target_os = "espidf")]
fn map_esp_err(e: esp_idf_svc::sys::EspError) -> BusError {
    match e.code() {
        c if c == esp_idf_svc::sys::ESP_ERR_TIMEOUT as i32 => BusError::TxTimeout,
        c if c == esp_idf_svc::sys::ESP_ERR_INVALID_STATE as i32 => BusError::BusOff,
        code => BusError::Driver(code),
    }
}

#[cfg(target_os = "espidf")]
fn to_driver_frame(frame: &CanFrame) -> Option<Frame> {
    let flags = match (frame.is_extended(), frame.is_remote()) {
        (true, true) => Flags::Extended | Flags::Remote,
        (true, false) => Flags::Extended.into(),
        (false, true) => Flags::Remote.into(),
        (false, false) => Flags::None.into(),
    };
    Frame::new(frame.id(), flags, frame.data())
}

#[cfg(target_os = "espidf")]
fn from_driver_frame(frame: &Frame) -> Option<CanFrame> {
    CanFrame::new(
        frame.identifier(),
        frame.is_extended(),
        frame.is_remote_frame(),
        frame.data(),
    )
}

#[cfg(target_os = "espidf")]
impl BusPort for TwaiBus {
    fn transmit(&mut self, frame: &CanFrame) -> Result<(), BusError> {
        let out = to_driver_frame(frame).ok_or(BusError::InvalidFrame)?;
        let timeout = esp_idf_hal::delay::TickType::new_millis(TX_TIMEOUT_MS).ticks();
        self.driver.transmit(&out, timeout).map_err(|e| {
            let err = map_esp_err(e);
            warn!("TWAI: transmit {} failed: {}", frame, err);
            err
        })
    }

    fn receive(&mut self) -> Option<CanFrame> {
        loop {
            let frame = self.driver.receive(esp_idf_hal::delay::NON_BLOCK).ok()?;
            match from_driver_frame(&frame) {
                Some(f) => return Some(f),
                None => warn!("TWAI: dropped unrepresentable frame"),
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation loopback
// ───────────────────────────────────────────────────────────────

/// Host stand-in for the TWAI controller. Transmitted frames are recorded;
/// received frames come from [`inject`](Self::inject).
#[cfg(not(target_os = "espidf"))]
pub struct TwaiBus {
    rx: std::collections::VecDeque<CanFrame>,
    sent: Vec<CanFrame>,
    fail_next: Option<BusError>,
    bitrate: BusBitrate,
}

#[cfg(not(target_os = "espidf"))]
impl TwaiBus {
    pub fn new(config: &SystemConfig) -> Result<Self, BusError> {
        info!(
            "TWAI(sim): loopback at {} kbit/s (tx=GPIO{} rx=GPIO{})",
            config.can_bitrate.kbps(),
            config.can_tx_gpio,
            config.can_rx_gpio
        );
        Ok(Self {
            rx: std::collections::VecDeque::new(),
            sent: Vec::new(),
            fail_next: None,
            bitrate: config.can_bitrate,
        })
    }

    /// Queue a frame as if the controller had sent it.
    pub fn inject(&mut self, frame: CanFrame) {
        self.rx.push_back(frame);
    }

    /// Make the next `transmit` fail with `err`.
    pub fn fail_next_transmit(&mut self, err: BusError) {
        self.fail_next = Some(err);
    }

    pub fn sent(&self) -> &[CanFrame] {
        &self.sent
    }

    pub fn bitrate(&self) -> BusBitrate {
        self.bitrate
    }
}

#[cfg(not(target_os = "espidf"))]
impl BusPort for TwaiBus {
    fn transmit(&mut self, frame: &CanFrame) -> Result<(), BusError> {
        if let Some(err) = self.fail_next.take() {
            warn!("TWAI(sim): transmit {} failed: {}", frame, err);
            return Err(err);
        }
        self.sent.push(*frame);
        Ok(())
    }

    fn receive(&mut self) -> Option<CanFrame> {
        self.rx.pop_front()
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use crate::protocol::codec;
    use crate::protocol::FrameIds;

    #[test]
    fn loopback_records_and_injects() {
        let mut bus = TwaiBus::new(&SystemConfig::default()).unwrap();
        assert_eq!(bus.bitrate().kbps(), 125);

        let frame = codec::encode_set_temperature(&FrameIds::default(), 22);
        bus.transmit(&frame).unwrap();
        assert_eq!(bus.sent(), &[frame]);

        assert!(bus.receive().is_none());
        bus.inject(frame);
        assert_eq!(bus.receive(), Some(frame));
    }

    #[test]
    fn injected_failure_applies_once() {
        let mut bus = TwaiBus::new(&SystemConfig::default()).unwrap();
        let frame = CanFrame::extended(0x140C_0015, &[1, 9, 0, 0, 0, 0, 0, 0]).unwrap();
        bus.fail_next_transmit(BusError::BusOff);
        assert_eq!(bus.transmit(&frame), Err(BusError::BusOff));
        assert!(bus.transmit(&frame).is_ok());
        assert_eq!(bus.sent().len(), 1);
    }
}
