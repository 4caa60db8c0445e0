//! Bus exercise sequence.
//!
//! Walks every command the controller understands, one step per interval,
//! so a technician can watch the indoor unit react to each frame:
//!
//! ```text
//! zones 0..=5   closed, open
//! set temp      20 ..= 29, then back to 24
//! fan           High, Medium, Low
//! mode          Heat, Vent, Dry, Auto, Cool
//! ```
//!
//! The sequence wraps after the last step.

use crate::protocol::types::DEFAULT_SET_TEMP_C;
use crate::protocol::{FanSpeed, Mode};

use super::commands::AppCommand;

const fn zone(zone: u8, open: bool) -> AppCommand {
    AppCommand::SetZone { zone, open }
}

/// Every step of the exercise, in order.
pub const SEQUENCE: [AppCommand; 31] = [
    zone(0, false),
    zone(0, true),
    zone(1, false),
    zone(1, true),
    zone(2, false),
    zone(2, true),
    zone(3, false),
    zone(3, true),
    zone(4, false),
    zone(4, true),
    zone(5, false),
    zone(5, true),
    AppCommand::SetTemperature(20),
    AppCommand::SetTemperature(21),
    AppCommand::SetTemperature(22),
    AppCommand::SetTemperature(23),
    AppCommand::SetTemperature(24),
    AppCommand::SetTemperature(25),
    AppCommand::SetTemperature(26),
    AppCommand::SetTemperature(27),
    AppCommand::SetTemperature(28),
    AppCommand::SetTemperature(29),
    AppCommand::SetTemperature(DEFAULT_SET_TEMP_C),
    AppCommand::SetFanSpeed(FanSpeed::High),
    AppCommand::SetFanSpeed(FanSpeed::Medium),
    AppCommand::SetFanSpeed(FanSpeed::Low),
    AppCommand::SetMode(Mode::Heat),
    AppCommand::SetMode(Mode::Vent),
    AppCommand::SetMode(Mode::Dry),
    AppCommand::SetMode(Mode::Auto),
    AppCommand::SetMode(Mode::Cool),
];

/// Position in [`SEQUENCE`] plus the interval timer.
#[derive(Debug, Clone)]
pub struct Sweep {
    next: usize,
    interval_ms: u64,
    last_step_ms: u64,
}

impl Sweep {
    /// `interval_secs == 0` gives a sweep that never becomes due.
    pub fn new(interval_secs: u32, now_ms: u64) -> Self {
        Self {
            next: 0,
            interval_ms: u64::from(interval_secs) * 1000,
            last_step_ms: now_ms,
        }
    }

    pub fn enabled(&self) -> bool {
        self.interval_ms > 0
    }

    /// Whether a step should run at `now_ms`.
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.enabled() && now_ms.saturating_sub(self.last_step_ms) > self.interval_ms
    }

    /// Return the next command and move on. Returns `(index, command)`.
    pub fn advance(&mut self, now_ms: u64) -> (usize, AppCommand) {
        let index = self.next;
        self.next = (self.next + 1) % SEQUENCE.len();
        self.last_step_ms = now_ms;
        (index, SEQUENCE[index])
    }

    pub fn step_count(&self) -> usize {
        SEQUENCE.len()
    }
}
