//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production). Every line starts
//! with a fixed tag so a serial capture can be grepped by subsystem.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::app::state::AcState;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

fn log_state(tag: &str, state: &AcState) {
    let s = &state.settings;
    let mut zones = heapless::String::<8>::new();
    for &open in &s.zones {
        let _ = zones.push(if open { 'O' } else { '-' });
    }
    match state.current_temp_c {
        Some(t) => info!(
            "{} | power={} mode={} fan={} set={}\u{00b0}C room={:.1}\u{00b0}C zones=[{}]",
            tag,
            if s.power { "on" } else { "off" },
            s.mode,
            s.fan_speed,
            s.set_temp_c,
            t,
            zones,
        ),
        None => info!(
            "{} | power={} mode={} fan={} set={}\u{00b0}C room=? zones=[{}]",
            tag,
            if s.power { "on" } else { "off" },
            s.mode,
            s.fan_speed,
            s.set_temp_c,
            zones,
        ),
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => log_state("START", state),
            AppEvent::StateChanged(state) => log_state("STATE", state),
            AppEvent::FrameSent(frame) => {
                debug!("TX    | {}", frame);
            }
            AppEvent::FrameReceived(frame) => {
                info!("FRAME | {}", frame);
            }
            AppEvent::BusClock(clock) => {
                debug!("CLOCK | {}", clock);
            }
            AppEvent::BusFault(e) => {
                warn!("BUS   | {}", e);
            }
            AppEvent::Unmapped(field) => {
                warn!("BUS   | {} changed locally, no frame identifier", field);
            }
            AppEvent::SweepStep { index, len } => {
                info!("SWEEP | step {}/{}", index + 1, len);
            }
        }
    }
}
