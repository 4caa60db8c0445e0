//! Application service: the hexagonal core.
//!
//! [`AcService`] owns the state record and mirrors it in both directions:
//! frames seen on the bus update the record, commands from the web API are
//! encoded and transmitted. All I/O flows through port traits injected at
//! call sites, making the service testable with mock adapters.
//!
//! ```text
//!   BusPort ──frames──▶ ┌────────────────────────┐ ──▶ EventSink
//!                       │       AcService        │
//!   BusPort ◀─frames─── │  state · codec · sweep │ ◀── AppCommand
//!                       └────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::SystemConfig;
use crate::error::ProtocolError;
use crate::protocol::codec::{self, BusReport};
use crate::protocol::types::clamp_set_temp;
use crate::protocol::{BusClock, CanFrame, FanSpeed, FrameIds, Mode};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{BusPort, EventSink, StoragePort};
use super::state::{AcSettings, AcState};
use super::sweep::Sweep;

/// NVS namespace holding the last known settings.
pub const SETTINGS_NAMESPACE: &str = "accontrol";
pub const SETTINGS_KEY: &str = "settings";

/// Quiet time after the last settings change before it is written to flash.
const SETTINGS_SAVE_DEBOUNCE_MS: u64 = 5_000;

/// Upper bound on frames handled per [`AcService::poll_bus`] call, so a
/// chatty bus cannot starve the rest of the control loop.
pub const MAX_FRAMES_PER_POLL: usize = 32;

/// Frame counters for the periodic status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub sent: u32,
    pub tx_failures: u32,
    pub received: u32,
    pub decoded: u32,
}

// ───────────────────────────────────────────────────────────────
// AcService
// ───────────────────────────────────────────────────────────────

pub struct AcService {
    state: AcState,
    ids: FrameIds,
    log_raw_frames: bool,
    sweep: Sweep,
    last_clock: Option<BusClock>,
    stats: BusStats,
    now_ms: u64,
    /// Time of the last unsaved settings change.
    dirty_since_ms: Option<u64>,
}

impl AcService {
    /// Construct the service from configuration. Call [`start`](Self::start) next.
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            state: AcState::DEFAULT,
            ids: config.frame_ids.clone(),
            log_raw_frames: config.log_raw_frames,
            sweep: Sweep::new(config.sweep_interval_secs, 0),
            last_clock: None,
            stats: BusStats::default(),
            now_ms: 0,
            dirty_since_ms: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(self.state));
        info!(
            "AcService started (sweep {})",
            if self.sweep.enabled() { "on" } else { "off" }
        );
    }

    /// Load the settings persisted before the last reboot.
    ///
    /// Nothing is transmitted: the controller keeps its own state and the
    /// next frames on the bus overwrite whatever was restored.
    pub fn restore_settings(&mut self, storage: &impl StoragePort) -> bool {
        let mut buf = [0u8; 64];
        let Ok(len) = storage.read(SETTINGS_NAMESPACE, SETTINGS_KEY, &mut buf) else {
            return false;
        };
        match postcard::from_bytes::<AcSettings>(&buf[..len]) {
            Ok(settings) => {
                self.restore(settings);
                info!("Settings restored from NVS");
                true
            }
            Err(_) => {
                warn!("Stored settings corrupted, keeping defaults");
                false
            }
        }
    }

    /// Replace the settings without touching the bus or marking them dirty.
    pub fn restore(&mut self, settings: AcSettings) {
        self.state.settings = AcSettings {
            set_temp_c: clamp_set_temp(settings.set_temp_c),
            ..settings
        };
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Advance time and run a sweep step if one is due.
    pub fn tick(&mut self, now_ms: u64, bus: &mut impl BusPort, sink: &mut impl EventSink) {
        self.now_ms = now_ms;
        if self.sweep.is_due(now_ms) {
            self.handle_command(AppCommand::SweepStep, bus, sink);
        }
    }

    /// Drain pending frames from the bus. Returns how many were handled.
    pub fn poll_bus(&mut self, bus: &mut impl BusPort, sink: &mut impl EventSink) -> usize {
        let mut handled = 0;
        while handled < MAX_FRAMES_PER_POLL {
            let Some(frame) = bus.receive() else { break };
            self.handle_frame(&frame, sink);
            handled += 1;
        }
        handled
    }

    // ── Bus → state ───────────────────────────────────────────

    /// Fold one received frame into the state record.
    pub fn handle_frame(&mut self, frame: &CanFrame, sink: &mut impl EventSink) {
        self.stats.received = self.stats.received.wrapping_add(1);
        if self.log_raw_frames {
            sink.emit(&AppEvent::FrameReceived(*frame));
        }

        let Some(report) = codec::decode(&self.ids, frame) else {
            return;
        };
        self.stats.decoded = self.stats.decoded.wrapping_add(1);

        let before = self.state;
        match report {
            BusReport::Status {
                clock,
                current_temp_c,
            } => {
                self.state.current_temp_c = Some(current_temp_c);
                self.last_clock = Some(clock);
                sink.emit(&AppEvent::BusClock(clock));
            }
            BusReport::Zone { zone, open } => {
                if let Some(z) = self.state.settings.zones.get_mut(zone as usize) {
                    *z = open;
                }
            }
            BusReport::SetTemperature(t) => self.state.settings.set_temp_c = t,
            BusReport::FanSpeed(s) => self.state.settings.fan_speed = s,
            BusReport::Mode(m) => self.state.settings.mode = m,
            BusReport::Power(on) => self.state.settings.power = on,
        }
        self.publish_if_changed(before, sink);
    }

    // ── Command → bus ─────────────────────────────────────────

    /// Process an external command (web API, sweep).
    ///
    /// A field is only updated once its frame was accepted by the bus.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        bus: &mut impl BusPort,
        sink: &mut impl EventSink,
    ) {
        let before = self.state;
        match cmd {
            AppCommand::SweepStep => {
                let (index, step) = self.sweep.advance(self.now_ms);
                sink.emit(&AppEvent::SweepStep {
                    index,
                    len: self.sweep.step_count(),
                });
                self.execute(step, bus, sink);
            }
            other => self.execute(other, bus, sink),
        }
        self.publish_if_changed(before, sink);
    }

    fn execute(&mut self, cmd: AppCommand, bus: &mut impl BusPort, sink: &mut impl EventSink) {
        match cmd {
            AppCommand::SetPower(on) => self.write_power(on, bus, sink),
            AppCommand::SetTemperature(t) => self.write_set_temp(t, bus, sink),
            AppCommand::SetFanSpeed(s) => self.write_fan_speed(s, bus, sink),
            AppCommand::SetMode(m) => self.write_mode(m, bus, sink),
            AppCommand::SetZone { zone, open } => self.write_zone(zone, open, bus, sink),
            AppCommand::Apply(desired) => self.apply(desired, bus, sink),
            // Sequence steps are never themselves SweepStep.
            AppCommand::SweepStep => {}
        }
    }

    /// Transmit only the fields of `desired` that differ from the state.
    fn apply(&mut self, desired: AcSettings, bus: &mut impl BusPort, sink: &mut impl EventSink) {
        let current = self.state.settings;
        if desired.power != current.power {
            self.write_power(desired.power, bus, sink);
        }
        if desired.mode != current.mode {
            self.write_mode(desired.mode, bus, sink);
        }
        if desired.fan_speed != current.fan_speed {
            self.write_fan_speed(desired.fan_speed, bus, sink);
        }
        if clamp_set_temp(desired.set_temp_c) != current.set_temp_c {
            self.write_set_temp(desired.set_temp_c, bus, sink);
        }
        for (zone, (&want, &have)) in desired.zones.iter().zip(current.zones.iter()).enumerate() {
            if want != have {
                self.write_zone(zone as u8, want, bus, sink);
            }
        }
    }

    fn write_power(&mut self, on: bool, bus: &mut impl BusPort, sink: &mut impl EventSink) {
        match codec::encode_power(&self.ids, on) {
            Ok(frame) => {
                if self.send(frame, bus, sink) {
                    self.state.settings.power = on;
                }
            }
            Err(ProtocolError::Unmapped(field)) => {
                self.state.settings.power = on;
                sink.emit(&AppEvent::Unmapped(field));
            }
            Err(e) => warn!("Power command rejected: {}", e),
        }
    }

    fn write_set_temp(&mut self, celsius: u8, bus: &mut impl BusPort, sink: &mut impl EventSink) {
        let frame = codec::encode_set_temperature(&self.ids, celsius);
        if self.send(frame, bus, sink) {
            self.state.settings.set_temp_c = clamp_set_temp(celsius);
        }
    }

    fn write_fan_speed(&mut self, speed: FanSpeed, bus: &mut impl BusPort, sink: &mut impl EventSink) {
        let frame = codec::encode_fan_speed(&self.ids, speed);
        if self.send(frame, bus, sink) {
            self.state.settings.fan_speed = speed;
        }
    }

    fn write_mode(&mut self, mode: Mode, bus: &mut impl BusPort, sink: &mut impl EventSink) {
        let frame = codec::encode_mode(&self.ids, mode);
        if self.send(frame, bus, sink) {
            self.state.settings.mode = mode;
        }
    }

    fn write_zone(&mut self, zone: u8, open: bool, bus: &mut impl BusPort, sink: &mut impl EventSink) {
        match codec::encode_zone(&self.ids, zone, open) {
            Ok(frame) => {
                if self.send(frame, bus, sink) {
                    self.state.settings.zones[zone as usize] = open;
                }
            }
            Err(e) => warn!("Zone command rejected: {}", e),
        }
    }

    fn send(&mut self, frame: CanFrame, bus: &mut impl BusPort, sink: &mut impl EventSink) -> bool {
        match bus.transmit(&frame) {
            Ok(()) => {
                self.stats.sent = self.stats.sent.wrapping_add(1);
                sink.emit(&AppEvent::FrameSent(frame));
                true
            }
            Err(e) => {
                self.stats.tx_failures = self.stats.tx_failures.wrapping_add(1);
                warn!("Transmit failed ({}): {}", e, frame);
                sink.emit(&AppEvent::BusFault(e));
                false
            }
        }
    }

    fn publish_if_changed(&mut self, before: AcState, sink: &mut impl EventSink) {
        if self.state == before {
            return;
        }
        if self.state.settings != before.settings {
            self.dirty_since_ms = Some(self.now_ms);
        }
        sink.emit(&AppEvent::StateChanged(self.state));
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> AcState {
        self.state
    }

    pub fn settings(&self) -> AcSettings {
        self.state.settings
    }

    pub fn last_clock(&self) -> Option<BusClock> {
        self.last_clock
    }

    pub fn stats(&self) -> BusStats {
        self.stats
    }

    // ── Settings persistence ──────────────────────────────────

    /// Whether the settings have unsaved changes.
    pub fn is_settings_dirty(&self) -> bool {
        self.dirty_since_ms.is_some()
    }

    /// Persist the settings once they have been stable for 5 seconds.
    /// Returns `true` if the settings were saved.
    pub fn auto_save_if_needed(&mut self, storage: &mut impl StoragePort) -> bool {
        let Some(since) = self.dirty_since_ms else {
            return false;
        };
        if self.now_ms.saturating_sub(since) < SETTINGS_SAVE_DEBOUNCE_MS {
            return false;
        }
        self.save_settings(storage)
    }

    /// Persist immediately if dirty (call before a restart).
    pub fn force_save_if_dirty(&mut self, storage: &mut impl StoragePort) {
        if self.dirty_since_ms.is_some() {
            self.save_settings(storage);
        }
    }

    fn save_settings(&mut self, storage: &mut impl StoragePort) -> bool {
        let bytes = match postcard::to_allocvec(&self.state.settings) {
            Ok(b) => b,
            Err(_) => {
                warn!("Settings serialisation failed");
                return false;
            }
        };
        match storage.write(SETTINGS_NAMESPACE, SETTINGS_KEY, &bytes) {
            Ok(()) => {
                self.dirty_since_ms = None;
                info!("Settings saved to NVS");
                true
            }
            Err(e) => {
                warn!("Settings save failed: {}", e);
                false
            }
        }
    }

    /// Bus identifiers in use.
    pub fn frame_ids(&self) -> &FrameIds {
        &self.ids
    }
}
