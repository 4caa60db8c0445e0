//! Integration tests for the bus → state → bus pipeline of `AcService`.
//!
//! Frames are injected into a mock bus; commands go in the front door.
//! Assertions are on transmitted frames and emitted events.

use super::mock_bus::{MockBus, RecordingSink, frame, status_frame};

use accontrol::app::commands::AppCommand;
use accontrol::app::events::AppEvent;
use accontrol::app::service::AcService;
use accontrol::app::state::AcSettings;
use accontrol::config::SystemConfig;
use accontrol::error::BusError;
use accontrol::protocol::ids::{FAN_SPEED_ID, MODE_ID, SET_TEMP_ID, ZONE_BASE_ID, ZONE_ID_STRIDE};
use accontrol::protocol::{FanSpeed, Mode};

fn make_service(config: SystemConfig) -> (AcService, MockBus, RecordingSink) {
    let mut svc = AcService::new(&config);
    let mut sink = RecordingSink::new();
    svc.start(&mut sink);
    sink.clear();
    (svc, MockBus::new(), sink)
}

fn zone_id(zone: u32) -> u32 {
    ZONE_BASE_ID + zone * ZONE_ID_STRIDE
}

// ── Bus → state ───────────────────────────────────────────────

#[test]
fn status_frame_sets_temperature_and_clock() {
    let (mut svc, mut bus, mut sink) = make_service(SystemConfig::default());
    bus.inject(status_frame());
    bus.inject(status_frame());

    assert_eq!(svc.poll_bus(&mut bus, &mut sink), 2);

    let temp = svc.state().current_temp_c.unwrap();
    assert!((temp - 23.28).abs() < 0.001);
    assert_eq!(
        svc.last_clock().unwrap().to_string(),
        "2024/9/17 21:5:30"
    );

    // Every broadcast reports the clock; the state only changes once.
    let clocks = sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::BusClock(_)))
        .count();
    assert_eq!(clocks, 2);
    assert_eq!(sink.state_changes(), 1);
}

#[test]
fn controller_reports_overwrite_settings() {
    let (mut svc, mut bus, mut sink) = make_service(SystemConfig::default());
    bus.inject(frame(zone_id(2), [1, 9, 0, 0, 0, 0, 0, 0]));
    bus.inject(frame(MODE_ID, [2, 9, 0, 0, 0, 0, 0, 0]));
    bus.inject(frame(FAN_SPEED_ID, [3, 9, 0, 0, 0, 0, 0, 0]));
    bus.inject(frame(SET_TEMP_ID, [0x98, 0x08, 0, 0, 0, 0, 0, 0])); // 2200
    svc.poll_bus(&mut bus, &mut sink);

    let s = svc.settings();
    assert!(s.zones[2]);
    assert_eq!(s.mode, Mode::Heat);
    assert_eq!(s.fan_speed, FanSpeed::High);
    assert_eq!(s.set_temp_c, 22);
    assert_eq!(sink.state_changes(), 4);
    assert!(bus.sent.is_empty(), "reports are never echoed back");
}

#[test]
fn unknown_and_malformed_frames_are_ignored() {
    let (mut svc, mut bus, mut sink) = make_service(SystemConfig::default());
    bus.inject(frame(0x1234_5678, [1; 8]));
    bus.inject(frame(MODE_ID, [7, 9, 0, 0, 0, 0, 0, 0]));
    bus.inject(frame(SET_TEMP_ID, [0xFF, 0xFF, 0, 0, 0, 0, 0, 0]));
    svc.poll_bus(&mut bus, &mut sink);

    assert_eq!(svc.settings(), AcSettings::default());
    assert_eq!(svc.stats().received, 3);
    assert_eq!(svc.stats().decoded, 0);
    assert!(sink.events.is_empty());
}

#[test]
fn raw_frame_logging_reports_every_frame() {
    let config = SystemConfig {
        log_raw_frames: true,
        ..Default::default()
    };
    let (mut svc, mut bus, mut sink) = make_service(config);
    let unknown = frame(0x1234_5678, [1; 8]);
    bus.inject(unknown);
    svc.poll_bus(&mut bus, &mut sink);
    assert_eq!(sink.events, [AppEvent::FrameReceived(unknown)]);
}

// ── Command → bus ─────────────────────────────────────────────

#[test]
fn apply_sends_only_changed_fields() {
    let (mut svc, mut bus, mut sink) = make_service(SystemConfig::default());
    let mut desired = svc.settings();
    desired.mode = Mode::Dry;
    desired.zones[4] = true;

    svc.handle_command(AppCommand::Apply(desired), &mut bus, &mut sink);

    assert_eq!(bus.sent_ids(), [MODE_ID, zone_id(4)]);
    assert_eq!(bus.sent[0].data(), &[4, 9, 0, 0, 0, 0, 0, 0]);
    assert_eq!(bus.sent[1].data(), &[1, 9, 0, 0, 0, 0, 0, 0]);
    assert_eq!(svc.settings(), desired);
    assert_eq!(sink.state_changes(), 1);

    // Same request again: nothing to do.
    svc.handle_command(AppCommand::Apply(desired), &mut bus, &mut sink);
    assert_eq!(bus.sent.len(), 2);
    assert_eq!(sink.state_changes(), 1);
}

#[test]
fn set_temperature_is_clamped_on_the_wire() {
    let (mut svc, mut bus, mut sink) = make_service(SystemConfig::default());
    svc.handle_command(AppCommand::SetTemperature(40), &mut bus, &mut sink);
    let sent = bus.last_sent().unwrap();
    assert_eq!(sent.id(), SET_TEMP_ID);
    assert_eq!(&sent.data()[..2], &[0xB8, 0x0B]); // 3000
    assert_eq!(svc.settings().set_temp_c, 30);
}

#[test]
fn failed_transmit_keeps_old_value_until_retry() {
    let (mut svc, mut bus, mut sink) = make_service(SystemConfig::default());
    bus.fail_with = Some(BusError::BusOff);
    svc.handle_command(AppCommand::SetFanSpeed(FanSpeed::Medium), &mut bus, &mut sink);
    assert_eq!(svc.settings().fan_speed, FanSpeed::Low);
    assert!(sink.events.contains(&AppEvent::BusFault(BusError::BusOff)));

    bus.fail_with = None;
    svc.handle_command(AppCommand::SetFanSpeed(FanSpeed::Medium), &mut bus, &mut sink);
    assert_eq!(svc.settings().fan_speed, FanSpeed::Medium);
    assert_eq!(svc.stats().sent, 1);
    assert_eq!(svc.stats().tx_failures, 1);
}

#[test]
fn power_without_identifier_is_local_only() {
    let (mut svc, mut bus, mut sink) = make_service(SystemConfig::default());
    svc.handle_command(AppCommand::SetPower(true), &mut bus, &mut sink);
    assert!(bus.sent.is_empty());
    assert!(svc.settings().power);
    assert!(sink.events.contains(&AppEvent::Unmapped("power")));
}

#[test]
fn power_with_configured_identifier_is_sent() {
    let mut config = SystemConfig::default();
    config.frame_ids.power = Some(0x140C_0010);
    let (mut svc, mut bus, mut sink) = make_service(config);

    svc.handle_command(AppCommand::SetPower(true), &mut bus, &mut sink);
    let sent = bus.last_sent().unwrap();
    assert_eq!(sent.id(), 0x140C_0010);
    assert_eq!(sent.data()[0], 1);
    assert!(svc.settings().power);

    // And the controller's own power report is understood.
    bus.inject(frame(0x140C_0010, [2, 9, 0, 0, 0, 0, 0, 0]));
    svc.poll_bus(&mut bus, &mut sink);
    assert!(!svc.settings().power);
}

// ── Sweep ─────────────────────────────────────────────────────

#[test]
fn sweep_steps_on_interval() {
    let config = SystemConfig {
        sweep_interval_secs: 30,
        ..Default::default()
    };
    let (mut svc, mut bus, mut sink) = make_service(config);

    svc.tick(30_000, &mut bus, &mut sink);
    assert!(bus.sent.is_empty());

    svc.tick(30_001, &mut bus, &mut sink);
    assert_eq!(bus.sent_ids(), [zone_id(0)]);
    assert_eq!(bus.sent[0].data()[0], 2, "first step closes zone 0");
    assert!(sink.events.contains(&AppEvent::SweepStep { index: 0, len: 31 }));

    svc.tick(60_002, &mut bus, &mut sink);
    assert_eq!(bus.sent_ids(), [zone_id(0), zone_id(0)]);
    assert!(svc.settings().zones[0], "second step opens zone 0");
}

#[test]
fn sweep_disabled_by_default() {
    let (mut svc, mut bus, mut sink) = make_service(SystemConfig::default());
    svc.tick(u64::from(u32::MAX), &mut bus, &mut sink);
    assert!(bus.sent.is_empty());
}
