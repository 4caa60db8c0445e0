//! Settings snapshot and configuration persistence.

use super::mock_bus::{MockBus, MockNvs, RecordingSink};

use accontrol::adapters::nvs::{NvsAdapter, validate_config};
use accontrol::app::commands::AppCommand;
use accontrol::app::ports::{ConfigError, ConfigPort, StoragePort};
use accontrol::app::service::{AcService, SETTINGS_KEY, SETTINGS_NAMESPACE};
use accontrol::config::{self, BuildOverrides, SystemConfig};
use accontrol::error::Error;
use accontrol::protocol::Mode;

fn service() -> (AcService, MockBus, RecordingSink) {
    (
        AcService::new(&SystemConfig::default()),
        MockBus::new(),
        RecordingSink::new(),
    )
}

// ── Settings snapshot ─────────────────────────────────────────

#[test]
fn settings_are_saved_after_quiet_period() {
    let (mut svc, mut bus, mut sink) = service();
    let mut nvs = MockNvs::new();

    svc.tick(1_000, &mut bus, &mut sink);
    svc.handle_command(AppCommand::SetMode(Mode::Heat), &mut bus, &mut sink);
    assert!(svc.is_settings_dirty());

    svc.tick(5_999, &mut bus, &mut sink);
    assert!(!svc.auto_save_if_needed(&mut nvs));
    assert_eq!(nvs.writes, 0);

    svc.tick(6_000, &mut bus, &mut sink);
    assert!(svc.auto_save_if_needed(&mut nvs));
    assert_eq!(nvs.writes, 1);
    assert!(!svc.is_settings_dirty());
    assert!(!svc.auto_save_if_needed(&mut nvs), "nothing left to save");

    let mut restored = AcService::new(&SystemConfig::default());
    assert!(restored.restore_settings(&nvs));
    assert_eq!(restored.settings(), svc.settings());
    assert!(!restored.is_settings_dirty());
}

#[test]
fn later_change_restarts_the_quiet_period() {
    let (mut svc, mut bus, mut sink) = service();
    let mut nvs = MockNvs::new();

    svc.handle_command(AppCommand::SetTemperature(20), &mut bus, &mut sink);
    svc.tick(4_000, &mut bus, &mut sink);
    svc.handle_command(AppCommand::SetTemperature(21), &mut bus, &mut sink);

    svc.tick(6_000, &mut bus, &mut sink);
    assert!(!svc.auto_save_if_needed(&mut nvs));
    svc.tick(9_000, &mut bus, &mut sink);
    assert!(svc.auto_save_if_needed(&mut nvs));
}

#[test]
fn measurement_only_changes_do_not_dirty_settings() {
    let (mut svc, mut bus, mut sink) = service();
    bus.inject(super::mock_bus::status_frame());
    svc.poll_bus(&mut bus, &mut sink);
    assert_eq!(sink.state_changes(), 1);
    assert!(!svc.is_settings_dirty());
}

#[test]
fn corrupted_snapshot_keeps_defaults() {
    let mut nvs = MockNvs::new();
    nvs.write(SETTINGS_NAMESPACE, SETTINGS_KEY, &[0xFF; 3]).unwrap();

    let mut svc = AcService::new(&SystemConfig::default());
    assert!(!svc.restore_settings(&nvs));
    assert_eq!(svc.settings(), Default::default());
}

#[test]
fn missing_snapshot_is_not_an_error() {
    let nvs = MockNvs::new();
    let mut svc = AcService::new(&SystemConfig::default());
    assert!(!svc.restore_settings(&nvs));
}

#[test]
fn force_save_survives_full_storage() {
    let (mut svc, mut bus, mut sink) = service();
    let mut nvs = MockNvs::new();
    nvs.full = true;

    svc.handle_command(AppCommand::SetPower(true), &mut bus, &mut sink);
    svc.force_save_if_dirty(&mut nvs);
    assert!(svc.is_settings_dirty(), "failed save keeps the dirty flag");

    nvs.full = false;
    svc.force_save_if_dirty(&mut nvs);
    assert!(!svc.is_settings_dirty());
    assert!(nvs.exists(SETTINGS_NAMESPACE, SETTINGS_KEY));
}

// ── System configuration ──────────────────────────────────────

#[test]
fn config_roundtrip_through_nvs_adapter() {
    let nvs = NvsAdapter::new().unwrap();
    assert_eq!(nvs.load().unwrap(), SystemConfig::default());

    let cfg = SystemConfig {
        sweep_interval_secs: 45,
        log_raw_frames: true,
        ..Default::default()
    };
    nvs.save(&cfg).unwrap();
    assert_eq!(nvs.load().unwrap(), cfg);
}

#[test]
fn invalid_config_is_not_persisted() {
    let nvs = NvsAdapter::new().unwrap();
    let mut cfg = SystemConfig::default();
    cfg.frame_ids.mode = cfg.frame_ids.fan_speed;

    assert!(matches!(
        nvs.save(&cfg),
        Err(ConfigError::ValidationFailed(_))
    ));
    assert_eq!(nvs.load().unwrap(), SystemConfig::default());
}

#[test]
fn first_boot_persists_build_overrides() {
    let nvs = NvsAdapter::new().unwrap();
    assert!(!nvs.has_stored_config());

    let overrides = BuildOverrides {
        sweep_secs: Some("30"),
        log_raw: Some("yes"),
        power_id: Some("0x140C0010"),
    };
    let cfg = config::seed(&nvs, &overrides).unwrap();
    assert!(cfg.sweep_enabled());
    assert!(cfg.log_raw_frames);
    assert_eq!(cfg.frame_ids.power, Some(0x140C_0010));

    assert!(nvs.has_stored_config());
    assert_eq!(nvs.load().unwrap(), cfg, "next boot loads what was seeded");
}

#[test]
fn seeding_refuses_an_invalid_override() {
    let nvs = NvsAdapter::new().unwrap();
    let clashing = BuildOverrides {
        power_id: Some("0x140C0014"),
        ..Default::default()
    };
    assert_eq!(
        config::seed(&nvs, &clashing),
        Err(Error::Config("frame identifiers must be unique"))
    );
    assert!(!nvs.has_stored_config());
}

#[test]
fn validation_rejects_out_of_range_fields() {
    let base = SystemConfig::default();
    assert!(validate_config(&base).is_ok());

    let same_pins = SystemConfig {
        can_rx_gpio: base.can_tx_gpio,
        ..base.clone()
    };
    assert!(validate_config(&same_pins).is_err());

    let short_sweep = SystemConfig {
        sweep_interval_secs: 2,
        ..base.clone()
    };
    assert!(validate_config(&short_sweep).is_err());

    let mut oversized_id = base;
    oversized_id.frame_ids.power = Some(0x2000_0000);
    assert!(validate_config(&oversized_id).is_err());
}

#[test]
fn wifi_credentials_persist() {
    let mut nvs = NvsAdapter::new().unwrap();
    assert!(nvs.wifi_credentials().is_none());
    nvs.store_wifi_credentials("attic", "hunter22").unwrap();
    let (ssid, pass) = nvs.wifi_credentials().unwrap();
    assert_eq!(ssid.as_str(), "attic");
    assert_eq!(pass.as_str(), "hunter22");
    nvs.erase_wifi_credentials().unwrap();
    assert!(nvs.wifi_credentials().is_none());
}
