//! End-to-end web API flow without a socket: request bodies go through the
//! handlers, commands cross the bridge, the service puts frames on a mock
//! bus, and the published state comes back out through `GET` and `/ws`.

use std::sync::{Arc, Mutex};

use super::mock_bus::{MockBus, RecordingSink, frame};

use accontrol::adapters::ws_push::{PushChannel, WsBroadcaster, WsClients};
use accontrol::api::ApiBridge;
use accontrol::api::bridge::{COMMAND_QUEUE_DEPTH, RATE_BURST};
use accontrol::api::handlers::{self, MAX_BODY_LEN};
use accontrol::app::service::AcService;
use accontrol::config::SystemConfig;
use accontrol::error::CommsError;
use accontrol::protocol::ids::{MODE_ID, SET_TEMP_ID, ZONE_BASE_ID, ZONE_ID_STRIDE};

const HEAT_ZONE2: &[u8] = br#"{"onOff":false,"mode":2,"fanSpeed":1,"setTemp":26,
    "zone0":false,"zone1":false,"zone2":true,"zone3":false,"zone4":false,"zone5":false}"#;

/// Shared-buffer channel so the test can read what a client received.
#[derive(Clone, Default)]
struct Recorder {
    received: Arc<Mutex<Vec<String>>>,
}

impl PushChannel for Recorder {
    fn send_text(&mut self, text: &str) -> Result<(), CommsError> {
        self.received.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

/// Drain the bridge the way the control loop does.
fn run_loop_once(
    bridge: &ApiBridge,
    svc: &mut AcService,
    bus: &mut MockBus,
    sink: &mut impl accontrol::app::ports::EventSink,
) {
    while let Some(cmd) = bridge.take_command() {
        svc.handle_command(cmd, bus, sink);
    }
}

#[test]
fn post_then_get_reflects_applied_state() {
    let bridge = ApiBridge::new();
    let mut svc = AcService::new(&SystemConfig::default());
    let mut bus = MockBus::new();
    let mut sink = (&bridge, RecordingSink::new());
    svc.start(&mut sink);

    let resp = handlers::post_state(&bridge, HEAT_ZONE2);
    assert_eq!(resp.status, 202);
    assert_eq!(bridge.pending_commands(), 1);

    run_loop_once(&bridge, &mut svc, &mut bus, &mut sink);

    assert_eq!(
        bus.sent_ids(),
        [MODE_ID, SET_TEMP_ID, ZONE_BASE_ID + 2 * ZONE_ID_STRIDE]
    );

    let get = handlers::get_state(&bridge);
    assert_eq!(get.status, 200);
    let v: serde_json::Value = serde_json::from_str(&get.body).unwrap();
    assert_eq!(v["mode"], 2);
    assert_eq!(v["setTemp"], 26.0);
    assert_eq!(v["zone2"], true);
    assert!(v.get("currentTemp").is_none(), "no status frame seen yet");
}

#[test]
fn bus_report_reaches_websocket_clients() {
    let bridge = ApiBridge::new();
    let clients = Arc::new(WsClients::<Recorder>::new(2));
    let client = Recorder::default();
    clients.register(client.clone()).unwrap();

    let mut svc = AcService::new(&SystemConfig::default());
    let mut bus = MockBus::new();
    let mut sink = (&bridge, WsBroadcaster::new(clients.clone()));
    svc.start(&mut sink);

    bus.inject(frame(MODE_ID, [3, 9, 0, 0, 0, 0, 0, 0]));
    svc.poll_bus(&mut bus, &mut sink);

    let received = client.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let v: serde_json::Value = serde_json::from_str(&received[0]).unwrap();
    assert_eq!(v["mode"], 3);
    assert_eq!(handlers::get_state(&bridge).body, received[0]);
}

#[test]
fn websocket_registry_is_bounded() {
    let clients = WsClients::<Recorder>::new(1);
    assert!(clients.register(Recorder::default()).is_ok());
    assert_eq!(
        clients.register(Recorder::default()),
        Err(CommsError::WsClientLimit)
    );
    assert_eq!(clients.len(), 1);
}

#[test]
fn invalid_values_are_rejected_with_400() {
    let bridge = ApiBridge::new();
    let bad_mode = br#"{"onOff":true,"mode":9,"fanSpeed":1,"setTemp":24,
        "zone0":false,"zone1":false,"zone2":false,"zone3":false,"zone4":false,"zone5":false}"#;
    let missing_field = br#"{"onOff":true,"mode":1}"#;

    assert_eq!(handlers::post_state(&bridge, bad_mode).status, 400);
    assert_eq!(handlers::post_state(&bridge, missing_field).status, 400);
    assert_eq!(bridge.pending_commands(), 0);
}

#[test]
fn oversized_body_is_rejected_with_413() {
    let bridge = ApiBridge::new();
    let body = vec![b' '; MAX_BODY_LEN + 1];
    let resp = handlers::post_state(&bridge, &body);
    assert_eq!(resp.status, 413);
    assert_eq!(resp.reason(), "Payload Too Large");
}

#[test]
fn full_command_queue_answers_503() {
    let bridge = ApiBridge::new();
    for _ in 0..COMMAND_QUEUE_DEPTH {
        assert!(handlers::post_state(&bridge, HEAT_ZONE2).is_success());
    }
    assert_eq!(handlers::post_state(&bridge, HEAT_ZONE2).status, 503);
}

#[test]
fn request_flood_is_rate_limited() {
    let bridge = ApiBridge::new();
    let statuses: Vec<u16> = (0..RATE_BURST * 3)
        .map(|_| handlers::post_state(&bridge, b"{").status)
        .collect();
    assert!(statuses.contains(&400));
    assert!(statuses.contains(&429));
}

#[test]
fn preflight_is_empty_204() {
    let resp = handlers::preflight();
    assert_eq!(resp.status, 204);
    assert!(resp.body.is_empty());
    assert_eq!(handlers::CORS_HEADERS[0], ("Access-Control-Allow-Origin", "*"));
}
