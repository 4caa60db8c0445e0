//! Transport-independent request handling for `/api` and `/ws`.
//!
//! The HTTP adapter only moves bytes; status codes and bodies are
//! decided here so they can be tested off-target.

use log::{debug, warn};

use crate::app::commands::AppCommand;
use crate::app::state::AcState;

use super::bridge::ApiBridge;
use super::dto::AcStateDto;
use super::ApiError;

/// Largest accepted `POST /api` body.
pub const MAX_BODY_LEN: usize = 1024;

/// Headers sent with every `/api` response so the UI can be served
/// from another origin during development.
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

pub const CONTENT_TYPE_JSON: (&str, &str) = ("Content-Type", "application/json");

/// Largest frame a `/ws` client may send before its session is closed.
pub const MAX_WS_FRAME_LEN: usize = MAX_BODY_LEN;

/// What to do with a frame received on `/ws`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsInbound {
    /// Read this many payload bytes and drop them.
    Discard(usize),
    /// Too large to buffer; end the session.
    Close,
}

/// `/ws` is push-only, but every incoming payload still has to be read
/// off the socket or the next frame header is parsed from its bytes.
pub fn inbound_ws_frame(len: usize) -> WsInbound {
    if len > MAX_WS_FRAME_LEN {
        WsInbound::Close
    } else {
        WsInbound::Discard(len)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    fn json(status: u16, body: String) -> Self {
        Self { status, body }
    }

    pub fn error(err: ApiError) -> Self {
        Self::json(err.status(), format!("{{\"error\":\"{err}\"}}"))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// HTTP reason phrase for the status line.
    pub fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            202 => "Accepted",
            204 => "No Content",
            400 => "Bad Request",
            413 => "Payload Too Large",
            429 => "Too Many Requests",
            503 => "Service Unavailable",
            _ => "",
        }
    }
}

/// Serialise a state record the way `GET /api` and `/ws` deliver it.
pub fn state_json(state: &AcState) -> String {
    serde_json::to_string(&AcStateDto::from(state)).unwrap_or_default()
}

/// `GET /api`
pub fn get_state(bridge: &ApiBridge) -> ApiResponse {
    ApiResponse::json(200, state_json(&bridge.snapshot()))
}

/// `POST /api`: validate the body and queue it as one `Apply` command.
///
/// Answers `202` with the state as it will look once applied; the bus
/// may still overwrite it.
pub fn post_state(bridge: &ApiBridge, body: &[u8]) -> ApiResponse {
    match accept(bridge, body) {
        Ok(state) => ApiResponse::json(202, state_json(&state)),
        Err(e) => {
            warn!("API | POST rejected: {}", e);
            ApiResponse::error(e)
        }
    }
}

/// `OPTIONS /api` (CORS preflight)
pub fn preflight() -> ApiResponse {
    ApiResponse::json(204, String::new())
}

fn accept(bridge: &ApiBridge, body: &[u8]) -> Result<AcState, ApiError> {
    if !bridge.try_acquire() {
        return Err(ApiError::RateLimited);
    }
    if body.len() > MAX_BODY_LEN {
        return Err(ApiError::BodyTooLarge);
    }
    let dto: AcStateDto = serde_json::from_slice(body).map_err(|_| ApiError::Malformed)?;
    let settings = dto.into_settings()?;
    bridge.submit(AppCommand::Apply(settings))?;
    debug!("API | queued {:?}", settings);

    Ok(AcState {
        settings,
        current_temp_c: bridge.snapshot().current_temp_c,
    })
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use crate::protocol::Mode;

    const BODY: &[u8] = br#"{"onOff":true,"mode":5,"fanSpeed":2,"currentTemp":99.5,"setTemp":21,
        "zone0":false,"zone1":true,"zone2":false,"zone3":false,"zone4":false,"zone5":false}"#;

    #[test]
    fn get_returns_snapshot() {
        let bridge = ApiBridge::new();
        let mut state = AcState::DEFAULT;
        state.current_temp_c = Some(22.5);
        bridge.publish(state);

        let resp = get_state(&bridge);
        assert_eq!(resp.status, 200);
        assert!(resp.body.contains("\"currentTemp\":22.5"));
    }

    #[test]
    fn post_queues_apply_and_ignores_current_temp() {
        let bridge = ApiBridge::new();
        let resp = post_state(&bridge, BODY);
        assert_eq!(resp.status, 202);
        assert!(!resp.body.contains("99.5"));

        match bridge.take_command() {
            Some(AppCommand::Apply(s)) => {
                assert!(s.power);
                assert_eq!(s.mode, Mode::Auto);
                assert_eq!(s.set_temp_c, 21);
                assert!(s.zones[1]);
            }
            other => panic!("expected Apply, got {other:?}"),
        }
    }

    #[test]
    fn post_rejects_garbage_and_oversize() {
        let bridge = ApiBridge::new();
        assert_eq!(post_state(&bridge, b"{not json").status, 400);
        assert_eq!(post_state(&bridge, &[b' '; MAX_BODY_LEN + 1]).status, 413);
        assert_eq!(bridge.take_command(), None);
    }

    #[test]
    fn post_reports_full_queue() {
        let bridge = ApiBridge::new();
        for _ in 0..super::super::bridge::COMMAND_QUEUE_DEPTH {
            assert_eq!(post_state(&bridge, BODY).status, 202);
        }
        assert_eq!(post_state(&bridge, BODY).status, 503);
    }

    #[test]
    fn ws_frames_are_drained_or_the_session_closed() {
        assert_eq!(inbound_ws_frame(0), WsInbound::Discard(0));
        assert_eq!(inbound_ws_frame(129), WsInbound::Discard(129));
        assert_eq!(
            inbound_ws_frame(MAX_WS_FRAME_LEN),
            WsInbound::Discard(MAX_WS_FRAME_LEN)
        );
        assert_eq!(inbound_ws_frame(MAX_WS_FRAME_LEN + 1), WsInbound::Close);
    }

    #[test]
    fn error_body_is_json() {
        let resp = ApiResponse::error(ApiError::RateLimited);
        assert_eq!(resp.status, 429);
        assert_eq!(resp.reason(), "Too Many Requests");
        let v: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert!(v["error"].is_string());
    }
}
