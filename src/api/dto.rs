//! JSON shape of the state record, as the web UI reads and writes it.
//!
//! ```json
//! { "onOff": true, "mode": 1, "fanSpeed": 2, "currentTemp": 23.1,
//!   "setTemp": 24, "zone0": true, ..., "zone5": false }
//! ```

use serde::{Deserialize, Serialize};

use crate::app::state::{AcSettings, AcState};
use crate::protocol::types::{MAX_SET_TEMP_C, MIN_SET_TEMP_C};
use crate::protocol::{FanSpeed, Mode};

use super::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcStateDto {
    pub on_off: bool,
    pub mode: u8,
    pub fan_speed: u8,
    /// Read-only; ignored on `POST`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_temp: Option<f32>,
    pub set_temp: f32,
    pub zone0: bool,
    pub zone1: bool,
    pub zone2: bool,
    pub zone3: bool,
    pub zone4: bool,
    pub zone5: bool,
}

impl From<&AcState> for AcStateDto {
    fn from(state: &AcState) -> Self {
        let s = &state.settings;
        Self {
            on_off: s.power,
            mode: s.mode.as_byte(),
            fan_speed: s.fan_speed.as_byte(),
            current_temp: state.current_temp_c,
            set_temp: f32::from(s.set_temp_c),
            zone0: s.zones[0],
            zone1: s.zones[1],
            zone2: s.zones[2],
            zone3: s.zones[3],
            zone4: s.zones[4],
            zone5: s.zones[5],
        }
    }
}

impl AcStateDto {
    /// Validate into desired settings. `setTemp` is rounded and clamped;
    /// unknown mode or fan values are rejected.
    pub fn into_settings(self) -> Result<AcSettings, ApiError> {
        let mode = Mode::try_from(self.mode).map_err(ApiError::InvalidValue)?;
        let fan_speed = FanSpeed::try_from(self.fan_speed).map_err(ApiError::InvalidValue)?;
        if !self.set_temp.is_finite() {
            return Err(ApiError::Malformed);
        }
        let set_temp_c = self
            .set_temp
            .round()
            .clamp(f32::from(MIN_SET_TEMP_C), f32::from(MAX_SET_TEMP_C)) as u8;
        Ok(AcSettings {
            power: self.on_off,
            mode,
            fan_speed,
            set_temp_c,
            zones: [
                self.zone0, self.zone1, self.zone2, self.zone3, self.zone4, self.zone5,
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UI_BODY: &str = r#"{"onOff":true,"mode":2,"fanSpeed":3,"setTemp":22,
        "zone0":true,"zone1":false,"zone2":true,"zone3":false,"zone4":false,"zone5":true}"#;

    #[test]
    fn parses_ui_post_body() {
        let dto: AcStateDto = serde_json::from_str(UI_BODY).unwrap();
        let s = dto.into_settings().unwrap();
        assert!(s.power);
        assert_eq!(s.mode, Mode::Heat);
        assert_eq!(s.fan_speed, FanSpeed::High);
        assert_eq!(s.set_temp_c, 22);
        assert_eq!(s.zones, [true, false, true, false, false, true]);
    }

    #[test]
    fn set_temp_is_rounded_and_clamped() {
        let mut dto: AcStateDto = serde_json::from_str(UI_BODY).unwrap();
        dto.set_temp = 22.6;
        assert_eq!(dto.clone().into_settings().unwrap().set_temp_c, 23);
        dto.set_temp = 99.0;
        assert_eq!(dto.clone().into_settings().unwrap().set_temp_c, 30);
        dto.set_temp = -4.0;
        assert_eq!(dto.into_settings().unwrap().set_temp_c, 15);
    }

    #[test]
    fn rejects_unknown_mode() {
        let mut dto: AcStateDto = serde_json::from_str(UI_BODY).unwrap();
        dto.mode = 9;
        assert!(matches!(dto.into_settings(), Err(ApiError::InvalidValue(_))));
    }

    #[test]
    fn serialises_camel_case_and_omits_unknown_temp() {
        let json = serde_json::to_string(&AcStateDto::from(&AcState::default())).unwrap();
        assert!(json.contains("\"onOff\":false"));
        assert!(json.contains("\"fanSpeed\":1"));
        assert!(json.contains("\"setTemp\":24.0"));
        assert!(!json.contains("currentTemp"));
    }
}
