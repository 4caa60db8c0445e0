//! Fuzz target: `protocol::decode`
//!
//! Builds a frame from the first bytes of the input (identifier, flags,
//! length) and decodes it against both the default identifier table and
//! one with a power identifier mapped. Decoding must never panic and must
//! only report values the rest of the firmware accepts.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use accontrol::protocol::types::{MAX_SET_TEMP_C, MIN_SET_TEMP_C};
use accontrol::protocol::{BusReport, CanFrame, FrameIds, ZONE_COUNT, decode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 5 {
        return;
    }
    let id = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let flags = data[4];
    let payload = &data[5..data.len().min(13)];

    let Some(frame) = CanFrame::new(id, flags & 1 != 0, flags & 2 != 0, payload) else {
        return;
    };
    assert!(frame.data().len() <= 8);

    let mut with_power = FrameIds::default();
    with_power.power = Some(0x140C_0010);

    for table in [FrameIds::default(), with_power] {
        match decode(&table, &frame) {
            Some(BusReport::SetTemperature(t)) => {
                assert!((MIN_SET_TEMP_C..=MAX_SET_TEMP_C).contains(&t));
            }
            Some(BusReport::Zone { zone, .. }) => assert!((zone as usize) < ZONE_COUNT),
            Some(BusReport::Status { current_temp_c, .. }) => {
                assert!(current_temp_c.is_finite());
            }
            _ => {}
        }
    }
});
