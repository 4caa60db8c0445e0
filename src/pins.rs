//! GPIO / peripheral pin assignments for the AC control board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers. The values are only defaults: `SystemConfig`
//! carries the pins actually used so a board respin does not need a reflash.

// ---------------------------------------------------------------------------
// TWAI (CAN) transceiver (SN65HVD230)
// ---------------------------------------------------------------------------

/// Digital output: TWAI TX to transceiver TXD.
pub const CAN_TX_GPIO: i32 = 5;
/// Digital input: TWAI RX from transceiver RXD.
pub const CAN_RX_GPIO: i32 = 4;

/// Pins the TWAI peripheral may be routed to on this board.
pub const CAN_CAPABLE_GPIOS: [i32; 8] = [2, 4, 5, 12, 13, 14, 15, 16];
