//! Controller bus protocol.
//!
//! A fixed set of extended-identifier frames, each carrying one settings
//! field. There is no session, sequencing or acknowledgement: a frame on the
//! bus is the whole conversation.

pub mod codec;
pub mod frame;
pub mod ids;
pub mod types;

pub use codec::{BusReport, decode};
pub use frame::CanFrame;
pub use ids::FrameIds;
pub use types::{BusClock, FanSpeed, Mode, ZONE_COUNT};
