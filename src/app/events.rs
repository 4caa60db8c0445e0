//! Outbound application events.
//!
//! The [`AcService`](super::service::AcService) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them: log to serial, push over WebSocket,
//! refresh the API snapshot.

use crate::error::BusError;
use crate::protocol::{BusClock, CanFrame};

use super::state::AcState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries the initial state).
    Started(AcState),

    /// At least one field of the state changed.
    StateChanged(AcState),

    /// A frame was accepted by the bus driver.
    FrameSent(CanFrame),

    /// A frame arrived (only with raw frame logging enabled).
    FrameReceived(CanFrame),

    /// The controller broadcast its clock.
    BusClock(BusClock),

    /// A transmit failed; the affected field was left unchanged.
    BusFault(BusError),

    /// A field changed locally but has no bus identifier to send it on.
    Unmapped(&'static str),

    /// The bus exercise sequence moved to step `index` of `len`.
    SweepStep { index: usize, len: usize },
}
