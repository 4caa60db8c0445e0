//! Application core: pure domain logic, zero I/O.
//!
//! This module holds the state record, the command/event vocabulary and the
//! service that mirrors the state between bus frames and the web API. All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod state;
pub mod sweep;
