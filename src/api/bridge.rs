//! Hand-off between the HTTP server's task and the control loop.
//!
//! ```text
//!   httpd task ──submit()──▶ [command queue] ──take_command()──▶ control loop
//!   httpd task ◀─snapshot()── [state cell]  ◀──emit(StateChanged)── AcService
//! ```
//!
//! The HTTP handlers never touch the bus or the service directly. They
//! read the last published state and queue commands; the control loop
//! drains the queue on its next iteration.

use core::cell::{Cell, RefCell};
use core::time::Duration;

use burster::Limiter;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::commands::AppCommand;
use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::app::state::AcState;

use super::ApiError;

/// Commands that may wait for the control loop.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

/// Sustained `POST` rate, requests per second.
pub const RATE_PER_SEC: u64 = 5;
/// Requests allowed back-to-back before throttling.
pub const RATE_BURST: u64 = 10;

pub struct ApiBridge {
    commands: Channel<CriticalSectionRawMutex, AppCommand, COMMAND_QUEUE_DEPTH>,
    snapshot: Mutex<CriticalSectionRawMutex, Cell<AcState>>,
    limiter: Mutex<CriticalSectionRawMutex, RefCell<burster::TokenBucket<fn() -> Duration>>>,
}

impl ApiBridge {
    pub fn new() -> Self {
        Self {
            commands: Channel::new(),
            snapshot: Mutex::new(Cell::new(AcState::DEFAULT)),
            limiter: Mutex::new(RefCell::new(burster::TokenBucket::new_with_time_provider(
                RATE_PER_SEC,
                RATE_BURST,
                platform_now as fn() -> Duration,
            ))),
        }
    }

    /// Last state published by the service.
    pub fn snapshot(&self) -> AcState {
        self.snapshot.lock(Cell::get)
    }

    pub fn publish(&self, state: AcState) {
        self.snapshot.lock(|cell| cell.set(state));
    }

    /// Queue a command for the control loop. Fails with
    /// [`ApiError::Busy`] when the queue is full.
    pub fn submit(&self, command: AppCommand) -> Result<(), ApiError> {
        self.commands.try_send(command).map_err(|_| ApiError::Busy)
    }

    /// Next queued command, if any. Never blocks.
    pub fn take_command(&self) -> Option<AppCommand> {
        self.commands.try_receive().ok()
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Take one token from the request limiter.
    pub fn try_acquire(&self) -> bool {
        self.limiter
            .lock(|bucket| bucket.borrow_mut().try_consume(1).is_ok())
    }
}

impl Default for ApiBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the snapshot current. Passed to the service as `&ApiBridge`.
impl EventSink for &ApiBridge {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) | AppEvent::StateChanged(state) => self.publish(*state),
            _ => {}
        }
    }
}

// ── Platform time for rate limiter ───────────────────────────

#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    let us = unsafe { esp_idf_sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}
