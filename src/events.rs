//! Wake-up events for the control loop.
//!
//! Events are produced by:
//! - The httpd task, after it queued a command on the [`ApiBridge`](crate::api::ApiBridge)
//! - The control loop's own schedulers (status line, WiFi check, settings save)
//!
//! The control loop drains them every iteration and only sleeps when the
//! queue is empty, so an API command is applied without waiting out the
//! poll interval.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ httpd task  │────▶│  Event Queue │────▶│  Main Loop   │
//! │ schedulers  │────▶│  (ring)      │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Maximum number of pending events (one slot stays free).
const EVENT_QUEUE_CAP: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    /// A command is waiting on the API bridge.
    ApiCommand = 0,

    // ── Schedulers ────────────────────────────────────────
    /// Periodic status line is due.
    StatusTick = 10,
    /// Check the WiFi link and run due reconnects.
    WifiCheck = 11,
    /// Persist settings if they changed.
    SettingsSave = 12,

    // ── Housekeeping ──────────────────────────────────────
    WatchdogTick = 50,
}

impl Event {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::ApiCommand),
            10 => Some(Self::StatusTick),
            11 => Some(Self::WifiCheck),
            12 => Some(Self::SettingsSave),
            50 => Some(Self::WatchdogTick),
            _ => None,
        }
    }
}

// ── Ring buffer ───────────────────────────────────────────────
//
// Producers (httpd task, main loop) take a critical section so only one
// writes the head at a time; the main loop consumes without locking.
// Slots are atomics so no `static mut` is needed.

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
static EVENT_BUFFER: [AtomicU8; EVENT_QUEUE_CAP] = [const { AtomicU8::new(0) }; EVENT_QUEUE_CAP];
static PRODUCER_LOCK: Mutex<CriticalSectionRawMutex, ()> = Mutex::new(());

/// Push an event into the queue. Returns `false` if the queue is full
/// (event dropped).
pub fn push_event(event: Event) -> bool {
    PRODUCER_LOCK.lock(|_| {
        let head = EVENT_HEAD.load(Ordering::Relaxed);
        let tail = EVENT_TAIL.load(Ordering::Acquire);
        let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

        if next_head == tail {
            return false;
        }

        EVENT_BUFFER[head as usize].store(event as u8, Ordering::Relaxed);
        EVENT_HEAD.store(next_head, Ordering::Release);
        true
    })
}

/// Pop the next event. Called from the main loop (single consumer).
pub fn pop_event() -> Option<Event> {
    loop {
        let tail = EVENT_TAIL.load(Ordering::Relaxed);
        let head = EVENT_HEAD.load(Ordering::Acquire);
        if tail == head {
            return None;
        }

        let raw = EVENT_BUFFER[tail as usize].load(Ordering::Relaxed);
        EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

        if let Some(event) = Event::from_u8(raw) {
            return Some(event);
        }
    }
}

/// Drain all pending events into a callback, in FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

pub fn queue_is_empty() -> bool {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);
    tail == head
}

/// Number of pending events.
pub fn queue_len() -> usize {
    let head = EVENT_HEAD.load(Ordering::Relaxed) as usize;
    let tail = EVENT_TAIL.load(Ordering::Relaxed) as usize;
    (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
}
