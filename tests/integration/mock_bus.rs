//! Mock adapters for integration tests.
//!
//! Records every transmitted frame and emitted event so tests can assert
//! on the full history without a TWAI controller.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use accontrol::app::events::AppEvent;
use accontrol::app::ports::{BusPort, EventSink, StorageError, StoragePort};
use accontrol::error::BusError;
use accontrol::protocol::ids::STATUS_ID;
use accontrol::protocol::CanFrame;

// ── MockBus ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockBus {
    pub sent: Vec<CanFrame>,
    pub rx: VecDeque<CanFrame>,
    /// Every transmit fails with this error while set.
    pub fail_with: Option<BusError>,
}

#[allow(dead_code)]
impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame as if the controller had broadcast it.
    pub fn inject(&mut self, frame: CanFrame) {
        self.rx.push_back(frame);
    }

    pub fn sent_ids(&self) -> Vec<u32> {
        self.sent.iter().map(CanFrame::id).collect()
    }

    pub fn last_sent(&self) -> Option<&CanFrame> {
        self.sent.last()
    }
}

impl BusPort for MockBus {
    fn transmit(&mut self, frame: &CanFrame) -> Result<(), BusError> {
        if let Some(e) = self.fail_with {
            return Err(e);
        }
        self.sent.push(*frame);
        Ok(())
    }

    fn receive(&mut self) -> Option<CanFrame> {
        self.rx.pop_front()
    }
}

/// Extended 8-byte frame.
pub fn frame(id: u32, data: [u8; 8]) -> CanFrame {
    CanFrame::extended(id, &data).unwrap()
}

/// Status broadcast at 21:05:30 on 2024-09-17. Bytes 4..6 also read as
/// 23.28 °C.
pub fn status_frame() -> CanFrame {
    frame(STATUS_ID, [21, 5, 30, 0, 24, 9, 17, 0])
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_changes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::StateChanged(_)))
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: RefCell<HashMap<String, Vec<u8>>>,
    pub writes: usize,
    pub full: bool,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(ns: &str, key: &str) -> String {
        format!("{ns}::{key}")
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let store = self.store.borrow();
        let data = store
            .get(&Self::key(namespace, key))
            .ok_or(StorageError::NotFound)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.full {
            return Err(StorageError::Full);
        }
        self.writes += 1;
        self.store
            .borrow_mut()
            .insert(Self::key(namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.borrow_mut().remove(&Self::key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.borrow().contains_key(&Self::key(namespace, key))
    }
}
