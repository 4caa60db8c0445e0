//! WebSocket push adapter.
//!
//! Implements [`EventSink`] by serialising the state record and sending it
//! to every connected `/ws` client whenever it changes. Clients are
//! registered from the httpd task and broadcast to from the control loop,
//! so the registry is shared behind a mutex.
//!
//! A detached send is executed on the httpd task, which may itself be
//! waiting on the registry to accept a new client. Sends therefore run on
//! a snapshot taken under the lock, never while holding it.
//!
//! Sockets that report closed, or whose send fails, are dropped from the
//! registry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::api::handlers::state_json;
use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::error::CommsError;

use super::utils::prune;

/// One push-capable client connection. Clones share the underlying socket.
pub trait PushChannel: Clone + Send {
    fn send_text(&mut self, text: &str) -> Result<(), CommsError>;
    fn is_closed(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Client registry
// ───────────────────────────────────────────────────────────────

struct Slot<C> {
    id: u32,
    channel: C,
}

struct Registry<C> {
    slots: Vec<Slot<C>>,
    next_id: u32,
}

pub struct WsClients<C> {
    inner: Mutex<Registry<C>>,
    max_clients: usize,
}

impl<C: PushChannel> WsClients<C> {
    pub fn new(max_clients: u8) -> Self {
        Self {
            inner: Mutex::new(Registry {
                slots: Vec::new(),
                next_id: 0,
            }),
            max_clients: usize::from(max_clients),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a client, pruning closed ones first. Refused when full.
    pub fn register(&self, client: C) -> Result<(), CommsError> {
        let mut reg = self.lock();
        prune(&mut reg.slots, |slot| slot.channel.is_closed());
        if reg.slots.len() >= self.max_clients {
            warn!("WS | client refused, {} already connected", reg.slots.len());
            return Err(CommsError::WsClientLimit);
        }
        let id = reg.next_id;
        reg.next_id = reg.next_id.wrapping_add(1);
        reg.slots.push(Slot {
            id,
            channel: client,
        });
        info!("WS | client registered ({} connected)", reg.slots.len());
        Ok(())
    }

    /// Register `client`, then build its first message. A state published
    /// between the two still reaches it through the registry.
    pub fn admit<T>(&self, client: C, hello: impl FnOnce() -> T) -> (Result<(), CommsError>, T) {
        let registered = self.register(client);
        (registered, hello())
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send `text` to every live client. Returns how many received it.
    ///
    /// The registry lock is released while sending; clients that fail are
    /// removed afterwards by id, so registrations made meanwhile survive.
    pub fn broadcast(&self, text: &str) -> usize {
        let targets: Vec<(u32, C)> = {
            let mut reg = self.lock();
            prune(&mut reg.slots, |slot| slot.channel.is_closed());
            reg.slots
                .iter()
                .map(|slot| (slot.id, slot.channel.clone()))
                .collect()
        };

        let mut failed = Vec::new();
        for (id, mut channel) in targets.iter().cloned() {
            if let Err(e) = channel.send_text(text) {
                debug!("WS | dropping client {}: {}", id, e);
                failed.push(id);
            }
        }

        if !failed.is_empty() {
            self.lock().slots.retain(|slot| !failed.contains(&slot.id));
        }
        targets.len() - failed.len()
    }
}

// ───────────────────────────────────────────────────────────────
// EventSink
// ───────────────────────────────────────────────────────────────

/// Pushes every published state to the registered clients.
pub struct WsBroadcaster<C> {
    clients: Arc<WsClients<C>>,
}

impl<C: PushChannel> WsBroadcaster<C> {
    pub fn new(clients: Arc<WsClients<C>>) -> Self {
        Self { clients }
    }
}

impl<C: PushChannel> EventSink for WsBroadcaster<C> {
    fn emit(&mut self, event: &AppEvent) {
        let AppEvent::StateChanged(state) = event else {
            return;
        };
        if self.clients.is_empty() {
            return;
        }
        let sent = self.clients.broadcast(&state_json(state));
        debug!("WS | state pushed to {} client(s)", sent);
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF channel
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
#[derive(Clone)]
pub struct EspWsChannel {
    sender: esp_idf_svc::http::server::ws::EspHttpWsDetachedSender,
}

#[cfg(target_os = "espidf")]
impl EspWsChannel {
    pub fn new(sender: esp_idf_svc::http::server::ws::EspHttpWsDetachedSender) -> Self {
        Self { sender }
    }
}

#[cfg(target_os = "espidf")]
impl PushChannel for EspWsChannel {
    fn send_text(&mut self, text: &str) -> Result<(), CommsError> {
        use esp_idf_svc::ws::FrameType;
        self.sender
            .send(FrameType::Text(false), text.as_bytes())
            .map_err(|_| CommsError::WsSendFailed)
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
