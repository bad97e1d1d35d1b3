//! Subscriber registry and fan-out for live feed events.
//!
//! Three channels exist: connection changes (`bool`), errors
//! ([`LiveError`]), and inbound messages keyed by kind. Every registration
//! returns a [`Subscription`] whose [`unsubscribe`](Subscription::unsubscribe)
//! may be called any number of times.
//!
//! Dispatch clones the handler list before invoking anything, so a handler
//! may subscribe or unsubscribe (itself included) while it runs. Each
//! handler is invoked under [`catch_unwind`]; a panicking handler is logged
//! and the remaining handlers still run.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tracing::error;

use crate::error::LiveError;

/// Kind under which every inbound message is delivered unmodified.
pub const MESSAGE_CHANNEL: &str = "message";

/// Field carrying the message kind discriminator.
pub const KIND_FIELD: &str = "type";

type ConnectionHandler = Arc<dyn Fn(bool) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&LiveError) + Send + Sync>;
type MessageHandler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    connection: Vec<(u64, ConnectionHandler)>,
    errors: Vec<(u64, ErrorHandler)>,
    messages: HashMap<String, Vec<(u64, MessageHandler)>>,
}

impl Registry {
    const fn allocate(&mut self) -> u64 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }
}

/// Which list a [`Subscription`] belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Connection,
    Error,
    Message(String),
}

/// Handle returned by every registration.
///
/// Dropping the handle leaves the handler registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    slot: Slot,
    id: u64,
}

impl Subscription {
    /// Remove the handler. Calling this again, or after the feed is gone,
    /// does nothing.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
        match &self.slot {
            Slot::Connection => registry.connection.retain(|(id, _)| *id != self.id),
            Slot::Error => registry.errors.retain(|(id, _)| *id != self.id),
            Slot::Message(kind) => {
                if let Some(handlers) = registry.messages.get_mut(kind) {
                    handlers.retain(|(id, _)| *id != self.id);
                    if handlers.is_empty() {
                        registry.messages.remove(kind);
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("slot", &self.slot)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Shared subscriber registry.
#[derive(Clone, Default)]
pub struct Listeners {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        f.debug_struct("Listeners")
            .field("connection", &registry.connection.len())
            .field("errors", &registry.errors.len())
            .field("message_kinds", &registry.messages.len())
            .finish()
    }
}

impl Listeners {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, slot: Slot, id: u64) -> Subscription {
        Subscription {
            registry: Arc::downgrade(&self.registry),
            slot,
            id,
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a connection-change handler.
    pub fn on_connection_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.lock();
            let id = registry.allocate();
            registry.connection.push((id, Arc::new(handler)));
            id
        };
        self.handle(Slot::Connection, id)
    }

    /// Register an error handler.
    pub fn on_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&LiveError) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.lock();
            let id = registry.allocate();
            registry.errors.push((id, Arc::new(handler)));
            id
        };
        self.handle(Slot::Error, id)
    }

    /// Register a handler for messages of `kind`.
    ///
    /// Handlers registered under [`MESSAGE_CHANNEL`] receive every message
    /// verbatim. Handlers for any other kind receive the message with its
    /// `type` field removed.
    pub fn subscribe<F>(&self, kind: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.lock();
            let id = registry.allocate();
            registry
                .messages
                .entry(kind.to_owned())
                .or_default()
                .push((id, Arc::new(handler)));
            id
        };
        self.handle(Slot::Message(kind.to_owned()), id)
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    /// Notify connection handlers.
    pub fn notify_connection(&self, connected: bool) {
        let handlers: Vec<ConnectionHandler> = self
            .lock()
            .connection
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in handlers {
            invoke("connection", || handler(connected));
        }
    }

    /// Deliver an error to error handlers.
    pub fn notify_error(&self, err: &LiveError) {
        let handlers: Vec<ErrorHandler> = self
            .lock()
            .errors
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in handlers {
            invoke("error", || handler(err));
        }
    }

    /// Deliver a parsed message to kind handlers (payload without the
    /// discriminator) and then to [`MESSAGE_CHANNEL`] handlers (verbatim).
    pub fn dispatch(&self, message: &Value) {
        let kind = message
            .get(KIND_FIELD)
            .and_then(Value::as_str)
            .filter(|kind| !kind.is_empty());

        let (by_kind, generic) = {
            let registry = self.lock();
            let snapshot = |key: &str| -> Vec<MessageHandler> {
                registry
                    .messages
                    .get(key)
                    .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                    .unwrap_or_default()
            };
            (kind.map(&snapshot).unwrap_or_default(), snapshot(MESSAGE_CHANNEL))
        };

        if !by_kind.is_empty() {
            let payload = strip_kind(message);
            for handler in by_kind {
                invoke("message", || handler(&payload));
            }
        }
        for handler in generic {
            invoke("message", || handler(message));
        }
    }

    /// Number of connection handlers registered.
    pub fn connection_handlers(&self) -> usize {
        self.lock().connection.len()
    }

    /// Number of handlers registered for `kind`.
    pub fn message_handlers(&self, kind: &str) -> usize {
        self.lock().messages.get(kind).map_or(0, Vec::len)
    }
}

fn strip_kind(message: &Value) -> Value {
    let mut payload = message.clone();
    if let Value::Object(map) = &mut payload {
        map.remove(KIND_FIELD);
    }
    payload
}

fn invoke(channel: &'static str, call: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        error!(channel, "subscriber panicked; continuing with remaining handlers");
    }
}
