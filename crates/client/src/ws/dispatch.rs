//! Typed dispatch of inbound envelopes to feature handlers.
//!
//! Handlers subscribe per [`MessageKind`] and are isolated from each other:
//! one handler failing is logged and the rest still run. The handler list is
//! copied before iteration so a handler may subscribe or unsubscribe (itself
//! included) without invalidating the pass that is delivering to it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use memeshare_shared::{Envelope, MessageKind};

type Handler = Rc<RefCell<dyn FnMut(&Envelope) -> anyhow::Result<()>>>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<MessageKind, Vec<(u64, Handler)>>,
}

/// Handler registry, cheap to clone and share.
#[derive(Clone, Default)]
pub struct Dispatch {
    registry: Rc<RefCell<Registry>>,
}

impl Dispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one message kind. Dropping the returned
    /// [`Subscription`] removes the handler.
    pub fn subscribe(
        &self,
        kind: MessageKind,
        handler: impl FnMut(&Envelope) -> anyhow::Result<()> + 'static,
    ) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Rc::new(RefCell::new(handler))));
        Subscription {
            registry: Rc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    /// Deliver one envelope to every handler registered for its kind.
    ///
    /// Transport-internal kinds (PING/PONG) are never delivered.
    pub fn publish(&self, envelope: &Envelope) {
        let kind = envelope.kind();
        if kind.is_transport_internal() {
            return;
        }
        let handlers: Vec<(u64, Handler)> = self
            .registry
            .borrow()
            .handlers
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() {
            debug!(?kind, "no handler registered, dropping message");
            return;
        }
        for (id, handler) in handlers {
            if let Err(err) = (handler.borrow_mut())(envelope) {
                warn!(?kind, handler = id, %err, "message handler failed");
            }
        }
    }

    /// Drop every registered handler.
    pub fn clear(&self) {
        self.registry.borrow_mut().handlers.clear();
    }
}

/// Keeps one handler registered; removal happens on drop.
#[must_use = "dropping a Subscription removes its handler"]
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    kind: MessageKind,
    id: u64,
}

impl Subscription {
    /// Remove the handler now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.borrow_mut();
            if let Some(list) = registry.handlers.get_mut(&self.kind) {
                list.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
