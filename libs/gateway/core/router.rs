//! Dispatch routing
//!
//! # Architecture
//!
//! ```text
//! receive loop ──> route(frame)
//!                    │
//!                    ├─ DISPATCH? sequence.observe(s)      (synchronous)
//!                    │
//!                    ├─ opcode listeners[op]  ──> one task each
//!                    │
//!                    └─ DISPATCH? event listeners[t] ──> one task each
//! ```
//!
//! # Ordering
//!
//! - The sequence number is recorded before any listener is scheduled, so the
//!   heartbeat monitor never reads a value older than the last routed dispatch.
//! - Frames are routed in socket-arrival order. Listeners for one frame run
//!   concurrently and may complete in any order.
//! - A failing or panicking listener is confined to its own task.

use crate::core::listeners::{Listener, ListenerId, Registry};
use crate::core::sequence::SequenceTracker;
use crate::protocol::{Frame, Opcode};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Opcode and event-name listener registries plus the shared sequence number
pub struct DispatchRouter {
    opcode_listeners: Registry<Opcode>,
    event_listeners: Registry<String>,
    sequence: Arc<SequenceTracker>,
}

impl DispatchRouter {
    pub fn new(sequence: Arc<SequenceTracker>) -> Self {
        Self {
            opcode_listeners: Registry::new(),
            event_listeners: Registry::new(),
            sequence,
        }
    }

    /// Invoke `listener` for every inbound frame with `opcode`
    pub fn register_opcode_listener<F>(&self, opcode: Opcode, listener: F) -> ListenerId
    where
        F: Fn(Arc<Frame>) -> crate::Result<()> + Send + Sync + 'static,
    {
        let id = self.opcode_listeners.register(opcode, Arc::new(listener));
        debug!("Registered opcode listener {:?} for {}", id, opcode);
        id
    }

    /// Invoke `listener` for every dispatch frame named `event_name`
    pub fn register_event_listener<F>(&self, event_name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(Arc<Frame>) -> crate::Result<()> + Send + Sync + 'static,
    {
        let event_name = event_name.into();
        debug!("Registered event listener for {}", event_name);
        self.event_listeners.register(event_name, Arc::new(listener))
    }

    /// Register an event listener that is removed when the guard drops
    pub fn register_event_listener_guarded<F>(
        self: &Arc<Self>,
        event_name: impl Into<String>,
        listener: F,
    ) -> EventListenerGuard
    where
        F: Fn(Arc<Frame>) -> crate::Result<()> + Send + Sync + 'static,
    {
        let event_name = event_name.into();
        let id = self.register_event_listener(event_name.clone(), listener);
        EventListenerGuard {
            router: Arc::downgrade(self),
            event_name,
            id,
        }
    }

    pub fn remove_opcode_listener(&self, opcode: Opcode, id: ListenerId) -> bool {
        self.opcode_listeners.remove(&opcode, id)
    }

    pub fn remove_event_listener(&self, event_name: &str, id: ListenerId) -> bool {
        self.event_listeners.remove(event_name, id)
    }

    pub fn opcode_listener_count(&self, opcode: Opcode) -> usize {
        self.opcode_listeners.count(&opcode)
    }

    pub fn event_listener_count(&self, event_name: &str) -> usize {
        self.event_listeners.count(event_name)
    }

    pub fn sequence(&self) -> &Arc<SequenceTracker> {
        &self.sequence
    }

    /// Route one inbound frame
    ///
    /// Must be called from within a Tokio runtime. Returns the number of
    /// listener invocations scheduled.
    pub fn route(&self, frame: Arc<Frame>) -> usize {
        let opcode = frame.opcode();
        let is_dispatch = opcode == Opcode::DISPATCH;

        if is_dispatch {
            if let Some(seq) = frame.sequence() {
                self.sequence.observe(seq);
            }
        }

        let mut scheduled = spawn_all(self.opcode_listeners.snapshot(&opcode), &frame);

        if is_dispatch {
            match frame.event_name() {
                Some(name) => {
                    scheduled += spawn_all(self.event_listeners.snapshot(name), &frame);
                }
                None => debug!("Dispatch frame without event name"),
            }
        }

        scheduled
    }
}

fn spawn_all(listeners: Vec<Listener>, frame: &Arc<Frame>) -> usize {
    let count = listeners.len();
    for listener in listeners {
        let frame = Arc::clone(frame);
        tokio::spawn(async move {
            let opcode = frame.opcode();
            if let Err(e) = listener(Arc::clone(&frame)) {
                match frame.event_name() {
                    Some(name) => error!("Listener for {} ({}) failed: {}", name, opcode, e),
                    None => error!("Listener for opcode {} failed: {}", opcode, e),
                }
            }
        });
    }
    count
}

/// Removes an event listener when dropped
#[must_use = "the listener is removed as soon as the guard is dropped"]
pub struct EventListenerGuard {
    router: Weak<DispatchRouter>,
    event_name: String,
    id: ListenerId,
}

impl EventListenerGuard {
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for EventListenerGuard {
    fn drop(&mut self) {
        if let Some(router) = self.router.upgrade() {
            router.remove_event_listener(&self.event_name, self.id);
        }
    }
}
