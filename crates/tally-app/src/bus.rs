//! # Event Bus
//!
//! In-process [`EventDispatcher`]: each event goes to every subscribed
//! listener, one after another, in subscription order.
//!
//! ```text
//! dispatch(event)
//!      │
//!      ├──► listener 1 .handle(&event)   (awaited)
//!      ├──► listener 2 .handle(&event)   (awaited)
//!      └──► ...
//! ```
//!
//! Listeners cannot fail the dispatch: `handle` returns nothing, so a
//! listener that can fail must contain its own failures.
//!
//! ## Nested Dispatch
//! A listener may dispatch while it handles an event (the loyalty listener
//! does). Such events are queued on the current task and delivered after
//! the outer event has reached every listener, first in, first out. Every
//! listener therefore sees a cause before its effects:
//!
//! ```text
//! dispatch(PosOrderPlaced)
//!      ├──► loyalty listener ── dispatch(LoyaltyPointsAccrued) ──► queued
//!      ├──► event log        sees PosOrderPlaced
//!      └──► drain queue      LoyaltyPointsAccrued ──► every listener
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tracing::debug;

use tally_core::events::DomainEvent;

use crate::ports::{EventDispatcher, EventListener};

/// Events waiting for delivery on the task currently draining a bus.
struct Pending {
    bus: usize,
    queue: VecDeque<DomainEvent>,
}

tokio::task_local! {
    static PENDING: RefCell<Pending>;
}

#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        debug!(listener = listener.name(), "Listener subscribed");
        listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn id(&self) -> usize {
        self as *const EventBus as usize
    }

    /// Queues `event` if this task is already draining this bus.
    /// Hands it back otherwise.
    fn defer(&self, event: DomainEvent) -> Option<DomainEvent> {
        let mut event = Some(event);
        let _ = PENDING.try_with(|pending| {
            let mut pending = pending.borrow_mut();
            if pending.bus == self.id() {
                pending.queue.extend(event.take());
            }
        });
        event
    }

    async fn deliver(&self, event: &DomainEvent) {
        // Snapshot so no lock is held across awaits
        let listeners: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        debug!(
            event = event.name(),
            listeners = listeners.len(),
            "Dispatching event"
        );

        for listener in listeners {
            listener.handle(event).await;
        }
    }
}

#[async_trait]
impl EventDispatcher for EventBus {
    async fn dispatch(&self, event: DomainEvent) {
        let Some(event) = self.defer(event) else {
            debug!("Nested dispatch queued");
            return;
        };

        let pending = RefCell::new(Pending {
            bus: self.id(),
            queue: VecDeque::from([event]),
        });

        PENDING
            .scope(pending, async {
                while let Some(next) = PENDING.with(|p| p.borrow_mut().queue.pop_front()) {
                    self.deliver(&next).await;
                }
            })
            .await;
    }
}

/// Listener that keeps every event it sees, in order.
///
/// Handy for audit trails in development and for asserting on events in
/// tests.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<DomainEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Event names in dispatch order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(DomainEvent::name).collect()
    }
}

#[async_trait]
impl EventListener for EventLog {
    fn name(&self) -> &'static str {
        "event_log"
    }

    async fn handle(&self, event: &DomainEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
