//! Typed publish/subscribe event bus.
//!
//! Systems communicate through events instead of direct calls: a collision
//! pass publishes `DamageEvent`, the health system subscribes and applies it,
//! and neither knows about the other. Two delivery modes exist:
//!
//! - [`publish`](EventBus::publish) invokes all subscribers synchronously, in
//!   subscription order, before it returns. This gives deterministic
//!   within-tick ordering.
//! - [`publish_deferred`](EventBus::publish_deferred) appends to a FIFO queue
//!   drained by [`process_deferred`](EventBus::process_deferred). Use this
//!   for events raised mid-iteration of a storage the handler would mutate.
//!
//! Handlers receive the [`Registry`] as an explicit `&mut` parameter rather
//! than capturing it, which is what makes the borrow checker happy about a
//! handler mutating storages while the bus dispatches. The bus itself lives
//! behind a shared handle ([`EventBus`] is `Clone`), so a handler may publish
//! further events re-entrantly; the subscriber list is snapshotted before
//! dispatch.

use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::registry::Registry;

// ---------------------------------------------------------------------------
// SubscriptionId
// ---------------------------------------------------------------------------

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Type-erased subscriber callback.
type ErasedCallback = dyn FnMut(&mut Registry, &dyn Any) + Send;

/// Deferred event: a closure that re-publishes the captured event by value.
type DeferredEvent = Box<dyn FnOnce(&EventBus, &mut Registry) + Send>;

struct Subscription {
    id: SubscriptionId,
    // Each callback sits behind its own lock so the subscriber list can be
    // snapshotted and released before dispatch. A handler must not publish
    // an event that transitively re-enters itself.
    callback: Arc<Mutex<ErasedCallback>>,
}

#[derive(Default)]
struct BusInner {
    subscribers: HashMap<TypeId, Vec<Subscription>>,
    deferred: VecDeque<DeferredEvent>,
    next_id: u64,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Shared-handle event bus. Cloning is cheap and clones observe the same
/// subscriber set and deferred queue.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    /// Create a new, empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events of type `E`.
    ///
    /// The callback runs synchronously inside [`publish`](Self::publish),
    /// receiving the registry and the event. Subscribers for one event type
    /// are invoked in subscription order.
    pub fn subscribe<E, F>(&self, mut callback: F) -> SubscriptionId
    where
        E: Any,
        F: FnMut(&mut Registry, &E) + Send + 'static,
    {
        let erased = move |registry: &mut Registry, event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                callback(registry, event);
            }
        };
        let mut inner = self.inner.lock().unwrap();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner
            .subscribers
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Subscription {
                id,
                callback: Arc::new(Mutex::new(erased)),
            });
        id
    }

    /// Publish `event` to all current subscribers of `E`, synchronously and
    /// in subscription order. Subscribers added during dispatch see only
    /// later events.
    pub fn publish<E: Any>(&self, registry: &mut Registry, event: &E) {
        let callbacks: Vec<Arc<Mutex<ErasedCallback>>> = {
            let inner = self.inner.lock().unwrap();
            match inner.subscribers.get(&TypeId::of::<E>()) {
                Some(subs) => subs.iter().map(|s| Arc::clone(&s.callback)).collect(),
                None => return,
            }
        };
        for callback in callbacks {
            let mut callback = callback.lock().unwrap();
            (*callback)(registry, event);
        }
    }

    /// Queue `event` for later delivery by [`process_deferred`](Self::process_deferred).
    pub fn publish_deferred<E: Any + Send>(&self, event: E) {
        let mut inner = self.inner.lock().unwrap();
        inner.deferred.push_back(Box::new(move |bus, registry| {
            bus.publish(registry, &event);
        }));
    }

    /// Deliver all currently queued deferred events, in enqueue order.
    ///
    /// Events deferred *during* processing are left on the queue for the next
    /// call, so a handler that defers cannot spin this loop forever.
    pub fn process_deferred(&self, registry: &mut Registry) {
        let batch: Vec<DeferredEvent> = {
            let mut inner = self.inner.lock().unwrap();
            inner.deferred.drain(..).collect()
        };
        for event in batch {
            event(self, registry);
        }
    }

    /// Remove the subscription with the given id. No-op if already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock().unwrap();
        for subs in inner.subscribers.values_mut() {
            subs.retain(|s| s.id != id);
        }
    }

    /// Drop all subscribers and pending deferred events, and reset the
    /// subscription id counter to 0.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.subscribers.clear();
        inner.deferred.clear();
        inner.next_id = 0;
    }

    /// Number of subscribers registered for event type `E`.
    pub fn subscriber_count<E: Any>(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .subscribers
            .get(&TypeId::of::<E>())
            .map_or(0, |s| s.len())
    }

    /// Number of queued deferred events.
    pub fn deferred_count(&self) -> usize {
        self.inner.lock().unwrap().deferred.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("EventBus")
            .field("event_types", &inner.subscribers.len())
            .field("deferred", &inner.deferred.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
