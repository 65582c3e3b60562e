//! Tenant-scoped broadcast hub.
//!
//! The [`EventHub`] owns the registry of live observers, partitioned by tenant,
//! and fans broadcast messages out to them.
//!
//! # Delivery policy
//!
//! Every observer has a bounded outbound queue. Delivery is a non-blocking
//! `try_send`: if the queue is full (the observer is not draining fast enough)
//! or closed (its connection went away) the observer is evicted on the spot.
//! Dropping the hub's sender closes the channel, so the observer's receiver
//! drains what it already has and then ends.
//!
//! Broadcast latency is therefore bounded by the number of observers, never by
//! the slowest one. Delivery is at-most-once and best-effort: there is no
//! redelivery and no backpressure towards the publisher.
//!
//! # Concurrency
//!
//! Registration, unregistration, broadcast and eviction all take the same
//! short `std::sync::Mutex`. Nothing inside the critical section awaits or
//! blocks, so a synchronous lock is the right tool.
//!
//! # Example
//!
//! ```
//! use fleetops_core::broadcast::{BroadcastMessage, MessageKind};
//! use fleetops_core::TenantId;
//! use fleetops_runtime::hub::EventHub;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let hub = EventHub::default();
//! let mut subscription = hub.subscribe(TenantId::new(1));
//!
//! let report = hub.broadcast_to_tenant(
//!     TenantId::new(1),
//!     BroadcastMessage::new(MessageKind::CargoDeleted, json!({"cargo_id": 7})),
//! );
//! assert_eq!(report.delivered, 1);
//!
//! let message = subscription.recv().await.unwrap();
//! assert_eq!(message.kind, MessageKind::CargoDeleted);
//! # });
//! ```

use fleetops_core::broadcast::BroadcastMessage;
use fleetops_core::TenantId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Default bounded queue length per observer.
pub const DEFAULT_OBSERVER_CAPACITY: usize = 256;

/// Hub configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Outbound queue length per observer
    pub observer_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            observer_capacity: DEFAULT_OBSERVER_CAPACITY,
        }
    }
}

/// Identity of one observer, unique for the lifetime of the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    /// The raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

type Outbound = mpsc::Sender<Arc<BroadcastMessage>>;

/// The hub's handle on one observer: its identity, tenant and outbound queue.
///
/// Not `Clone`: once registered, the hub holds the only sender, so eviction
/// or `unregister` closes the queue.
#[derive(Debug)]
pub struct Observer {
    id: ObserverId,
    tenant_id: TenantId,
    sender: Outbound,
}

impl Observer {
    /// Observer identity.
    #[must_use]
    pub const fn id(&self) -> ObserverId {
        self.id
    }

    /// Tenant the observer is affiliated with.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Observers that accepted the message
    pub delivered: usize,
    /// Observers evicted during this broadcast
    pub evicted: usize,
}

#[derive(Debug, Default)]
struct Registry {
    tenants: HashMap<TenantId, HashMap<ObserverId, Outbound>>,
    index: HashMap<ObserverId, TenantId>,
}

impl Registry {
    fn insert(&mut self, observer: Observer) -> bool {
        if self.index.contains_key(&observer.id) {
            return false;
        }
        self.index.insert(observer.id, observer.tenant_id);
        self.tenants
            .entry(observer.tenant_id)
            .or_default()
            .insert(observer.id, observer.sender);
        true
    }

    fn remove(&mut self, id: ObserverId) -> bool {
        let Some(tenant_id) = self.index.remove(&id) else {
            return false;
        };
        if let Some(observers) = self.tenants.get_mut(&tenant_id) {
            observers.remove(&id);
            if observers.is_empty() {
                self.tenants.remove(&tenant_id);
            }
        }
        true
    }

    /// Try every sender in `observers`, returning who accepted and who must go.
    fn deliver(
        observers: &HashMap<ObserverId, Outbound>,
        message: &Arc<BroadcastMessage>,
        evicted: &mut Vec<ObserverId>,
    ) -> usize {
        let mut delivered = 0;
        for (id, sender) in observers {
            match sender.try_send(Arc::clone(message)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(observer = %id, "Observer queue full, evicting slow consumer");
                    evicted.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(observer = %id, "Observer channel closed, removing");
                    evicted.push(*id);
                }
            }
        }
        delivered
    }
}

struct HubInner {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    config: HubConfig,
}

impl HubInner {
    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Live observer registry with non-blocking, tenant-scoped fan-out.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("config", &self.inner.config)
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl EventHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                registry: Mutex::new(Registry::default()),
                next_id: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// Hub configuration.
    #[must_use]
    pub fn config(&self) -> HubConfig {
        self.inner.config
    }

    /// Create an unregistered observer for `tenant_id` with a fresh identity,
    /// and the receiving end of its queue.
    #[must_use]
    pub fn observer(&self, tenant_id: TenantId) -> (Observer, mpsc::Receiver<Arc<BroadcastMessage>>) {
        let id = ObserverId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.inner.config.observer_capacity.max(1));
        (
            Observer {
                id,
                tenant_id,
                sender,
            },
            receiver,
        )
    }

    /// Create and register an observer; it is unregistered when the returned
    /// [`Subscription`] is dropped.
    #[must_use]
    pub fn subscribe(&self, tenant_id: TenantId) -> Subscription {
        let (observer, receiver) = self.observer(tenant_id);
        let id = observer.id();
        self.register(observer);
        Subscription {
            id,
            tenant_id,
            receiver,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Add an observer. Returns `false` (and changes nothing) if an observer
    /// with the same identity is already registered.
    pub fn register(&self, observer: Observer) -> bool {
        let (id, tenant_id) = (observer.id, observer.tenant_id);
        let mut registry = self.inner.registry();
        let added = registry.insert(observer);
        if added {
            metrics::gauge!("hub_observers").set(registry.index.len() as f64);
            tracing::debug!(observer = %id, tenant_id = %tenant_id, "Observer registered");
        }
        added
    }

    /// Remove an observer and release its queue. Returns `false` if it was
    /// not registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        unregister_from(&self.inner, id)
    }

    /// Deliver `message` to every registered observer regardless of tenant.
    pub fn broadcast_all(&self, message: BroadcastMessage) -> DeliveryReport {
        let message = Arc::new(message);
        let mut evicted = Vec::new();
        let mut registry = self.inner.registry();

        let delivered = registry
            .tenants
            .values()
            .map(|observers| Registry::deliver(observers, &message, &mut evicted))
            .sum();

        Self::finish(&mut registry, &message, delivered, &evicted)
    }

    /// Deliver `message` only to observers affiliated with `tenant_id`.
    pub fn broadcast_to_tenant(&self, tenant_id: TenantId, message: BroadcastMessage) -> DeliveryReport {
        let message = Arc::new(message);
        let mut evicted = Vec::new();
        let mut registry = self.inner.registry();

        let delivered = registry
            .tenants
            .get(&tenant_id)
            .map_or(0, |observers| Registry::deliver(observers, &message, &mut evicted));

        Self::finish(&mut registry, &message, delivered, &evicted)
    }

    fn finish(
        registry: &mut Registry,
        message: &BroadcastMessage,
        delivered: usize,
        evicted: &[ObserverId],
    ) -> DeliveryReport {
        for id in evicted {
            registry.remove(*id);
        }

        metrics::counter!("hub_messages_delivered_total").increment(delivered as u64);
        if !evicted.is_empty() {
            metrics::counter!("hub_observers_evicted_total").increment(evicted.len() as u64);
            metrics::gauge!("hub_observers").set(registry.index.len() as f64);
        }
        tracing::debug!(
            kind = %message.kind,
            delivered,
            evicted = evicted.len(),
            "Broadcast delivered"
        );

        DeliveryReport {
            delivered,
            evicted: evicted.len(),
        }
    }

    /// Number of registered observers across all tenants.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.registry().index.len()
    }

    /// Number of registered observers for one tenant.
    #[must_use]
    pub fn tenant_observer_count(&self, tenant_id: TenantId) -> usize {
        self.inner
            .registry()
            .tenants
            .get(&tenant_id)
            .map_or(0, HashMap::len)
    }

    /// Whether `id` is currently registered.
    #[must_use]
    pub fn contains(&self, id: ObserverId) -> bool {
        self.inner.registry().index.contains_key(&id)
    }
}

fn unregister_from(inner: &HubInner, id: ObserverId) -> bool {
    let mut registry = inner.registry();
    let removed = registry.remove(id);
    if removed {
        metrics::gauge!("hub_observers").set(registry.index.len() as f64);
        tracing::debug!(observer = %id, "Observer unregistered");
    }
    removed
}

/// A registered observer together with the receiving end of its queue.
///
/// Dropping it unregisters the observer.
pub struct Subscription {
    id: ObserverId,
    tenant_id: TenantId,
    receiver: mpsc::Receiver<Arc<BroadcastMessage>>,
    hub: Weak<HubInner>,
}

impl Subscription {
    /// Observer identity.
    #[must_use]
    pub const fn id(&self) -> ObserverId {
        self.id
    }

    /// Tenant the subscription is scoped to.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Next message, or `None` once the hub has dropped this observer and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<Arc<BroadcastMessage>> {
        self.receiver.recv().await
    }

    /// Next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Arc<BroadcastMessage>> {
        self.receiver.try_recv().ok()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.hub.upgrade() {
            unregister_from(&inner, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use fleetops_core::broadcast::MessageKind;
    use serde_json::json;

    const ACME: TenantId = TenantId::new(1);
    const GLOBEX: TenantId = TenantId::new(2);

    fn message(n: i64) -> BroadcastMessage {
        BroadcastMessage::new(MessageKind::CargoUpdated, json!({ "n": n }))
    }

    #[tokio::test]
    async fn tenant_broadcast_stays_in_tenant() {
        let hub = EventHub::default();
        let mut acme = hub.subscribe(ACME);
        let mut globex = hub.subscribe(GLOBEX);

        let report = hub.broadcast_to_tenant(ACME, message(1));

        assert_eq!(report.delivered, 1);
        assert_eq!(acme.recv().await.unwrap().data["n"], 1);
        assert!(globex.try_recv().is_none());
    }

    #[tokio::test]
    async fn broadcast_all_reaches_every_tenant() {
        let hub = EventHub::default();
        let mut acme = hub.subscribe(ACME);
        let mut globex = hub.subscribe(GLOBEX);

        let report = hub.broadcast_all(message(2));

        assert_eq!(report.delivered, 2);
        assert!(acme.try_recv().is_some());
        assert!(globex.try_recv().is_some());
    }

    #[test]
    fn register_is_idempotent_per_identity() {
        let hub = EventHub::default();
        let (observer, mut rx) = hub.observer(ACME);
        let id = observer.id();
        let (other_sender, mut other_rx) = mpsc::channel(1);
        let duplicate = Observer {
            id,
            tenant_id: ACME,
            sender: other_sender,
        };

        assert!(hub.register(observer));
        assert!(!hub.register(duplicate));
        assert_eq!(hub.observer_count(), 1);

        // the first registration keeps receiving
        hub.broadcast_to_tenant(ACME, message(1));
        assert!(rx.try_recv().is_ok());
        assert!(matches!(
            other_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn unregister_releases_the_queue() {
        let hub = EventHub::default();
        let (observer, mut rx) = hub.observer(ACME);
        let id = observer.id();
        hub.register(observer);

        assert!(hub.unregister(id));
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn unregister_twice_is_a_no_op() {
        let hub = EventHub::default();
        let (observer, _rx) = hub.observer(ACME);
        let id = observer.id();
        hub.register(observer);

        assert!(hub.unregister(id));
        assert!(!hub.unregister(id));
        assert_eq!(hub.tenant_observer_count(ACME), 0);
    }

    #[test]
    fn full_queue_evicts_observer_and_closes_channel() {
        let hub = EventHub::new(HubConfig {
            observer_capacity: 1,
        });
        let (observer, mut rx) = hub.observer(ACME);
        let id = observer.id();
        hub.register(observer);

        assert_eq!(hub.broadcast_to_tenant(ACME, message(1)).delivered, 1);
        let report = hub.broadcast_to_tenant(ACME, message(2));

        assert_eq!(report, DeliveryReport { delivered: 0, evicted: 1 });
        assert!(!hub.contains(id));
        // the first message is still readable, then the channel reports closed
        assert!(rx.try_recv().is_ok());
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn closed_receiver_is_removed_on_next_broadcast() {
        let hub = EventHub::default();
        let (observer, rx) = hub.observer(ACME);
        let id = observer.id();
        hub.register(observer);
        drop(rx);

        let report = hub.broadcast_to_tenant(ACME, message(1));
        assert_eq!(report.evicted, 1);
        assert!(!hub.contains(id));
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let hub = EventHub::default();
        let subscription = hub.subscribe(ACME);
        let id = subscription.id();
        assert!(hub.contains(id));

        drop(subscription);
        assert!(!hub.contains(id));
        assert_eq!(hub.observer_count(), 0);
    }

    #[tokio::test]
    async fn publish_order_is_preserved_per_observer() {
        let hub = EventHub::default();
        let mut sub = hub.subscribe(ACME);
        for n in 0..5 {
            hub.broadcast_to_tenant(ACME, message(n));
        }
        for n in 0..5 {
            assert_eq!(sub.recv().await.unwrap().data["n"], n);
        }
    }

    #[test]
    fn observer_ids_are_unique() {
        let hub = EventHub::default();
        let a = hub.subscribe(ACME);
        let b = hub.subscribe(ACME);
        assert_ne!(a.id(), b.id());
    }
}
