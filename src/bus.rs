//! Event Bus - After-Commit Delivery
//!
//! Carries authorization-change events from the code that mutates roles to
//! the subscribers that invalidate caches. Delivery is explicitly
//! transactional: events are staged while the producing transaction is
//! open, published only on commit, and discarded on rollback, so a
//! subscriber never acts on a change that was rolled back.
//!
//! An optional transport relays committed events to peer processes. Every
//! envelope carries the publishing bus ID; the relay drops envelopes that
//! originated locally, so an instance processes each event exactly once no
//! matter how many peers share the transport.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::events::InvalidationEvent;
use crate::error::Result;

/// Broadcast capacity of the in-memory transport. Slow relays past this
/// depth lose the oldest envelopes and log the lag.
const TRANSPORT_CAPACITY: usize = 256;

// =============================================================================
// Ports
// =============================================================================

/// Receives events after the producing transaction has committed
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn on_event(&self, event: &InvalidationEvent);
}

/// A committed event in flight between instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Bus instance that published the event
    pub origin: Uuid,
    /// The committed event
    pub event: InvalidationEvent,
}

/// Cluster-wide fan-out for committed events
#[async_trait]
pub trait InvalidationTransport: Send + Sync {
    /// Broadcast an envelope to every instance, including the sender
    async fn broadcast(&self, envelope: EventEnvelope) -> Result<()>;

    /// Subscribe to envelopes broadcast by any instance
    fn subscribe(&self) -> broadcast::Receiver<EventEnvelope>;
}

/// In-process transport backed by a broadcast channel, for tests and for
/// wiring several bus instances inside one process
pub struct InMemoryTransport {
    sender: broadcast::Sender<EventEnvelope>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(TRANSPORT_CAPACITY);
        Self { sender }
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InvalidationTransport for InMemoryTransport {
    async fn broadcast(&self, envelope: EventEnvelope) -> Result<()> {
        // send only fails when no receiver exists; nothing to deliver then
        let _ = self.sender.send(envelope);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

// =============================================================================
// Event Bus
// =============================================================================

/// Publishes committed authorization changes to registered subscribers
pub struct EventBus {
    instance_id: Uuid,
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
    transport: Option<Arc<dyn InvalidationTransport>>,
}

impl EventBus {
    /// Bus without a transport; events stay within this process
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            subscribers: RwLock::new(Vec::new()),
            transport: None,
        }
    }

    /// Bus that also relays committed events across the given transport
    pub fn with_transport(transport: Arc<dyn InvalidationTransport>) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            subscribers: RwLock::new(Vec::new()),
            transport: Some(transport),
        }
    }

    /// Unique ID of this bus instance, used to tag outgoing envelopes
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Register a subscriber. Registration is explicit; nothing is
    /// discovered or scanned.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Open a staging scope tied to a transaction
    pub fn begin(&self) -> StagedEvents<'_> {
        StagedEvents {
            bus: self,
            events: Vec::new(),
            resolved: false,
        }
    }

    /// Deliver an already-committed event to local subscribers and relay it
    /// to peers
    #[instrument(skip(self, event), fields(event_type = event.event_type(), event_id = %event.event_id()))]
    pub async fn publish(&self, event: InvalidationEvent) {
        self.deliver_local(&event).await;

        if let Some(transport) = &self.transport {
            let envelope = EventEnvelope {
                origin: self.instance_id,
                event,
            };
            if let Err(e) = transport.broadcast(envelope).await {
                warn!(error = %e, "failed to relay event to peer instances");
            }
        }
    }

    async fn deliver_local(&self, event: &InvalidationEvent) {
        // Snapshot the list so no lock is held across subscriber awaits
        let subscribers: Vec<_> = self.subscribers.read().clone();
        for subscriber in subscribers {
            subscriber.on_event(event).await;
        }
    }

    /// Run the peer relay: deliver envelopes published by other instances
    /// to local subscribers. Returns `None` when the bus has no transport.
    #[instrument(skip(self), name = "event_relay", fields(instance = %self.instance_id))]
    pub fn start_relay(self: Arc<Self>) -> Option<JoinHandle<()>> {
        let transport = self.transport.clone()?;
        let mut rx = transport.subscribe();

        Some(tokio::spawn(async move {
            info!(instance = %self.instance_id, "event relay started");
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        if envelope.origin == self.instance_id {
                            // published here, local subscribers already ran
                            continue;
                        }
                        debug!(
                            origin = %envelope.origin,
                            event_type = envelope.event.event_type(),
                            "delivering relayed peer event"
                        );
                        self.deliver_local(&envelope.event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "event relay lagged behind the transport");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("transport closed, event relay stopping");
                        break;
                    }
                }
            }
        }))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("instance_id", &self.instance_id)
            .field("subscribers", &self.subscriber_count())
            .field("has_transport", &self.transport.is_some())
            .finish()
    }
}

// =============================================================================
// Staged Events
// =============================================================================

/// Events recorded during a transaction, held back until commit.
///
/// Dropping the scope without committing discards the events; that is the
/// rollback path, and it also covers early returns and panics in the
/// producing code.
pub struct StagedEvents<'a> {
    bus: &'a EventBus,
    events: Vec<InvalidationEvent>,
    /// Set once the scope was explicitly committed or rolled back
    resolved: bool,
}

impl StagedEvents<'_> {
    /// Record an event to publish if the transaction commits
    pub fn stage(&mut self, event: InvalidationEvent) {
        debug!(event_type = event.event_type(), "event staged");
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Publish all staged events in staging order
    pub async fn commit(mut self) {
        self.resolved = true;
        let events = std::mem::take(&mut self.events);
        debug!(count = events.len(), "publishing staged events after commit");
        for event in events {
            self.bus.publish(event).await;
        }
    }

    /// Discard all staged events
    pub fn rollback(mut self) {
        self.resolved = true;
        if !self.events.is_empty() {
            debug!(count = self.events.len(), "staged events discarded on rollback");
        }
        self.events.clear();
    }
}

impl Drop for StagedEvents<'_> {
    fn drop(&mut self) {
        if !self.resolved && !self.events.is_empty() {
            debug!(
                count = self.events.len(),
                "staged events dropped without commit"
            );
        }
    }
}

// =============================================================================
// Test Support
// =============================================================================

/// Subscriber that records every delivered event, for assertions in tests
#[derive(Default)]
pub struct CollectingSubscriber {
    events: RwLock<Vec<InvalidationEvent>>,
}

impl CollectingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<InvalidationEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<InvalidationEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSubscriber for CollectingSubscriber {
    async fn on_event(&self, event: &InvalidationEvent) {
        self.events.write().push(event.clone());
    }
}
