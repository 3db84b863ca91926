//! Trigger bus: "input changed" notifications addressed by node id.
//!
//! Delivery is at-most-once. A trigger published for a node with no live
//! listener is dropped; nothing is queued or retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

use crate::ids::NodeId;

/// Notification that `source_node_id` has new output for `target_node_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub target_node_id: NodeId,
    pub source_node_id: NodeId,
}

impl Trigger {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            target_node_id: target.into(),
            source_node_id: source.into(),
        }
    }
}

/// Outcome of [`TriggerBus::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Received by this many listeners.
    Delivered(usize),

    /// No live listener for the target.
    Missed,
}

/// Handle of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Receiving end of a registration.
#[derive(Debug)]
pub struct TriggerListener {
    id: ListenerId,
    node_id: NodeId,
    rx: mpsc::UnboundedReceiver<Trigger>,
}

impl TriggerListener {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Wait for the next trigger. `None` once deregistered.
    pub async fn recv(&mut self) -> Option<Trigger> {
        self.rx.recv().await
    }

    /// Next trigger if one is already queued.
    pub fn try_recv(&mut self) -> Option<Trigger> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug)]
struct Registration {
    id: ListenerId,
    tx: mpsc::UnboundedSender<Trigger>,
}

/// Pub/sub of triggers, scoped to one pipeline.
#[derive(Debug, Clone, Default)]
pub struct TriggerBus {
    listeners: Arc<RwLock<IndexMap<NodeId, Vec<Registration>>>>,
    next_id: Arc<AtomicU64>,
}

impl TriggerBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `node_id`. Several listeners per node are allowed.
    pub async fn register(&self, node_id: impl Into<NodeId>) -> TriggerListener {
        let node_id = node_id.into();
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();

        self.listeners
            .write()
            .await
            .entry(node_id.clone())
            .or_default()
            .push(Registration { id, tx });
        debug!("Registered trigger listener {} for {node_id}", id.0);

        TriggerListener { id, node_id, rx }
    }

    /// Remove a registration. Returns whether it existed.
    pub async fn deregister(&self, listener: ListenerId) -> bool {
        let mut listeners = self.listeners.write().await;
        let mut found = false;
        for registrations in listeners.values_mut() {
            let before = registrations.len();
            registrations.retain(|r| r.id != listener);
            found |= registrations.len() != before;
        }
        listeners.retain(|_, registrations| !registrations.is_empty());
        found
    }

    /// Number of live listeners for `node_id`.
    pub async fn listeners(&self, node_id: &NodeId) -> usize {
        let mut listeners = self.listeners.write().await;
        prune(&mut listeners);
        listeners.get(node_id).map_or(0, Vec::len)
    }

    /// Nodes with at least one live listener, in registration order.
    pub async fn registered_nodes(&self) -> Vec<NodeId> {
        let mut listeners = self.listeners.write().await;
        prune(&mut listeners);
        listeners.keys().cloned().collect()
    }

    /// Deliver `trigger` to every live listener of its target.
    pub async fn publish(&self, trigger: Trigger) -> Delivery {
        let mut listeners = self.listeners.write().await;
        let mut delivered = 0;

        if let Some(registrations) = listeners.get_mut(&trigger.target_node_id) {
            registrations.retain(|r| r.tx.send(trigger.clone()).is_ok());
            delivered = registrations.len();
            if registrations.is_empty() {
                listeners.shift_remove(&trigger.target_node_id);
            }
        }

        if delivered == 0 {
            debug!(
                "Trigger from {} to {} missed: no live listener",
                trigger.source_node_id, trigger.target_node_id
            );
            Delivery::Missed
        } else {
            debug!(
                "Trigger from {} delivered to {} ({delivered} listeners)",
                trigger.source_node_id, trigger.target_node_id
            );
            Delivery::Delivered(delivered)
        }
    }
}

fn prune(listeners: &mut IndexMap<NodeId, Vec<Registration>>) {
    for registrations in listeners.values_mut() {
        registrations.retain(|r| !r.tx.is_closed());
    }
    listeners.retain(|_, registrations| !registrations.is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_publish_reaches_every_listener() {
        let bus = TriggerBus::new();
        let mut first = bus.register("b").await;
        let mut second = bus.register("b").await;

        let delivery = bus.publish(Trigger::new("a", "b")).await;

        assert_eq!(delivery, Delivery::Delivered(2));
        assert_eq!(first.recv().await, Some(Trigger::new("a", "b")));
        assert_eq!(second.try_recv(), Some(Trigger::new("a", "b")));
    }

    #[tokio::test]
    async fn test_missing_listener_is_a_miss() {
        let bus = TriggerBus::new();
        assert_eq!(bus.publish(Trigger::new("a", "nobody")).await, Delivery::Missed);
    }

    #[tokio::test]
    async fn test_dropped_listener_is_pruned() {
        let bus = TriggerBus::new();
        let listener = bus.register("b").await;
        let _other = bus.register("c").await;
        assert_eq!(bus.listeners(&"b".into()).await, 1);

        drop(listener);

        assert_eq!(bus.listeners(&"b".into()).await, 0);
        assert_eq!(bus.registered_nodes().await, vec![NodeId::from("c")]);
        assert_eq!(bus.publish(Trigger::new("a", "b")).await, Delivery::Missed);
    }

    #[tokio::test]
    async fn test_deregister() {
        let bus = TriggerBus::new();
        let mut listener = bus.register("b").await;

        assert!(bus.deregister(listener.id()).await);
        assert!(!bus.deregister(listener.id()).await);
        assert_eq!(bus.publish(Trigger::new("a", "b")).await, Delivery::Missed);
        assert_eq!(listener.recv().await, None);
    }

    #[test]
    fn test_recv_wakes_on_publish() {
        let bus = TriggerBus::new();
        let mut listener = tokio_test::block_on(bus.register("b"));

        let mut recv = tokio_test::task::spawn(listener.recv());
        tokio_test::assert_pending!(recv.poll());

        tokio_test::block_on(bus.publish(Trigger::new("a", "b")));
        assert!(recv.is_woken());
        tokio_test::assert_ready_eq!(recv.poll(), Some(Trigger::new("a", "b")));
    }

    #[test]
    fn test_trigger_wire_shape() {
        let json = serde_json::to_value(Trigger::new("a", "b")).unwrap();
        assert_eq!(json, serde_json::json!({"targetNodeId": "b", "sourceNodeId": "a"}));
    }
}
