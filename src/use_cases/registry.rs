// Registry of replicated objects and the channels each object task exposes.

use super::hub::{HubChannels, Rejection, ReplicationHub, object_task};
use super::types::{HubEvent, NodeId};
use crate::domain::ListDelta;
use axum::extract::ws::Utf8Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, RwLock, broadcast, mpsc, watch};
use tracing::info;

/// Shared configuration for spawning object tasks.
#[derive(Debug, Clone)]
pub struct ObjectSettings {
    /// Capacity for inbound hub events.
    pub input_channel_capacity: usize,
    /// Capacity for broadcast deltas (raw and serialized).
    pub delta_broadcast_capacity: usize,
    /// Width enforced on batches when creation does not specify one.
    pub default_width: Option<usize>,
    /// Longest list any batch may grow an object to.
    pub max_list_len: usize,
}

/// Errors returned by object registry operations.
#[derive(Debug, PartialEq, Eq)]
pub enum ObjectError {
    /// Object already exists and cannot be re-created.
    AlreadyExists,
}

/// Live connections per node id for one object.
///
/// A node id is owned by at most one connection at a time, so a second connection
/// cannot act (or leave) on behalf of a node that is still connected.
#[derive(Debug, Clone, Default)]
pub struct NodeSlots {
    owners: Arc<Mutex<HashMap<NodeId, u64>>>,
}

impl NodeSlots {
    /// Binds `node_id` to the connection `token`. Returns false if another live
    /// connection already owns it.
    pub async fn claim(&self, node_id: NodeId, token: u64) -> bool {
        let mut owners = self.owners.lock().await;
        if owners.contains_key(&node_id) {
            return false;
        }
        owners.insert(node_id, token);
        true
    }

    /// Frees `node_id` only if `token` still owns it.
    pub async fn release_if_owner(&self, node_id: NodeId, token: u64) -> bool {
        let mut owners = self.owners.lock().await;
        if owners.get(&node_id) == Some(&token) {
            owners.remove(&node_id);
            true
        } else {
            false
        }
    }
}

/// Per-object channels.
#[derive(Debug, Clone)]
pub struct ObjectHandle {
    /// Identifier clients use to target this object.
    pub object_id: Arc<str>,
    /// Sender for events into the object task.
    pub input_tx: mpsc::Sender<HubEvent>,
    /// Broadcast sender for raw deltas.
    pub delta_tx: broadcast::Sender<ListDelta>,
    /// Broadcast sender for serialized deltas.
    pub delta_bytes_tx: broadcast::Sender<Utf8Bytes>,
    /// Watch sender holding the full list as a delta of appends.
    pub snapshot_tx: watch::Sender<ListDelta>,
    /// Watch sender for the current authority holder.
    pub authority_tx: watch::Sender<Option<NodeId>>,
    /// Broadcast sender for rejected requests, filtered per connection.
    pub rejected_tx: broadcast::Sender<Rejection>,
    /// Node ids currently bound to a connection.
    pub node_slots: NodeSlots,
    /// Stops the object task.
    shutdown: Arc<Notify>,
}

/// Thread-safe registry for replicated objects.
#[derive(Debug)]
pub struct ObjectRegistry {
    /// Global settings applied to newly created objects.
    settings: ObjectSettings,
    /// Map of object id to active handle.
    objects: RwLock<HashMap<String, ObjectHandle>>,
}

impl ObjectRegistry {
    /// Creates a new registry with the provided settings.
    pub fn new(settings: ObjectSettings) -> Self {
        Self {
            settings,
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a new object and spawns its task. `width` falls back to the default width.
    pub async fn create_object(
        &self,
        object_id: String,
        width: Option<usize>,
    ) -> Result<ObjectHandle, ObjectError> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(&object_id) {
            return Err(ObjectError::AlreadyExists);
        }

        // Channel wiring for the object task.
        let (input_tx, input_rx) = mpsc::channel::<HubEvent>(self.settings.input_channel_capacity);
        let (delta_tx, _delta_rx) =
            broadcast::channel::<ListDelta>(self.settings.delta_broadcast_capacity);
        let (delta_bytes_tx, _delta_bytes_rx) =
            broadcast::channel::<Utf8Bytes>(self.settings.delta_broadcast_capacity);
        let (snapshot_tx, _snapshot_rx) = watch::channel(ListDelta::default());
        let (authority_tx, _authority_rx) = watch::channel::<Option<NodeId>>(None);
        let (rejected_tx, _rejected_rx) =
            broadcast::channel::<Rejection>(self.settings.delta_broadcast_capacity);
        let shutdown = Arc::new(Notify::new());

        let width = width.or(self.settings.default_width);
        // Spawn the single writer for this object.
        tokio::spawn(object_task(
            input_rx,
            ReplicationHub::new(width).with_max_len(self.settings.max_list_len),
            HubChannels {
                delta_tx: delta_tx.clone(),
                snapshot_tx: snapshot_tx.clone(),
                authority_tx: authority_tx.clone(),
                rejected_tx: rejected_tx.clone(),
            },
            shutdown.clone(),
        ));
        info!(%object_id, ?width, "replicated object created");

        let object = ObjectHandle {
            object_id: Arc::from(object_id.as_str()),
            input_tx,
            delta_tx,
            delta_bytes_tx,
            snapshot_tx,
            authority_tx,
            rejected_tx,
            node_slots: NodeSlots::default(),
            shutdown,
        };

        objects.insert(object_id, object.clone());
        Ok(object)
    }

    /// Returns an object handle for the provided id, if it exists.
    pub async fn get_object(&self, object_id: &str) -> Option<ObjectHandle> {
        let objects = self.objects.read().await;
        objects.get(object_id).cloned()
    }

    /// Removes an object and stops its task. Returns true if it existed.
    pub async fn remove_object(&self, object_id: &str) -> bool {
        let removed = self.objects.write().await.remove(object_id);
        match removed {
            Some(object) => {
                object.shutdown.notify_one();
                info!(%object_id, "replicated object removed");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ObjectRegistry {
        ObjectRegistry::new(ObjectSettings {
            input_channel_capacity: 8,
            delta_broadcast_capacity: 8,
            default_width: Some(4),
            max_list_len: 64,
        })
    }

    #[tokio::test]
    async fn when_node_id_is_owned_then_second_claim_fails_until_owner_releases() {
        let slots = NodeSlots::default();

        assert!(slots.claim(7, 100).await);
        assert!(!slots.claim(7, 200).await);
        // A stranger cannot free someone else's slot.
        assert!(!slots.release_if_owner(7, 200).await);

        assert!(slots.release_if_owner(7, 100).await);
        assert!(slots.claim(7, 200).await);
    }

    #[tokio::test]
    async fn when_object_id_is_reused_then_creation_fails() {
        let registry = registry();
        registry
            .create_object("crate".to_string(), None)
            .await
            .expect("first create succeeds");

        let result = registry.create_object("crate".to_string(), Some(2)).await;

        assert_eq!(result.err(), Some(ObjectError::AlreadyExists));
    }

    #[tokio::test]
    async fn when_object_is_removed_then_lookup_misses_and_task_stops() {
        let registry = registry();
        let object = registry
            .create_object("crate".to_string(), None)
            .await
            .expect("create succeeds");

        assert!(registry.remove_object("crate").await);
        assert!(registry.get_object("crate").await.is_none());
        assert!(!registry.remove_object("crate").await);

        // The task drops its receiver once it exits.
        tokio::time::timeout(std::time::Duration::from_secs(1), object.input_tx.closed())
            .await
            .expect("object task exits");
    }
}
