//! Optimistic update descriptors.
//!
//! A local change is expressed as an [`OptimisticUpdate`], not a direct
//! mutation. The update's own `id` identifies the *operation*, so each
//! pending change can be confirmed or rolled back on its own even when
//! several target the same entity.

use crate::{Entity, EntityId, OperationId, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of change carried by an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Create,
    Update,
    Delete,
    /// Any kind this build does not know about. Applying it is a no-op.
    #[serde(other)]
    Unknown,
}

/// A single optimistic change against a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimisticUpdate<T> {
    /// Operation ID, distinct from the entity ID
    pub id: OperationId,
    /// What kind of change this is
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    /// The entity (or patch) being applied
    pub data: T,
    /// When the change was initiated (milliseconds since epoch)
    pub timestamp: Timestamp,
}

impl<T> OptimisticUpdate<T> {
    /// Create an update of any kind.
    pub fn new(id: impl Into<OperationId>, kind: UpdateKind, data: T, timestamp: Timestamp) -> Self {
        Self {
            id: id.into(),
            kind,
            data,
            timestamp,
        }
    }

    /// Create an optimistic insert.
    pub fn create(id: impl Into<OperationId>, data: T, timestamp: Timestamp) -> Self {
        Self::new(id, UpdateKind::Create, data, timestamp)
    }

    /// Create an optimistic shallow-merge update.
    pub fn update(id: impl Into<OperationId>, data: T, timestamp: Timestamp) -> Self {
        Self::new(id, UpdateKind::Update, data, timestamp)
    }

    /// Create an optimistic removal.
    pub fn delete(id: impl Into<OperationId>, data: T, timestamp: Timestamp) -> Self {
        Self::new(id, UpdateKind::Delete, data, timestamp)
    }

    /// Whether this update needs a pre-image to be undone.
    pub fn needs_pre_image(&self) -> bool {
        matches!(self.kind, UpdateKind::Update | UpdateKind::Delete)
    }
}

impl<T: Entity> OptimisticUpdate<T> {
    /// The ID of the entity this update targets.
    pub fn entity_id(&self) -> Option<EntityId> {
        self.data.id()
    }
}

/// Current wall-clock time in milliseconds since epoch.
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}
