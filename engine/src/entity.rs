//! Entity abstraction for optimistic collections.
//!
//! The reconciliation layer is generic over any record with a stable `id`.
//! Identity is structural by id only: there are no version or deep-equality
//! checks.

use crate::EntityId;
use serde_json::Value;

/// A record that can live in an optimistic collection.
pub trait Entity: Clone {
    /// The entity's stable identifier, if it carries one.
    fn id(&self) -> Option<EntityId>;

    /// Shallow-merge `patch` into `self`.
    ///
    /// The default replaces the whole value, which is the right behavior for
    /// plain structs where the patch is always a complete record.
    fn merge(&mut self, patch: &Self) {
        *self = patch.clone();
    }

    /// Whether this entity carries the given id.
    fn has_id(&self, id: &str) -> bool {
        self.id().as_deref() == Some(id)
    }
}

/// JSON objects are entities keyed by their `"id"` field.
///
/// String ids are used verbatim, numeric ids are rendered in decimal so that
/// `{"id": 1}` and `{"id": "1"}` address the same entity.
impl Entity for Value {
    fn id(&self) -> Option<EntityId> {
        match self.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn merge(&mut self, patch: &Self) {
        match (self.as_object_mut(), patch.as_object()) {
            (Some(target), Some(fields)) => {
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
            }
            _ => *self = patch.clone(),
        }
    }
}
