//! Optimistic list controller.
//!
//! [`OptimisticList`] owns one entity collection plus the bookkeeping needed
//! to apply, confirm or roll back changes against it. Pending changes are
//! keyed by operation id; pre-images are keyed by entity id and captured on
//! the first pending change to that entity, so a rollback always restores the
//! state from before any pending change and then replays the ones still
//! outstanding. An entity that only exists because of a pending create has an
//! absent pre-image.

use crate::{
    apply_optimistic_update, error::Result, optimistic::replace_entity,
    rollback_optimistic_update, Entity, EntityId, Error, OperationId, OptimisticUpdate,
    UpdateKind,
};
use serde::Serialize;
use std::collections::HashMap;

/// What a rollback actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RollbackOutcome {
    /// The change was undone.
    Restored,
    /// The change needed a pre-image and none was captured, so the visible
    /// state was left as is.
    MissingPreImage,
    /// No pending change had this operation id.
    NotPending,
}

#[derive(Debug, Clone)]
struct PendingEntry<T> {
    seq: u64,
    entity_id: Option<EntityId>,
    update: OptimisticUpdate<T>,
}

#[derive(Debug, Clone)]
struct PreImage<T> {
    /// Sequence number of the change that captured this snapshot
    seq: u64,
    /// `None` when the entity did not exist before the first pending change
    value: Option<T>,
}

/// A collection with pending optimistic changes.
#[derive(Debug, Clone)]
pub struct OptimisticList<T: Entity> {
    items: Vec<T>,
    pending: Vec<PendingEntry<T>>,
    pre_images: HashMap<EntityId, PreImage<T>>,
    next_seq: u64,
}

impl<T: Entity> Default for OptimisticList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> OptimisticList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::with_data(Vec::new())
    }

    /// Create a list from server data.
    pub fn with_data(items: Vec<T>) -> Self {
        Self {
            items,
            pending: Vec::new(),
            pre_images: HashMap::new(),
            next_seq: 0,
        }
    }

    /// The visible collection, optimistic changes included.
    pub fn data(&self) -> &[T] {
        &self.items
    }

    /// Pending changes in the order they were added.
    pub fn pending(&self) -> impl Iterator<Item = &OptimisticUpdate<T>> {
        self.pending.iter().map(|p| &p.update)
    }

    /// Pending operation ids, oldest first.
    pub fn pending_ids(&self) -> Vec<OperationId> {
        self.pending.iter().map(|p| p.update.id.clone()).collect()
    }

    /// Number of pending changes.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether any change is still waiting for the server.
    pub fn has_pending_updates(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether a change with this operation id is pending.
    pub fn is_pending(&self, op_id: &str) -> bool {
        self.pending.iter().any(|p| p.update.id == op_id)
    }

    /// The captured pre-image for an entity, if any.
    pub fn pre_image(&self, entity_id: &str) -> Option<&T> {
        self.pre_images
            .get(entity_id)
            .and_then(|p| p.value.as_ref())
    }

    /// Apply a change to the visible collection and register it as pending.
    pub fn add_optimistic_update(&mut self, update: OptimisticUpdate<T>) -> Result<()> {
        if self.is_pending(&update.id) {
            return Err(Error::DuplicateOperation(update.id));
        }

        let entity_id = update.entity_id();
        if entity_id.is_none() && update.kind != UpdateKind::Unknown {
            return Err(Error::MissingEntityId(update.id));
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        if let Some(id) = &entity_id {
            if !self.pre_images.contains_key(id) {
                let current = self.items.iter().find(|item| item.has_id(id)).cloned();
                let captured = match (update.kind, current) {
                    (UpdateKind::Update | UpdateKind::Delete, Some(current)) => Some(Some(current)),
                    (UpdateKind::Create, None) => Some(None),
                    _ => None,
                };
                if let Some(value) = captured {
                    self.pre_images.insert(id.clone(), PreImage { seq, value });
                }
            }
        }

        self.items = apply_optimistic_update(&self.items, &update);

        tracing::debug!(
            op_id = %update.id,
            kind = ?update.kind,
            entity_id = ?entity_id,
            "optimistic update applied"
        );

        self.pending.push(PendingEntry {
            seq,
            entity_id,
            update,
        });

        Ok(())
    }

    /// Mark a change as accepted by the server.
    ///
    /// The visible collection is left untouched. Confirming an unknown or
    /// already-confirmed id is a no-op and returns `false`.
    pub fn confirm_update(&mut self, op_id: &str) -> bool {
        let Some(entry) = self.take_pending(op_id) else {
            return false;
        };

        if let Some(id) = &entry.entity_id {
            if self.has_pending_for(id) {
                // The confirmed change is now part of the baseline the other
                // pending changes roll back to.
                if let Some(pre) = self.pre_images.get_mut(id) {
                    if entry.seq >= pre.seq {
                        match entry.update.kind {
                            UpdateKind::Update => {
                                if let Some(value) = pre.value.as_mut() {
                                    value.merge(&entry.update.data);
                                }
                            }
                            UpdateKind::Delete => pre.value = None,
                            UpdateKind::Create => pre.value = Some(entry.update.data.clone()),
                            UpdateKind::Unknown => {}
                        }
                    }
                }
            } else {
                self.pre_images.remove(id);
            }
        }

        tracing::debug!(op_id = %op_id, "optimistic update confirmed");
        true
    }

    /// Confirm a change and swap the optimistic entity for the server's copy.
    ///
    /// Typically used for creates, where the server replaces the temp id.
    pub fn confirm_with(&mut self, op_id: &str, confirmed: T) -> bool {
        let Some(entity_id) = self
            .pending
            .iter()
            .find(|p| p.update.id == op_id)
            .and_then(|p| p.entity_id.clone())
        else {
            return false;
        };

        if !self.confirm_update(op_id) {
            return false;
        }
        self.items = replace_entity(&self.items, &entity_id, &confirmed);
        true
    }

    /// Undo a pending change.
    ///
    /// The entity is restored to its pre-image and every other change still
    /// pending against it is re-applied on top. An entity whose pre-image is
    /// absent ends up removed unless a remaining change recreates it.
    pub fn rollback_update(&mut self, op_id: &str) -> RollbackOutcome {
        let Some(entry) = self.take_pending(op_id) else {
            return RollbackOutcome::NotPending;
        };

        let pre = entry
            .entity_id
            .as_ref()
            .and_then(|id| self.pre_images.get(id))
            .cloned();

        let outcome = match (&entry.entity_id, pre) {
            (Some(id), Some(pre)) => {
                self.restore_entity(id, pre, entry.update.kind);
                RollbackOutcome::Restored
            }
            _ if entry.update.needs_pre_image() => {
                tracing::warn!(
                    op_id = %op_id,
                    kind = ?entry.update.kind,
                    entity_id = ?entry.entity_id,
                    "rollback without pre-image, visible state left unchanged"
                );
                RollbackOutcome::MissingPreImage
            }
            _ => {
                self.items = rollback_optimistic_update(&self.items, &entry.update, None);
                RollbackOutcome::Restored
            }
        };

        if let Some(id) = &entry.entity_id {
            if !self.has_pending_for(id) {
                self.pre_images.remove(id);
            }
        }

        tracing::debug!(op_id = %op_id, outcome = ?outcome, "optimistic update rolled back");
        outcome
    }

    /// Replace the collection with fresh server data.
    ///
    /// Pending changes are re-applied on top of the new data, and captured
    /// pre-images are refreshed from it, so in-flight changes stay visible.
    pub fn set_data(&mut self, items: Vec<T>) {
        // An entity missing from the fresh data now has an absent baseline.
        for (id, pre) in self.pre_images.iter_mut() {
            pre.value = items.iter().find(|item| item.has_id(id)).cloned();
        }

        let mut rebased = items;
        for entry in &self.pending {
            let already_present = entry.update.kind == UpdateKind::Create
                && entry
                    .entity_id
                    .as_ref()
                    .is_some_and(|id| rebased.iter().any(|item| item.has_id(id)));
            if !already_present {
                rebased = apply_optimistic_update(&rebased, &entry.update);
            }
        }
        self.items = rebased;

        if !self.pending.is_empty() {
            tracing::debug!(
                pending = self.pending.len(),
                "rebased pending updates onto fresh data"
            );
        }
    }

    /// Rebuild one entity from its pre-image plus the changes still pending
    /// against it, and put the result back into the visible collection.
    fn restore_entity(&mut self, id: &str, pre: PreImage<T>, rolled_back: UpdateKind) {
        let PreImage { seq, value } = pre;
        let mut state: Vec<T> = value.into_iter().collect();
        for other in self
            .pending
            .iter()
            .filter(|p| p.entity_id.as_deref() == Some(id) && p.seq >= seq)
        {
            let already_present = other.update.kind == UpdateKind::Create
                && state.iter().any(|item| item.has_id(id));
            if !already_present {
                state = apply_optimistic_update(&state, &other.update);
            }
        }
        let target = state.into_iter().find(|item| item.has_id(id));

        if self.items.iter().any(|item| item.has_id(id)) {
            self.items = match target {
                Some(target) => replace_entity(&self.items, id, &target),
                None => self
                    .items
                    .iter()
                    .filter(|item| !item.has_id(id))
                    .cloned()
                    .collect(),
            };
        } else if let Some(target) = target {
            // A deleted entity comes back at the end, a created one at the front.
            if rolled_back == UpdateKind::Delete {
                self.items.push(target);
            } else {
                self.items.insert(0, target);
            }
        }
    }

    fn take_pending(&mut self, op_id: &str) -> Option<PendingEntry<T>> {
        let pos = self.pending.iter().position(|p| p.update.id == op_id)?;
        Some(self.pending.remove(pos))
    }

    fn has_pending_for(&self, entity_id: &str) -> bool {
        self.pending
            .iter()
            .any(|p| p.entity_id.as_deref() == Some(entity_id))
    }
}
