//! Pure apply/rollback of a single optimistic update.
//!
//! Neither function mutates its input; both return a new collection. They are
//! safe to call from any context and are the building blocks the list
//! controller replays.

use crate::{Entity, OptimisticUpdate, UpdateKind};

/// Apply one update to a collection.
///
/// - `Create` prepends the entity (newest first).
/// - `Update` shallow-merges into the item with the same id; no match is a no-op.
/// - `Delete` removes the item with the same id; no match is a no-op.
/// - `Unknown` returns the collection unchanged.
pub fn apply_optimistic_update<T: Entity>(items: &[T], update: &OptimisticUpdate<T>) -> Vec<T> {
    match update.kind {
        UpdateKind::Create => {
            let mut out = Vec::with_capacity(items.len() + 1);
            out.push(update.data.clone());
            out.extend_from_slice(items);
            out
        }
        UpdateKind::Update => {
            let Some(target) = update.entity_id() else {
                return items.to_vec();
            };
            items
                .iter()
                .map(|item| {
                    if item.has_id(&target) {
                        let mut merged = item.clone();
                        merged.merge(&update.data);
                        merged
                    } else {
                        item.clone()
                    }
                })
                .collect()
        }
        UpdateKind::Delete => match update.entity_id() {
            Some(target) => items
                .iter()
                .filter(|item| !item.has_id(&target))
                .cloned()
                .collect(),
            None => items.to_vec(),
        },
        UpdateKind::Unknown => items.to_vec(),
    }
}

/// Undo one update given the entity's pre-image, if any.
///
/// - `Create` removes the optimistically inserted item.
/// - `Update` replaces the matching item with `original`; without it, no-op.
/// - `Delete` re-appends `original` at the end; without it, no-op. The
///   original position is not restored.
pub fn rollback_optimistic_update<T: Entity>(
    items: &[T],
    update: &OptimisticUpdate<T>,
    original: Option<&T>,
) -> Vec<T> {
    match (update.kind, original) {
        (UpdateKind::Create, _) => match update.entity_id() {
            Some(target) => items
                .iter()
                .filter(|item| !item.has_id(&target))
                .cloned()
                .collect(),
            None => items.to_vec(),
        },
        (UpdateKind::Update, Some(original)) => {
            let Some(target) = update.entity_id() else {
                return items.to_vec();
            };
            items
                .iter()
                .map(|item| {
                    if item.has_id(&target) {
                        original.clone()
                    } else {
                        item.clone()
                    }
                })
                .collect()
        }
        (UpdateKind::Delete, Some(original)) => {
            let mut out = items.to_vec();
            out.push(original.clone());
            out
        }
        _ => items.to_vec(),
    }
}

/// Replace the entity carrying `temp_id` with the server-confirmed entity.
///
/// Used once the server has assigned a permanent id to an optimistically
/// created entity. Absence of `temp_id` is a no-op.
pub fn replace_entity<T: Entity>(items: &[T], temp_id: &str, confirmed: &T) -> Vec<T> {
    items
        .iter()
        .map(|item| {
            if item.has_id(temp_id) {
                confirmed.clone()
            } else {
                item.clone()
            }
        })
        .collect()
}
