//! Single-slot optimistic controller.
//!
//! The one-record counterpart of [`OptimisticList`](crate::OptimisticList),
//! for screens that hold a single focal record such as a job detail view.

use crate::RollbackOutcome;

/// A single value with at most one outstanding optimistic change.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticItem<T> {
    current: Option<T>,
    /// Value from before the first pending optimistic change
    snapshot: Option<Option<T>>,
}

impl<T> Default for OptimisticItem<T> {
    fn default() -> Self {
        Self {
            current: None,
            snapshot: None,
        }
    }
}

impl<T: Clone> OptimisticItem<T> {
    /// Create a controller holding `initial`.
    pub fn new(initial: Option<T>) -> Self {
        Self {
            current: initial,
            snapshot: None,
        }
    }

    /// The visible value.
    pub fn data(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Whether an optimistic value is waiting for the server.
    pub fn has_pending_update(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Show `value` immediately, remembering what it replaced.
    ///
    /// Only the first call before a confirm or rollback snapshots, so a
    /// rollback always returns to the last server-backed value.
    pub fn set_optimistic_data(&mut self, value: T) {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.current.clone());
        }
        self.current = Some(value);
    }

    /// Restore the value from before the pending change.
    pub fn rollback(&mut self) -> RollbackOutcome {
        match self.snapshot.take() {
            Some(previous) => {
                self.current = previous;
                RollbackOutcome::Restored
            }
            None => {
                tracing::warn!("item rollback without snapshot, value left unchanged");
                RollbackOutcome::MissingPreImage
            }
        }
    }

    /// Accept the optimistic value as authoritative. Idempotent.
    pub fn confirm_update(&mut self) {
        self.snapshot = None;
    }

    /// Take a fresh value from the server.
    ///
    /// While an optimistic value is pending it stays visible and the fresh
    /// value becomes what a rollback restores.
    pub fn set_data(&mut self, value: Option<T>) {
        match &mut self.snapshot {
            Some(baseline) => *baseline = value,
            None => self.current = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optimistic_then_rollback() {
        let mut item = OptimisticItem::new(Some(json!({"id": 1, "status": "pending"})));
        item.set_optimistic_data(json!({"id": 1, "status": "accepted"}));

        assert!(item.has_pending_update());
        assert_eq!(item.data(), Some(&json!({"id": 1, "status": "accepted"})));

        assert_eq!(item.rollback(), RollbackOutcome::Restored);
        assert_eq!(item.data(), Some(&json!({"id": 1, "status": "pending"})));
        assert!(!item.has_pending_update());
    }

    #[test]
    fn repeated_optimistic_values_roll_back_to_original() {
        let mut item = OptimisticItem::new(Some(1));
        item.set_optimistic_data(2);
        item.set_optimistic_data(3);

        item.rollback();
        assert_eq!(item.data(), Some(&1));
    }

    #[test]
    fn confirm_keeps_value_and_is_idempotent() {
        let mut item = OptimisticItem::new(Some("a"));
        item.set_optimistic_data("b");
        item.confirm_update();
        item.confirm_update();

        assert_eq!(item.data(), Some(&"b"));
        assert_eq!(item.rollback(), RollbackOutcome::MissingPreImage);
        assert_eq!(item.data(), Some(&"b"));
    }

    #[test]
    fn rollback_from_empty_restores_none() {
        let mut item = OptimisticItem::default();
        item.set_optimistic_data(5);
        item.rollback();
        assert_eq!(item.data(), None);
    }

    #[test]
    fn set_data_while_pending_updates_baseline() {
        let mut item = OptimisticItem::new(Some(1));
        item.set_optimistic_data(2);
        item.set_data(Some(10));

        assert_eq!(item.data(), Some(&2));
        item.rollback();
        assert_eq!(item.data(), Some(&10));
    }

    #[test]
    fn set_data_without_pending_replaces() {
        let mut item = OptimisticItem::new(Some(1));
        item.set_data(Some(7));
        assert_eq!(item.data(), Some(&7));
        assert!(!item.has_pending_update());
    }
}
