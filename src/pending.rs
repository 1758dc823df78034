use dashmap::DashSet;
use std::sync::Arc;

use crate::order::OrderId;

/// Ids of orders that have not reached a terminal status and are still polled.
///
/// Cloning shares the underlying set. The poller only takes snapshots; the
/// reconciler is the only writer.
#[derive(Debug, Clone, Default)]
pub struct PendingSet {
    ids: Arc<DashSet<OrderId>>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the id was already pending.
    pub(crate) fn insert(&self, order_id: OrderId) -> bool {
        self.ids.insert(order_id)
    }

    /// Returns `false` if the id was not pending. Removing twice is a no-op.
    pub(crate) fn remove(&self, order_id: &OrderId) -> bool {
        self.ids.remove(order_id).is_some()
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.ids.contains(order_id)
    }

    /// Point-in-time copy, safe to iterate while the set keeps changing.
    pub fn snapshot(&self) -> Vec<OrderId> {
        let mut ids: Vec<OrderId> = self.ids.iter().map(|id| id.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove_are_idempotent() {
        let pending = PendingSet::new();
        let id = OrderId::from("abc");

        assert!(pending.insert(id.clone()));
        assert!(!pending.insert(id.clone()));
        assert_eq!(pending.len(), 1);

        assert!(pending.remove(&id));
        assert!(!pending.remove(&id));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let pending = PendingSet::new();
        let shared = pending.clone();

        pending.insert(OrderId::from("abc"));

        assert!(shared.contains(&OrderId::from("abc")));
    }

    #[test]
    fn test_snapshot_is_detached_from_later_changes() {
        let pending = PendingSet::new();
        pending.insert(OrderId::from("b"));
        pending.insert(OrderId::from("a"));

        let snapshot = pending.snapshot();
        pending.remove(&OrderId::from("a"));
        pending.insert(OrderId::from("c"));

        assert_eq!(snapshot, vec![OrderId::from("a"), OrderId::from("b")]);
        assert_eq!(pending.snapshot(), vec![OrderId::from("b"), OrderId::from("c")]);
    }

    #[test]
    fn test_concurrent_snapshots_while_removing() {
        let pending = PendingSet::new();
        for n in 0..500 {
            pending.insert(OrderId::from(format!("order-{n}")));
        }

        let reader = {
            let pending = pending.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let snapshot = pending.snapshot();
                    assert!(snapshot.len() <= 500);
                }
            })
        };

        for n in 0..500 {
            pending.remove(&OrderId::from(format!("order-{n}")));
        }
        reader.join().unwrap();

        assert!(pending.is_empty());
    }
}
