use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use cart_bridge::CartSnapshot;

/// Default freshness window for undelivered updates.
pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(5);

/// One webhook-ingested cart update waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCartUpdate {
    pub shop_key: String,
    pub snapshot: CartSnapshot,
    pub received_at: Instant,
}

/// Process-wide pending-update cache keyed by shop.
///
/// Holds at most the latest update per shop; reading is destructive so each
/// update is delivered at most once. The in-memory map is a single-instance
/// deployment choice — a multi-node relay swaps in a shared store behind
/// these same `put`/`take_fresh` methods without touching the HTTP contract.
pub struct PendingUpdateStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, PendingCartUpdate>>,
}

impl PendingUpdateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store the latest update for a shop, replacing any undelivered one.
    pub fn put(&self, shop_key: &str, snapshot: CartSnapshot) {
        let update = PendingCartUpdate {
            shop_key: shop_key.to_owned(),
            snapshot,
            received_at: Instant::now(),
        };
        self.entries
            .lock()
            .expect("pending entries lock poisoned")
            .insert(shop_key.to_owned(), update);
    }

    /// Remove and return the entry for a shop if it is still fresh.
    ///
    /// Stale entries are evicted but not returned; they missed their window
    /// and must not be delivered.
    pub fn take_fresh(&self, shop_key: &str) -> Option<PendingCartUpdate> {
        let entry = self
            .entries
            .lock()
            .expect("pending entries lock poisoned")
            .remove(shop_key)?;

        if entry.received_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry)
    }

    /// Drop the entry for a shop (used after a successful push delivery).
    pub fn evict(&self, shop_key: &str) {
        self.entries
            .lock()
            .expect("pending entries lock poisoned")
            .remove(shop_key);
    }

    /// Drop every entry older than the TTL.
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries
            .lock()
            .expect("pending entries lock poisoned")
            .retain(|_, entry| entry.received_at.elapsed() <= ttl);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("pending entries lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(item_count: u32) -> CartSnapshot {
        CartSnapshot {
            item_count,
            total_price_cents: u64::from(item_count) * 100,
            currency: "EUR".to_owned(),
            items: Vec::new(),
        }
    }

    #[test]
    fn take_is_destructive() {
        let store = PendingUpdateStore::new(DEFAULT_PENDING_TTL);
        store.put("shop-a", snapshot(1));

        let first = store.take_fresh("shop-a").expect("first take delivers");
        assert_eq!(first.snapshot.item_count, 1);
        // At-most-once: a second immediate take finds nothing.
        assert_eq!(store.take_fresh("shop-a"), None);
    }

    #[test]
    fn newer_update_replaces_undelivered_one() {
        let store = PendingUpdateStore::new(DEFAULT_PENDING_TTL);
        store.put("shop-a", snapshot(1));
        store.put("shop-a", snapshot(2));

        let delivered = store.take_fresh("shop-a").expect("latest delivers");
        assert_eq!(delivered.snapshot.item_count, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn stale_entries_are_not_delivered() {
        let store = PendingUpdateStore::new(Duration::from_millis(5));
        store.put("shop-a", snapshot(1));
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(store.take_fresh("shop-a"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn shops_are_isolated() {
        let store = PendingUpdateStore::new(DEFAULT_PENDING_TTL);
        store.put("shop-a", snapshot(1));
        store.put("shop-b", snapshot(2));

        assert_eq!(
            store
                .take_fresh("shop-b")
                .expect("shop-b delivers")
                .snapshot
                .item_count,
            2
        );
        assert_eq!(
            store
                .take_fresh("shop-a")
                .expect("shop-a still pending")
                .snapshot
                .item_count,
            1
        );
    }

    #[test]
    fn purge_drops_only_expired_entries() {
        let store = PendingUpdateStore::new(Duration::from_millis(30));
        store.put("old", snapshot(1));
        std::thread::sleep(Duration::from_millis(40));
        store.put("fresh", snapshot(2));

        store.purge_expired();
        assert_eq!(store.len(), 1);
        assert!(store.take_fresh("fresh").is_some());
    }
}
