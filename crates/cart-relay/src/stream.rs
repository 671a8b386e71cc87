use std::{collections::HashMap, sync::Mutex};

use cart_bridge::CartSnapshot;
use serde::Serialize;
use tokio::sync::broadcast;

/// Wire shape of one SSE `data:` line.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RelayEvent {
    /// First event on every stream.
    Connected { shop: String },
    /// A verified cart update for the subscribed shop.
    CartUpdated { data: CartSnapshot },
}

/// Per-shop push channels feeding open SSE streams.
pub struct ShopBroadcasters {
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<CartSnapshot>>>,
}

impl ShopBroadcasters {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to pushes for a shop, creating its channel on first use.
    pub fn subscribe(&self, shop_key: &str) -> broadcast::Receiver<CartSnapshot> {
        let mut channels = self.channels.lock().expect("broadcasters lock poisoned");
        channels
            .entry(shop_key.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Push an update to every open stream for a shop.
    ///
    /// Returns the number of subscribers it reached; zero means nothing was
    /// delivered and the pending cache stays responsible for the update.
    pub fn publish(&self, shop_key: &str, snapshot: CartSnapshot) -> usize {
        let channels = self.channels.lock().expect("broadcasters lock poisoned");
        match channels.get(shop_key) {
            Some(sender) => sender.send(snapshot).unwrap_or(0),
            None => 0,
        }
    }
}
