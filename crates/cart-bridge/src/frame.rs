use std::sync::Arc;

use tokio::sync::mpsc;

use crate::envelope::CartEnvelope;

/// One direction of the cross-document message channel.
///
/// Models the browser messaging primitive faithfully: posting is fire-and
/// forget, and a message posted before the counterpart attaches its listener
/// is silently dropped — the sender cannot detect it. The host's initial-state
/// catch-up broadcast exists because of exactly that property.
pub trait FramePort: Send + Sync {
    fn post(&self, envelope: CartEnvelope);
}

/// In-process port backed by a tokio channel.
///
/// Used by tests and by same-process embeddings; a browser deployment
/// implements [`FramePort`] over `postMessage` instead.
#[derive(Clone)]
pub struct ChannelPort {
    tx: mpsc::Sender<CartEnvelope>,
}

impl FramePort for ChannelPort {
    fn post(&self, envelope: CartEnvelope) {
        // Dropped when the counterpart is gone or saturated, by design.
        let _ = self.tx.try_send(envelope);
    }
}

/// Create a loopback port plus the receiver its messages arrive on.
pub fn channel_port(capacity: usize) -> (Arc<ChannelPort>, mpsc::Receiver<CartEnvelope>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Arc::new(ChannelPort { tx }), rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::CartMessageKind;
    use serde_json::Value;

    #[tokio::test]
    async fn posts_envelopes_to_the_receiver() {
        let (port, mut rx) = channel_port(4);
        port.post(CartEnvelope::new(CartMessageKind::GetCart, Value::Null));

        let received = rx.recv().await.expect("envelope should arrive");
        assert_eq!(received.kind, CartMessageKind::GetCart);
    }

    #[tokio::test]
    async fn dropped_receiver_swallows_posts() {
        let (port, rx) = channel_port(4);
        drop(rx);
        // No listener attached: the post vanishes without error.
        port.post(CartEnvelope::new(CartMessageKind::GetCart, Value::Null));
    }
}
