use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    envelope::{
        AddRoutinePayload, AddToCartPayload, CartEnvelope, CartErrorPayload, CartMessageKind,
        CartSnapshot, RemoveFromCartPayload,
    },
    frame::FramePort,
};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one embedded-side cart request.
///
/// The transport gives no delivery guarantee, so "no reply" is an explicit
/// outcome rather than an error the caller has to fish out of a timeout.
#[derive(Debug, Clone, PartialEq)]
pub enum CartRequestOutcome {
    /// The host replied with an updated snapshot.
    Updated(CartSnapshot),
    /// The host replied with an error payload.
    HostError(CartErrorPayload),
    /// No reply arrived before the request timeout.
    NoResponse,
}

/// Embedded-side cart bridge.
///
/// Turns in-app cart actions into correlated request envelopes, pairs replies
/// through an outstanding-request table, and folds host broadcasts into the
/// local snapshot. Replies without a matching outstanding request are dropped
/// and logged, never surfaced to the user.
pub struct EmbeddedCartBridge {
    port: Arc<dyn FramePort>,
    origin: String,
    request_timeout: Duration,
    pending: Mutex<HashMap<String, oneshot::Sender<CartEnvelope>>>,
    snapshot: Mutex<Option<CartSnapshot>>,
}

impl EmbeddedCartBridge {
    pub fn new(port: Arc<dyn FramePort>, origin: impl Into<String>) -> Self {
        Self {
            port,
            origin: origin.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pending: Mutex::new(HashMap::new()),
            snapshot: Mutex::new(None),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Latest snapshot received from the host, if any.
    pub fn snapshot(&self) -> Option<CartSnapshot> {
        self.snapshot
            .lock()
            .expect("snapshot lock poisoned")
            .clone()
    }

    /// Number of requests still waiting for a reply.
    pub fn outstanding_requests(&self) -> usize {
        self.pending.lock().expect("pending lock poisoned").len()
    }

    /// Feed one envelope received from the frame boundary.
    ///
    /// Broadcasts may arrive more than once (the host fans out to every
    /// frame it can enumerate); applying the same snapshot twice is a no-op.
    pub fn handle_incoming(&self, envelope: CartEnvelope) {
        if let Some(correlation_id) = envelope.correlation_id.clone() {
            let waiter = self
                .pending
                .lock()
                .expect("pending lock poisoned")
                .remove(&correlation_id);
            match waiter {
                Some(reply_tx) => {
                    let _ = reply_tx.send(envelope);
                }
                None => {
                    debug!(
                        %correlation_id,
                        kind = ?envelope.kind,
                        "dropping reply without outstanding request"
                    );
                }
            }
            return;
        }

        match envelope.kind {
            CartMessageKind::CartInitialState | CartMessageKind::CartData => {
                self.apply_broadcast(envelope.payload);
            }
            kind => debug!(?kind, "dropping unsolicited cross-frame message"),
        }
    }

    /// Request the current cart snapshot.
    pub async fn request_cart(&self) -> CartRequestOutcome {
        self.send_request(CartMessageKind::GetCart, Value::Null)
            .await
    }

    /// Request an add of one variant. `variant_id` may be native-numeric or a
    /// structured global-ID string; the host normalizes it.
    pub async fn add_to_cart(&self, variant_id: Value, quantity: u32) -> CartRequestOutcome {
        let payload = AddToCartPayload {
            variant_id,
            quantity,
        };
        self.send_request(CartMessageKind::AddToCart, to_payload_value(&payload))
            .await
    }

    /// Request a removal of one variant.
    pub async fn remove_from_cart(&self, variant_id: Value) -> CartRequestOutcome {
        let payload = RemoveFromCartPayload { variant_id };
        self.send_request(CartMessageKind::RemoveFromCart, to_payload_value(&payload))
            .await
    }

    /// Request a bulk add of a routine. Partial application is possible; the
    /// error payload carries which items were already applied.
    pub async fn add_routine(&self, items: Vec<AddToCartPayload>) -> CartRequestOutcome {
        let payload = AddRoutinePayload { items };
        self.send_request(CartMessageKind::AddRoutineToCart, to_payload_value(&payload))
            .await
    }

    async fn send_request(&self, kind: CartMessageKind, payload: Value) -> CartRequestOutcome {
        let correlation_id = Uuid::new_v4().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .insert(correlation_id.clone(), reply_tx);

        self.port.post(
            CartEnvelope::new(kind, payload)
                .with_correlation_id(correlation_id.clone())
                .with_origin(self.origin.clone()),
        );

        match timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(reply)) => self.interpret_reply(reply),
            _ => {
                self.pending
                    .lock()
                    .expect("pending lock poisoned")
                    .remove(&correlation_id);
                debug!(%correlation_id, ?kind, "cart request timed out without a reply");
                CartRequestOutcome::NoResponse
            }
        }
    }

    fn interpret_reply(&self, reply: CartEnvelope) -> CartRequestOutcome {
        match reply.kind {
            CartMessageKind::CartData
            | CartMessageKind::CartUpdateSuccess
            | CartMessageKind::CartInitialState => {
                match serde_json::from_value::<CartSnapshot>(reply.payload) {
                    Ok(snapshot) => {
                        self.store_snapshot(snapshot.clone());
                        CartRequestOutcome::Updated(snapshot)
                    }
                    Err(err) => {
                        debug!(error = %err, "dropping malformed snapshot reply");
                        CartRequestOutcome::NoResponse
                    }
                }
            }
            CartMessageKind::CartUpdateError => {
                match serde_json::from_value::<CartErrorPayload>(reply.payload) {
                    Ok(error) => CartRequestOutcome::HostError(error),
                    Err(err) => CartRequestOutcome::HostError(CartErrorPayload {
                        code: "malformed_error_payload".to_owned(),
                        message: err.to_string(),
                        failed_variant_id: None,
                        applied_variant_ids: Vec::new(),
                    }),
                }
            }
            kind => {
                debug!(?kind, "dropping reply with unexpected kind");
                CartRequestOutcome::NoResponse
            }
        }
    }

    fn apply_broadcast(&self, payload: Value) {
        match serde_json::from_value::<CartSnapshot>(payload) {
            Ok(snapshot) => self.store_snapshot(snapshot),
            Err(err) => debug!(error = %err, "dropping malformed cart broadcast"),
        }
    }

    fn store_snapshot(&self, snapshot: CartSnapshot) {
        *self.snapshot.lock().expect("snapshot lock poisoned") = Some(snapshot);
    }
}

fn to_payload_value<T: serde::Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or(Value::Null)
}

/// Pump envelopes from a transport receiver into the bridge.
pub fn spawn_embedded_listener(
    bridge: Arc<EmbeddedCartBridge>,
    mut rx: mpsc::Receiver<CartEnvelope>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            bridge.handle_incoming(envelope);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::channel_port;
    use serde_json::json;

    fn snapshot_with_one_item() -> Value {
        json!({
            "itemCount": 1,
            "totalPriceCents": 2_500,
            "currency": "EUR",
            "items": [{"variantId": 42, "quantity": 1}]
        })
    }

    #[tokio::test]
    async fn drops_reply_without_outstanding_request() {
        let (port, _host_rx) = channel_port(4);
        let bridge = EmbeddedCartBridge::new(port, "https://shop.example");

        let stray = CartEnvelope::new(CartMessageKind::CartData, snapshot_with_one_item())
            .with_correlation_id("never-sent");
        bridge.handle_incoming(stray);

        // Ignored entirely: no snapshot state change.
        assert_eq!(bridge.snapshot(), None);
    }

    #[tokio::test]
    async fn applies_initial_state_broadcast_idempotently() {
        let (port, _host_rx) = channel_port(4);
        let bridge = EmbeddedCartBridge::new(port, "https://shop.example");

        let broadcast =
            CartEnvelope::new(CartMessageKind::CartInitialState, snapshot_with_one_item());
        bridge.handle_incoming(broadcast.clone());
        let first = bridge.snapshot().expect("snapshot should be set");

        // The host broadcasts to every frame it sees; a duplicate delivery
        // must not change state.
        bridge.handle_incoming(broadcast);
        assert_eq!(bridge.snapshot().expect("snapshot stays set"), first);
        assert_eq!(first.item_count, 1);
    }

    #[tokio::test]
    async fn request_resolves_to_no_response_on_timeout() {
        let (port, _host_rx) = channel_port(4);
        let bridge = EmbeddedCartBridge::new(port, "https://shop.example")
            .with_request_timeout(Duration::from_millis(20));

        let outcome = bridge.request_cart().await;
        assert_eq!(outcome, CartRequestOutcome::NoResponse);
        // The outstanding-request table is cleaned up.
        assert_eq!(bridge.outstanding_requests(), 0);
    }

    #[tokio::test]
    async fn pairs_reply_with_outstanding_request() {
        let (port, mut host_rx) = channel_port(4);
        let bridge = Arc::new(EmbeddedCartBridge::new(port, "https://shop.example"));

        let bridge_for_host = Arc::clone(&bridge);
        let host = tokio::spawn(async move {
            let request = host_rx.recv().await.expect("request should arrive");
            assert_eq!(request.kind, CartMessageKind::AddToCart);
            let reply = request.reply(CartMessageKind::CartUpdateSuccess, snapshot_with_one_item());
            bridge_for_host.handle_incoming(reply);
        });

        let outcome = bridge.add_to_cart(json!(42), 1).await;
        host.await.expect("host task");

        match outcome {
            CartRequestOutcome::Updated(snapshot) => assert_eq!(snapshot.item_count, 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(bridge.snapshot().expect("snapshot cached").item_count, 1);
    }

    #[tokio::test]
    async fn host_error_reply_surfaces_the_payload() {
        let (port, mut host_rx) = channel_port(4);
        let bridge = Arc::new(EmbeddedCartBridge::new(port, "https://shop.example"));

        let bridge_for_host = Arc::clone(&bridge);
        let host = tokio::spawn(async move {
            let request = host_rx.recv().await.expect("request should arrive");
            let reply = request.reply(
                CartMessageKind::CartUpdateError,
                json!({"code": "variant_not_found", "message": "gone"}),
            );
            bridge_for_host.handle_incoming(reply);
        });

        let outcome = bridge.remove_from_cart(json!(9_999)).await;
        host.await.expect("host task");

        match outcome {
            CartRequestOutcome::HostError(error) => {
                assert_eq!(error.code, "variant_not_found");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
