use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    envelope::{
        AddRoutinePayload, AddToCartPayload, CartEnvelope, CartErrorPayload, CartItem,
        CartMessageKind, CartSnapshot, RemoveFromCartPayload, normalize_variant_id,
    },
    frame::FramePort,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostCartError {
    #[error("variant {0} is not available")]
    VariantNotFound(u64),
    #[error("cart endpoint failure: {0}")]
    Endpoint(String),
}

/// The host page's native cart endpoints.
///
/// Implementations call the platform's cart API (`/cart.js`-style endpoints);
/// [`InMemoryHostCart`] stands in for tests.
#[async_trait]
pub trait HostCartApi: Send + Sync {
    async fn fetch(&self) -> Result<CartSnapshot, HostCartError>;

    async fn add(&self, variant_id: u64, quantity: u32) -> Result<CartSnapshot, HostCartError>;

    async fn remove(&self, variant_id: u64) -> Result<CartSnapshot, HostCartError>;
}

/// Host-side cart bridge.
///
/// Executes request envelopes against the native cart API and fans replies
/// and broadcasts out to every registered frame. Replies carry the request's
/// correlation ID, so non-requesting frames drop them as unmatched. The
/// broadcast target is deliberately wildcard: the widget is embedded across
/// many storefront domains (a known trust-boundary gap, see DESIGN.md).
pub struct HostCartBridge {
    api: Arc<dyn HostCartApi>,
    frames: Mutex<Vec<Arc<dyn FramePort>>>,
}

impl HostCartBridge {
    pub fn new(api: Arc<dyn HostCartApi>) -> Self {
        Self {
            api,
            frames: Mutex::new(Vec::new()),
        }
    }

    pub fn register_frame(&self, frame: Arc<dyn FramePort>) {
        self.frames
            .lock()
            .expect("frames lock poisoned")
            .push(frame);
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().expect("frames lock poisoned").len()
    }

    /// Broadcast a full `CART_INITIAL_STATE` to every frame.
    ///
    /// Sent shortly after host initialization as an at-least-once catch-up:
    /// a frame that posted `GET_CART` before this listener attached got
    /// nothing back (the transport drops such messages silently), so the host
    /// pushes state unprompted instead of relying on a handshake.
    pub async fn broadcast_initial_state(&self) {
        match self.api.fetch().await {
            Ok(snapshot) => self.broadcast(CartEnvelope::new(
                CartMessageKind::CartInitialState,
                snapshot_value(&snapshot),
            )),
            Err(err) => warn!(error = %err, "skipping initial cart broadcast"),
        }
    }

    /// Execute one request envelope received from an embedded frame.
    pub async fn handle_request(&self, envelope: CartEnvelope) {
        if let Some(origin) = &envelope.origin {
            debug!(%origin, kind = ?envelope.kind, "cart request received");
        }

        match envelope.kind {
            CartMessageKind::GetCart => self.handle_get_cart(envelope).await,
            CartMessageKind::AddToCart => self.handle_add(envelope).await,
            CartMessageKind::RemoveFromCart => self.handle_remove(envelope).await,
            CartMessageKind::AddRoutineToCart => self.handle_add_routine(envelope).await,
            kind => debug!(?kind, "dropping non-request envelope on host side"),
        }
    }

    async fn handle_get_cart(&self, envelope: CartEnvelope) {
        let reply = match self.api.fetch().await {
            Ok(snapshot) => envelope.reply(CartMessageKind::CartData, snapshot_value(&snapshot)),
            Err(err) => envelope.reply(
                CartMessageKind::CartUpdateError,
                host_error_value(&err, None, Vec::new()),
            ),
        };
        self.broadcast(reply);
    }

    async fn handle_add(&self, envelope: CartEnvelope) {
        let payload = match serde_json::from_value::<AddToCartPayload>(envelope.payload.clone()) {
            Ok(payload) => payload,
            Err(err) => {
                self.broadcast(malformed_payload_reply(&envelope, &err));
                return;
            }
        };

        let reply = match normalize_variant_id(&payload.variant_id) {
            None => invalid_variant_reply(&envelope, &payload.variant_id),
            Some(variant_id) => match self.api.add(variant_id, payload.quantity.max(1)).await {
                Ok(snapshot) => {
                    envelope.reply(CartMessageKind::CartUpdateSuccess, snapshot_value(&snapshot))
                }
                Err(err) => envelope.reply(
                    CartMessageKind::CartUpdateError,
                    host_error_value(&err, Some(variant_id), Vec::new()),
                ),
            },
        };
        self.broadcast(reply);
    }

    async fn handle_remove(&self, envelope: CartEnvelope) {
        let payload =
            match serde_json::from_value::<RemoveFromCartPayload>(envelope.payload.clone()) {
                Ok(payload) => payload,
                Err(err) => {
                    self.broadcast(malformed_payload_reply(&envelope, &err));
                    return;
                }
            };

        // Same normalization as the add path, so removes find what adds put in.
        let reply = match normalize_variant_id(&payload.variant_id) {
            None => invalid_variant_reply(&envelope, &payload.variant_id),
            Some(variant_id) => match self.api.remove(variant_id).await {
                Ok(snapshot) => {
                    envelope.reply(CartMessageKind::CartUpdateSuccess, snapshot_value(&snapshot))
                }
                Err(err) => envelope.reply(
                    CartMessageKind::CartUpdateError,
                    host_error_value(&err, Some(variant_id), Vec::new()),
                ),
            },
        };
        self.broadcast(reply);
    }

    /// Bulk add, implemented as a sequence of single adds.
    ///
    /// A failing item ends the sequence with an error reply naming the item
    /// and everything already applied. Earlier adds stay applied; there is no
    /// rollback.
    async fn handle_add_routine(&self, envelope: CartEnvelope) {
        let payload = match serde_json::from_value::<AddRoutinePayload>(envelope.payload.clone()) {
            Ok(payload) => payload,
            Err(err) => {
                self.broadcast(malformed_payload_reply(&envelope, &err));
                return;
            }
        };

        let mut applied: Vec<u64> = Vec::new();
        let mut latest: Option<CartSnapshot> = None;

        for item in &payload.items {
            let Some(variant_id) = normalize_variant_id(&item.variant_id) else {
                self.broadcast(envelope.reply(
                    CartMessageKind::CartUpdateError,
                    error_value(
                        "invalid_variant_id",
                        format!("unusable variant id {}", item.variant_id),
                        None,
                        applied,
                    ),
                ));
                return;
            };

            match self.api.add(variant_id, item.quantity.max(1)).await {
                Ok(snapshot) => {
                    applied.push(variant_id);
                    latest = Some(snapshot);
                }
                Err(err) => {
                    self.broadcast(envelope.reply(
                        CartMessageKind::CartUpdateError,
                        host_error_value(&err, Some(variant_id), applied),
                    ));
                    return;
                }
            }
        }

        let snapshot = match latest {
            Some(snapshot) => Ok(snapshot),
            None => self.api.fetch().await,
        };
        let reply = match snapshot {
            Ok(snapshot) => {
                envelope.reply(CartMessageKind::CartUpdateSuccess, snapshot_value(&snapshot))
            }
            Err(err) => envelope.reply(
                CartMessageKind::CartUpdateError,
                host_error_value(&err, None, applied),
            ),
        };
        self.broadcast(reply);
    }

    fn broadcast(&self, envelope: CartEnvelope) {
        let frames = self.frames.lock().expect("frames lock poisoned");
        for frame in frames.iter() {
            frame.post(envelope.clone());
        }
    }
}

/// Pump request envelopes from a transport receiver into the host bridge.
pub fn spawn_host_listener(
    bridge: Arc<HostCartBridge>,
    mut rx: mpsc::Receiver<CartEnvelope>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            bridge.handle_request(envelope).await;
        }
    })
}

fn snapshot_value(snapshot: &CartSnapshot) -> Value {
    serde_json::to_value(snapshot).unwrap_or(Value::Null)
}

fn error_value(
    code: &str,
    message: String,
    failed_variant_id: Option<u64>,
    applied_variant_ids: Vec<u64>,
) -> Value {
    serde_json::to_value(CartErrorPayload {
        code: code.to_owned(),
        message,
        failed_variant_id,
        applied_variant_ids,
    })
    .unwrap_or(Value::Null)
}

fn host_error_value(
    err: &HostCartError,
    failed_variant_id: Option<u64>,
    applied_variant_ids: Vec<u64>,
) -> Value {
    let code = match err {
        HostCartError::VariantNotFound(_) => "variant_not_found",
        HostCartError::Endpoint(_) => "cart_endpoint_error",
    };
    error_value(code, err.to_string(), failed_variant_id, applied_variant_ids)
}

fn malformed_payload_reply(envelope: &CartEnvelope, err: &serde_json::Error) -> CartEnvelope {
    envelope.reply(
        CartMessageKind::CartUpdateError,
        error_value(
            "malformed_payload",
            format!("unusable request payload: {err}"),
            None,
            Vec::new(),
        ),
    )
}

fn invalid_variant_reply(envelope: &CartEnvelope, raw: &Value) -> CartEnvelope {
    envelope.reply(
        CartMessageKind::CartUpdateError,
        error_value(
            "invalid_variant_id",
            format!("unusable variant id {raw}"),
            None,
            Vec::new(),
        ),
    )
}

/// In-memory stand-in for the host's native cart endpoints.
#[derive(Default)]
pub struct InMemoryHostCart {
    currency: String,
    items: Mutex<Vec<CartItem>>,
    prices: HashMap<u64, u64>,
    failing: Mutex<HashSet<u64>>,
}

impl InMemoryHostCart {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            ..Self::default()
        }
    }

    pub fn with_price(mut self, variant_id: u64, price_cents: u64) -> Self {
        self.prices.insert(variant_id, price_cents);
        self
    }

    /// Script a failure for every future add of `variant_id`.
    pub fn fail_variant(&self, variant_id: u64) {
        self.failing
            .lock()
            .expect("failing lock poisoned")
            .insert(variant_id);
    }

    fn build_snapshot(&self, items: &[CartItem]) -> CartSnapshot {
        let item_count = items.iter().map(|item| item.quantity).sum();
        let total_price_cents = items
            .iter()
            .map(|item| u64::from(item.quantity) * item.price_cents.unwrap_or(0))
            .sum();
        CartSnapshot {
            item_count,
            total_price_cents,
            currency: self.currency.clone(),
            items: items.to_vec(),
        }
    }
}

#[async_trait]
impl HostCartApi for InMemoryHostCart {
    async fn fetch(&self) -> Result<CartSnapshot, HostCartError> {
        let items = self.items.lock().expect("items lock poisoned");
        Ok(self.build_snapshot(&items))
    }

    async fn add(&self, variant_id: u64, quantity: u32) -> Result<CartSnapshot, HostCartError> {
        if self
            .failing
            .lock()
            .expect("failing lock poisoned")
            .contains(&variant_id)
        {
            return Err(HostCartError::Endpoint(format!(
                "scripted failure for variant {variant_id}"
            )));
        }

        let mut items = self.items.lock().expect("items lock poisoned");
        match items.iter_mut().find(|item| item.variant_id == variant_id) {
            // Distinct user-initiated adds accumulate; there is no dedup.
            Some(existing) => existing.quantity += quantity,
            None => items.push(CartItem {
                variant_id,
                quantity,
                title: None,
                price_cents: self.prices.get(&variant_id).copied(),
            }),
        }
        Ok(self.build_snapshot(&items))
    }

    async fn remove(&self, variant_id: u64) -> Result<CartSnapshot, HostCartError> {
        let mut items = self.items.lock().expect("items lock poisoned");
        let position = items
            .iter()
            .position(|item| item.variant_id == variant_id)
            .ok_or(HostCartError::VariantNotFound(variant_id))?;
        items.remove(position);
        Ok(self.build_snapshot(&items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::channel_port;
    use serde_json::json;
    use std::time::Duration;
    use tokio::{sync::mpsc, time::timeout};

    async fn next_envelope(rx: &mut mpsc::Receiver<CartEnvelope>) -> CartEnvelope {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("envelope timeout")
            .expect("envelope receive")
    }

    fn request(kind: CartMessageKind, payload: Value, correlation_id: &str) -> CartEnvelope {
        CartEnvelope::new(kind, payload)
            .with_correlation_id(correlation_id)
            .with_origin("https://widget.lumera.example")
    }

    #[tokio::test]
    async fn back_to_back_adds_accumulate_quantity() {
        let bridge = HostCartBridge::new(Arc::new(InMemoryHostCart::new("EUR")));
        let (frame, mut replies) = channel_port(8);
        bridge.register_frame(frame);

        // One native-numeric ID, one global-ID string: both normalize to the
        // same variant.
        bridge
            .handle_request(request(
                CartMessageKind::AddToCart,
                json!({"variantId": 42, "quantity": 1}),
                "r-1",
            ))
            .await;
        bridge
            .handle_request(request(
                CartMessageKind::AddToCart,
                json!({"variantId": "gid://shopify/ProductVariant/42", "quantity": 1}),
                "r-2",
            ))
            .await;

        let _first = next_envelope(&mut replies).await;
        let second = next_envelope(&mut replies).await;
        assert_eq!(second.kind, CartMessageKind::CartUpdateSuccess);
        assert_eq!(second.correlation_id.as_deref(), Some("r-2"));

        let snapshot: CartSnapshot = serde_json::from_value(second.payload).expect("snapshot");
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].quantity, 2);
        assert_eq!(snapshot.item_count, 2);
    }

    #[tokio::test]
    async fn remove_finds_items_added_under_global_id() {
        let bridge = HostCartBridge::new(Arc::new(InMemoryHostCart::new("EUR")));
        let (frame, mut replies) = channel_port(8);
        bridge.register_frame(frame);

        bridge
            .handle_request(request(
                CartMessageKind::AddToCart,
                json!({"variantId": "gid://shopify/ProductVariant/77"}),
                "r-1",
            ))
            .await;
        bridge
            .handle_request(request(
                CartMessageKind::RemoveFromCart,
                json!({"variantId": 77}),
                "r-2",
            ))
            .await;

        let _add_reply = next_envelope(&mut replies).await;
        let remove_reply = next_envelope(&mut replies).await;
        assert_eq!(remove_reply.kind, CartMessageKind::CartUpdateSuccess);

        let snapshot: CartSnapshot =
            serde_json::from_value(remove_reply.payload).expect("snapshot");
        assert!(snapshot.items.is_empty());
    }

    #[tokio::test]
    async fn routine_add_reports_failure_without_rolling_back() {
        let cart = Arc::new(InMemoryHostCart::new("EUR"));
        cart.fail_variant(2);
        let bridge = HostCartBridge::new(Arc::clone(&cart) as Arc<dyn HostCartApi>);
        let (frame, mut replies) = channel_port(8);
        bridge.register_frame(frame);

        bridge
            .handle_request(request(
                CartMessageKind::AddRoutineToCart,
                json!({"items": [
                    {"variantId": 1},
                    {"variantId": 2},
                    {"variantId": 3},
                ]}),
                "r-1",
            ))
            .await;

        let reply = next_envelope(&mut replies).await;
        assert_eq!(reply.kind, CartMessageKind::CartUpdateError);
        let error: CartErrorPayload = serde_json::from_value(reply.payload).expect("error payload");
        assert_eq!(error.failed_variant_id, Some(2));
        assert_eq!(error.applied_variant_ids, vec![1]);

        // The first item stays in the cart; nothing was rolled back, and the
        // third item was never attempted.
        let snapshot = cart.fetch().await.expect("fetch");
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].variant_id, 1);
    }

    #[tokio::test]
    async fn routine_add_success_replies_with_final_snapshot() {
        let bridge = HostCartBridge::new(Arc::new(
            InMemoryHostCart::new("EUR").with_price(1, 1_000).with_price(2, 500),
        ));
        let (frame, mut replies) = channel_port(8);
        bridge.register_frame(frame);

        bridge
            .handle_request(request(
                CartMessageKind::AddRoutineToCart,
                json!({"items": [
                    {"variantId": 1, "quantity": 2},
                    {"variantId": 2},
                ]}),
                "r-1",
            ))
            .await;

        let reply = next_envelope(&mut replies).await;
        assert_eq!(reply.kind, CartMessageKind::CartUpdateSuccess);
        let snapshot: CartSnapshot = serde_json::from_value(reply.payload).expect("snapshot");
        assert_eq!(snapshot.item_count, 3);
        assert_eq!(snapshot.total_price_cents, 2_500);
    }

    #[tokio::test]
    async fn initial_state_broadcast_reaches_every_frame() {
        let bridge = HostCartBridge::new(Arc::new(InMemoryHostCart::new("EUR")));
        let (frame_a, mut rx_a) = channel_port(4);
        let (frame_b, mut rx_b) = channel_port(4);
        bridge.register_frame(frame_a);
        bridge.register_frame(frame_b);

        bridge.broadcast_initial_state().await;

        let a = next_envelope(&mut rx_a).await;
        let b = next_envelope(&mut rx_b).await;
        assert_eq!(a.kind, CartMessageKind::CartInitialState);
        assert_eq!(a, b);
        assert_eq!(a.correlation_id, None);
    }

    #[tokio::test]
    async fn non_request_envelopes_are_dropped_without_reply() {
        let bridge = HostCartBridge::new(Arc::new(InMemoryHostCart::new("EUR")));
        let (frame, mut replies) = channel_port(4);
        bridge.register_frame(frame);

        bridge
            .handle_request(
                CartEnvelope::new(CartMessageKind::CartData, json!({"itemCount": 0}))
                    .with_correlation_id("stray"),
            )
            .await;

        assert!(
            timeout(Duration::from_millis(50), replies.recv())
                .await
                .is_err(),
            "host must not answer response-kind envelopes"
        );
    }

    #[tokio::test]
    async fn unusable_variant_id_yields_error_reply() {
        let bridge = HostCartBridge::new(Arc::new(InMemoryHostCart::new("EUR")));
        let (frame, mut replies) = channel_port(4);
        bridge.register_frame(frame);

        bridge
            .handle_request(request(
                CartMessageKind::AddToCart,
                json!({"variantId": "gid://shopify/ProductVariant/not-a-number"}),
                "r-1",
            ))
            .await;

        let reply = next_envelope(&mut replies).await;
        assert_eq!(reply.kind, CartMessageKind::CartUpdateError);
        let error: CartErrorPayload = serde_json::from_value(reply.payload).expect("error payload");
        assert_eq!(error.code, "invalid_variant_id");
    }
}
