use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use cart_bridge::CartSnapshot;
use futures::{Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::{
    cache::PendingUpdateStore,
    signature::{SIGNATURE_HEADER, verify_signature},
    stream::{RelayEvent, ShopBroadcasters},
};

/// Shared relay state behind the router.
pub struct RelayState {
    secret: Vec<u8>,
    store: PendingUpdateStore,
    broadcasters: ShopBroadcasters,
}

pub type SharedRelayState = Arc<RelayState>;

impl RelayState {
    pub fn new(secret: impl Into<Vec<u8>>, pending_ttl: Duration, sse_capacity: usize) -> Self {
        Self {
            secret: secret.into(),
            store: PendingUpdateStore::new(pending_ttl),
            broadcasters: ShopBroadcasters::new(sse_capacity),
        }
    }

    pub fn store(&self) -> &PendingUpdateStore {
        &self.store
    }

    pub fn broadcasters(&self) -> &ShopBroadcasters {
        &self.broadcasters
    }
}

/// Webhook/HTTP errors with their response mapping.
///
/// Bodies are generic on purpose: signature failures must not leak what was
/// wrong with the attempt.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("missing signature header")]
    MissingSignature,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::MissingSignature => "Missing signature",
            Self::InvalidSignature => "Invalid signature",
            Self::InvalidPayload(_) => "Invalid payload",
        };
        (status, body).into_response()
    }
}

/// Verified webhook body.
#[derive(Debug, Deserialize)]
struct CartWebhook {
    shop: String,
    cart: CartSnapshot,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub update: Option<CartSnapshot>,
}

/// Build the relay router.
pub fn router(state: SharedRelayState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhooks/cart", post(webhook_handler))
        .route("/cart-updates/{shop}", get(poll_handler))
        .route("/cart-updates/{shop}/stream", get(stream_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Ingest one cart webhook.
///
/// The HMAC is verified over the raw body before anything is parsed; a
/// missing or wrong signature fails closed with 401 and writes nothing.
pub async fn webhook_handler(
    State(state): State<SharedRelayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, RelayError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(RelayError::MissingSignature)?;

    verify_signature(&state.secret, &body, signature).map_err(|err| {
        warn!(error = %err, "rejecting cart webhook");
        RelayError::InvalidSignature
    })?;

    let webhook: CartWebhook = serde_json::from_slice(&body)
        .map_err(|err| RelayError::InvalidPayload(err.to_string()))?;

    state.store.put(&webhook.shop, webhook.cart.clone());
    let delivered = state.broadcasters.publish(&webhook.shop, webhook.cart);
    if delivered > 0 {
        // Forwarded to a live stream: delivered-and-expired, at most once.
        state.store.evict(&webhook.shop);
    }

    debug!(shop = %webhook.shop, delivered, "cart update ingested");
    Ok(StatusCode::OK)
}

/// Pull fallback for clients without a streaming channel. Reading evicts.
pub async fn poll_handler(
    State(state): State<SharedRelayState>,
    Path(shop): Path<String>,
) -> Json<PollResponse> {
    let update = state
        .store
        .take_fresh(&shop)
        .map(|pending| pending.snapshot);
    Json(PollResponse { update })
}

/// Per-shop SSE stream: a `connected` event, any still-fresh pending update,
/// then live pushes.
pub async fn stream_handler(
    State(state): State<SharedRelayState>,
    Path(shop): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let live_rx = state.broadcasters.subscribe(&shop);

    let mut initial = vec![RelayEvent::Connected { shop: shop.clone() }];
    if let Some(pending) = state.store.take_fresh(&shop) {
        initial.push(RelayEvent::CartUpdated {
            data: pending.snapshot,
        });
    }
    let initial = stream::iter(
        initial
            .into_iter()
            .map(|event| Ok::<Event, Infallible>(sse_event(&event))),
    );

    let live = BroadcastStream::new(live_rx).filter_map(|result| async move {
        match result {
            Ok(snapshot) => Some(Ok::<Event, Infallible>(sse_event(&RelayEvent::CartUpdated {
                data: snapshot,
            }))),
            // A lagged subscriber just misses the overwritten updates.
            Err(_) => None,
        }
    });

    Sse::new(initial.chain(live)).keep_alive(KeepAlive::default())
}

fn sse_event(event: &RelayEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(data) => Event::default().data(data),
        Err(_) => Event::default().data("{}"),
    }
}
