//! Webhook-to-subscriber relay for externally driven cart changes.
//!
//! Checkout flows elsewhere on the host mutate the cart outside the widget's
//! sight; the platform reports them via signed webhooks. This crate verifies
//! those webhooks (HMAC-SHA256 over the raw body, failing closed), caches the
//! update briefly per shop, and forwards it to the embedded app over an SSE
//! stream or a destructive poll endpoint — at most once per update.

/// Short-TTL pending-update cache keyed by shop.
pub mod cache;
/// Axum router and HTTP handlers.
pub mod routes;
/// Webhook signature verification.
pub mod signature;
/// Per-shop push channels and the SSE wire events.
pub mod stream;

pub use cache::{DEFAULT_PENDING_TTL, PendingCartUpdate, PendingUpdateStore};
pub use routes::{PollResponse, RelayError, RelayState, SharedRelayState, router};
pub use signature::{SIGNATURE_HEADER, SignatureError, sign_body, verify_signature};
pub use stream::{RelayEvent, ShopBroadcasters};
