//! Cross-frame cart synchronization between an embedded widget and the host
//! storefront page.
//!
//! The embedded side turns in-app cart actions into correlated request
//! envelopes; the host side executes them against the page's native cart API
//! and fans replies and catch-up broadcasts back to every embedded frame.

/// Message envelope, wire vocabulary, and variant-ID normalization.
pub mod envelope;
/// The cross-document messaging seam and an in-process loopback port.
pub mod frame;

/// Embedded-side bridge with the outstanding-request table.
pub mod embedded;
/// Host-side bridge executing against the native cart API.
pub mod host;

pub use embedded::{CartRequestOutcome, EmbeddedCartBridge, spawn_embedded_listener};
pub use envelope::{
    AddRoutinePayload, AddToCartPayload, CartEnvelope, CartErrorPayload, CartItem,
    CartMessageKind, CartSnapshot, RemoveFromCartPayload, normalize_variant_id,
};
pub use frame::{ChannelPort, FramePort, channel_port};
pub use host::{
    HostCartApi, HostCartBridge, HostCartError, InMemoryHostCart, spawn_host_listener,
};
