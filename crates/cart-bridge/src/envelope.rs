use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message vocabulary exchanged across the frame boundary.
///
/// Serialized as the wire-level SCREAMING_SNAKE_CASE tags
/// (`GET_CART`, `CART_INITIAL_STATE`, …).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartMessageKind {
    /// Embedded → host: request the current cart snapshot.
    GetCart,
    /// Embedded → host: add one variant.
    AddToCart,
    /// Embedded → host: remove one variant.
    RemoveFromCart,
    /// Embedded → host: add a routine (bulk variant of add).
    AddRoutineToCart,
    /// Host → embedded: unsolicited full-state catch-up broadcast.
    CartInitialState,
    /// Host → embedded: mutation succeeded; payload is the updated snapshot.
    CartUpdateSuccess,
    /// Host → embedded: mutation failed; payload carries the error context.
    CartUpdateError,
    /// Host → embedded: snapshot reply to `GET_CART`.
    CartData,
}

/// The structured message exchanged across the iframe boundary.
///
/// JSON-shaped, no additional wire framing. Every reply-expecting request
/// carries a correlation ID; replies echo it so the embedded side can pair
/// them with its outstanding-request table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartEnvelope {
    #[serde(rename = "type")]
    pub kind: CartMessageKind,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Sender origin, carried for logging. Not verified before dispatch; see
    /// DESIGN.md.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl CartEnvelope {
    pub fn new(kind: CartMessageKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            correlation_id: None,
            origin: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Build a reply, echoing this envelope's correlation ID.
    pub fn reply(&self, kind: CartMessageKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            correlation_id: self.correlation_id.clone(),
            origin: None,
        }
    }
}

/// One line item of a cart snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Normalized numeric variant ID.
    pub variant_id: u64,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Unit price in minor currency units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<u64>,
}

/// Read-mostly cart state shared with the embedded app.
///
/// The embedded app never mutates a snapshot locally; it requests a mutation
/// through the bridge and waits for the updated snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub item_count: u32,
    /// Cart total in minor currency units.
    pub total_price_cents: u64,
    pub currency: String,
    #[serde(default)]
    pub items: Vec<CartItem>,
}

/// Payload of `ADD_TO_CART`, and one element of `ADD_ROUTINE_TO_CART`.
///
/// `variant_id` is kept raw here: it may arrive as a platform-native number
/// or a structured global-ID string, and is normalized by the host bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartPayload {
    pub variant_id: Value,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Payload of `ADD_ROUTINE_TO_CART`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddRoutinePayload {
    pub items: Vec<AddToCartPayload>,
}

/// Payload of `REMOVE_FROM_CART`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartPayload {
    pub variant_id: Value,
}

/// Payload of `CART_UPDATE_ERROR`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartErrorPayload {
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Variant the failure applies to, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_variant_id: Option<u64>,
    /// Variants already applied before a bulk sequence failed. Earlier adds
    /// are not rolled back; this is the partial-application context.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_variant_ids: Vec<u64>,
}

/// Normalize a raw variant identifier to its numeric form.
///
/// Accepts platform-native numbers, numeric strings, and structured global-ID
/// strings (`gid://…/ProductVariant/123`), always reducing to the numeric
/// suffix. Both the add and remove paths go through this same function so
/// lookups by ID agree.
pub fn normalize_variant_id(raw: &Value) -> Option<u64> {
    match raw {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => {
            let trimmed = text.trim();
            if let Ok(id) = trimmed.parse::<u64>() {
                return Some(id);
            }
            let suffix = trimmed.rsplit('/').next()?;
            suffix.parse::<u64>().ok()
        }
        _ => None,
    }
}
