use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad error category used for user-facing handling and retry behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WidgetErrorCategory {
    /// Invalid input (bad MIME type, oversized blob, malformed request).
    Validation,
    /// Authentication/authorization failure.
    Auth,
    /// Transient network or transport failure.
    Network,
    /// Rate-limited by the analysis service.
    RateLimited,
    /// Server-side failure (5xx).
    Server,
    /// The image bytes could not be decoded; fatal for the capture.
    Decode,
    /// Malformed or unsolicited cross-frame message.
    Protocol,
    /// Webhook signature verification failure.
    Signature,
    /// Local persistence failure.
    Storage,
    /// Internal bug or invariant break.
    Internal,
}

impl WidgetErrorCategory {
    /// Whether the retry policy may re-attempt a call failing in this
    /// category. Rate-limit and auth failures stop immediately: retrying
    /// cannot help and burns the per-identity quota.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Server)
    }
}

/// Stable error payload emitted across the command/event boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct WidgetError {
    /// High-level error category.
    pub category: WidgetErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional wait hint in milliseconds (set for rate limits).
    pub retry_after_ms: Option<u64>,
    /// Set when the retry policy gave up after exhausting its attempts.
    #[serde(default)]
    pub retries_exhausted: bool,
}

impl WidgetError {
    /// Construct a new widget error.
    pub fn new(
        category: WidgetErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            retry_after_ms: None,
            retries_exhausted: false,
        }
    }

    /// Attach a wait hint to the error.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after_ms = Some(retry_after.as_millis() as u64);
        self
    }

    /// Tag the error as the last of an exhausted retry chain. The payload is
    /// otherwise unchanged.
    pub fn after_exhausted_retries(mut self) -> Self {
        self.retries_exhausted = true;
        self
    }

    /// Build a standard invalid-phase-transition error.
    pub fn invalid_phase(current: crate::pipeline::UploadPhase, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            WidgetErrorCategory::Internal,
            "invalid_phase_transition",
            format!("cannot run '{action}' while pipeline is in phase {current:?}"),
        )
    }
}

/// Map HTTP status codes to widget error categories.
///
/// 429 and the auth statuses are deliberately non-retryable; everything else
/// outside 2xx is treated as transient.
pub fn classify_http_status(status: u16) -> WidgetErrorCategory {
    match status {
        401 | 403 => WidgetErrorCategory::Auth,
        429 => WidgetErrorCategory::RateLimited,
        400..=499 => WidgetErrorCategory::Validation,
        500..=599 => WidgetErrorCategory::Server,
        _ => WidgetErrorCategory::Internal,
    }
}

/// Fallback wait when the rate-limit reset header is absent.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Compute the wait until a rate limit resets.
///
/// `reset_epoch_secs` is the absolute reset time from the service's
/// rate-limit-reset header; `now_epoch_secs` is the current wall clock.
pub fn rate_limit_wait(reset_epoch_secs: Option<u64>, now_epoch_secs: u64) -> Duration {
    match reset_epoch_secs {
        Some(reset) => Duration::from_secs(reset.saturating_sub(now_epoch_secs)),
        None => DEFAULT_RATE_LIMIT_WAIT,
    }
}

/// Round a wait up to whole minutes for user messaging (minimum one minute).
pub fn wait_minutes_rounded_up(wait: Duration) -> u64 {
    wait.as_secs().div_ceil(60).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_http_status_categories() {
        assert_eq!(classify_http_status(400), WidgetErrorCategory::Validation);
        assert_eq!(classify_http_status(401), WidgetErrorCategory::Auth);
        assert_eq!(classify_http_status(403), WidgetErrorCategory::Auth);
        assert_eq!(classify_http_status(429), WidgetErrorCategory::RateLimited);
        assert_eq!(classify_http_status(404), WidgetErrorCategory::Validation);
        assert_eq!(classify_http_status(503), WidgetErrorCategory::Server);
        assert_eq!(classify_http_status(700), WidgetErrorCategory::Internal);
    }

    #[test]
    fn only_network_and_server_are_retryable() {
        assert!(WidgetErrorCategory::Network.is_retryable());
        assert!(WidgetErrorCategory::Server.is_retryable());
        assert!(!WidgetErrorCategory::RateLimited.is_retryable());
        assert!(!WidgetErrorCategory::Auth.is_retryable());
        assert!(!WidgetErrorCategory::Validation.is_retryable());
        assert!(!WidgetErrorCategory::Decode.is_retryable());
    }

    #[test]
    fn rate_limit_wait_uses_reset_header() {
        let wait = rate_limit_wait(Some(1_000_090), 1_000_000);
        assert_eq!(wait, Duration::from_secs(90));
    }

    #[test]
    fn rate_limit_wait_defaults_to_sixty_seconds() {
        assert_eq!(rate_limit_wait(None, 1_000_000), Duration::from_secs(60));
    }

    #[test]
    fn rate_limit_wait_never_goes_negative() {
        let wait = rate_limit_wait(Some(999_000), 1_000_000);
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn user_wait_rounds_up_to_minutes() {
        // A 90-second reset window reads as "2 minutes" in user messaging.
        assert_eq!(wait_minutes_rounded_up(Duration::from_secs(90)), 2);
        assert_eq!(wait_minutes_rounded_up(Duration::from_secs(60)), 1);
        assert_eq!(wait_minutes_rounded_up(Duration::from_secs(61)), 2);
        assert_eq!(wait_minutes_rounded_up(Duration::ZERO), 1);
    }

    #[test]
    fn exhausted_tag_preserves_payload() {
        let err = WidgetError::new(WidgetErrorCategory::Server, "upstream_error", "boom")
            .after_exhausted_retries();
        assert!(err.retries_exhausted);
        assert_eq!(err.code, "upstream_error");
        assert_eq!(err.category, WidgetErrorCategory::Server);
    }

    #[test]
    fn persists_retry_after_in_millis() {
        let err = WidgetError::new(WidgetErrorCategory::RateLimited, "rate_limited", "wait")
            .with_retry_after(Duration::from_secs(3));
        assert_eq!(err.retry_after_ms, Some(3000));
    }
}
