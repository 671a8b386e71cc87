//! Core widget contract shared between the runtime and UI shells.
//!
//! This crate defines the command/event protocol, the upload-pipeline state
//! machine, retry and error taxonomy, and common channel abstractions.

/// Async command/event channel primitives.
pub mod channel;
/// Stable widget error types and HTTP classification helpers.
pub mod error;
/// Terminal-outcome and user-message normalization helpers.
pub mod normalization;
/// Capture-to-inference pipeline state machine.
pub mod pipeline;
/// Backoff policy used by retry loops.
pub mod retry;
/// Protocol types (commands, events, capture/session payloads).
pub mod types;

pub use channel::{EventStream, WidgetChannelError, WidgetChannels};
pub use error::{
    WidgetError, WidgetErrorCategory, classify_http_status, rate_limit_wait,
    wait_minutes_rounded_up,
};
pub use normalization::{UserMessage, terminal_event, user_message};
pub use pipeline::{
    ACCEPTED_MIME_TYPES, CLIENT_MAX_UPLOAD_BYTES, UploadPhase, UploadPipeline,
};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};
pub use types::{
    AnalysisOutcome, CaptureSession, CaptureSource, FacingMode, UploadTicket, UserProfile,
    WidgetCommand, WidgetEvent,
};
