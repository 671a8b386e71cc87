use serde::{Deserialize, Serialize};

/// Where a capture's image bytes came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CaptureSource {
    /// Live camera shutter.
    Camera,
    /// File picker upload.
    File,
}

/// Requested camera facing mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FacingMode {
    /// Front-facing ("selfie") camera.
    User,
    /// Rear-facing camera.
    Environment,
}

impl FacingMode {
    /// The facing mode a switch control toggles to.
    pub fn flipped(self) -> Self {
        match self {
            Self::User => Self::Environment,
            Self::Environment => Self::User,
        }
    }
}

/// Metadata for one user-initiated photo moving through the pipeline.
///
/// Exactly one session is active per widget instance; submitting a new capture
/// supersedes the previous one (last-writer-wins). Raw bytes travel alongside
/// this struct rather than inside it so events stay cheap to clone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptureSession {
    /// Unique session identifier.
    pub session_id: String,
    /// Shutter or file picker.
    pub source: CaptureSource,
    /// Declared MIME type of the raw bytes.
    pub mime_type: String,
    /// Raw blob size in bytes.
    pub size_bytes: u64,
    /// Creation timestamp in milliseconds since Unix epoch.
    pub created_at_ms: u64,
}

/// One-time writable upload target plus its eventual public read URL.
///
/// A ticket is never reused across capture sessions; a second PUT against the
/// same ticket is legal only when the first PUT failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadTicket {
    /// Write-once PUT target.
    pub upload_url: String,
    /// Public read URL the inference service is pointed at.
    pub public_url: String,
    /// MIME type the ticket was issued for.
    pub mime_type: String,
    /// Optional ticket expiry in milliseconds since Unix epoch.
    pub expires_at_ms: Option<u64>,
}

/// Terminal result of one inference request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Inference finished synchronously with a result payload.
    Ready {
        /// Analysis payload as returned by the service.
        payload: serde_json::Value,
    },
    /// Inference was accepted but has not completed (HTTP 202).
    ///
    /// The pipeline does not poll; the hint is surfaced for a manual retry.
    Queued {
        /// Optional service-provided hint before asking again.
        retry_after_hint_ms: Option<u64>,
    },
    /// The service reported a terminal failure for this image.
    Failed {
        /// Service-provided reason.
        reason: String,
    },
}

/// Optional user-supplied profile forwarded with the inference request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    /// Self-reported skin type, for example `"combination"`.
    pub skin_type: Option<String>,
    /// Self-reported age range, for example `"25-34"`.
    pub age_range: Option<String>,
    /// Free-form concern tags.
    #[serde(default)]
    pub concerns: Vec<String>,
}

impl UserProfile {
    /// Whether any field is set.
    pub fn is_empty(&self) -> bool {
        self.skin_type.is_none() && self.age_range.is_none() && self.concerns.is_empty()
    }
}

/// Command channel input accepted by the widget runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WidgetCommand {
    /// Acquire the camera stream with a facing preference.
    StartCamera {
        /// Requested facing mode.
        facing: FacingMode,
    },
    /// Stop the current stream and acquire the opposite facing.
    SwitchFacing,
    /// Release the camera stream.
    StopCamera,
    /// Grab one frame from the live stream and run the pipeline on it.
    CapturePhoto {
        /// Optional profile forwarded to inference.
        profile: Option<UserProfile>,
    },
    /// Run the full capture-to-inference pipeline for one image.
    SubmitCapture {
        /// Shutter or file picker.
        source: CaptureSource,
        /// Declared MIME type of `bytes`.
        mime_type: String,
        /// Raw image bytes.
        bytes: Vec<u8>,
        /// Optional profile forwarded to inference.
        profile: Option<UserProfile>,
    },
    /// Probe the analysis service liveness endpoint.
    CheckHealth,
}

/// Event channel output emitted by the widget runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WidgetEvent {
    /// Camera stream acquired.
    CameraStarted {
        /// Facing mode actually acquired.
        facing: FacingMode,
        /// Whether a facing-switch control should be offered (more than one
        /// video input exists).
        can_switch_facing: bool,
    },
    /// Camera could not be acquired; UI falls back to file-picker-only mode.
    CameraUnavailable {
        /// Stable error code.
        code: String,
        /// Human-readable message.
        message: String,
    },
    /// Camera stream released.
    CameraStopped,
    /// Capture controls toggled; disabled for the whole pipeline duration and
    /// re-enabled unconditionally on every terminal path.
    ControlsEnabled {
        /// `true` when the user may submit a new capture.
        enabled: bool,
    },
    /// Pipeline run entered a new phase.
    PipelinePhase {
        /// Run generation the phase belongs to.
        generation: u64,
        /// Phase name as reported to the UI.
        phase: crate::pipeline::UploadPhase,
    },
    /// A retryable call failed and the client is about to back off.
    RetryScheduled {
        /// Attempt number that just failed (1-based).
        attempt: u32,
        /// Sleep before the next attempt, in milliseconds.
        delay_ms: u64,
    },
    /// Upload finished; UI must switch from live view to the static preview.
    PreviewReady {
        /// Run generation the preview belongs to.
        generation: u64,
        /// Public read URL of the uploaded image.
        public_url: String,
    },
    /// Pipeline run reached `Completed` or `Queued`.
    AnalysisCompleted {
        /// Run generation the outcome belongs to.
        generation: u64,
        /// Terminal inference outcome.
        outcome: AnalysisOutcome,
    },
    /// Pipeline run reached `Failed`.
    PipelineFailed {
        /// Run generation the failure belongs to.
        generation: u64,
        /// Stable error code.
        code: String,
        /// User-facing message category (never a raw transport error).
        user_message: crate::normalization::UserMessage,
    },
    /// Result of a `CheckHealth` probe; failure is a warning, not a stop.
    HealthReport {
        /// Whether the service answered the liveness probe.
        healthy: bool,
        /// Optional detail for the warning banner.
        message: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_mode_flips_both_ways() {
        assert_eq!(FacingMode::User.flipped(), FacingMode::Environment);
        assert_eq!(FacingMode::Environment.flipped(), FacingMode::User);
    }

    #[test]
    fn empty_profile_reports_empty() {
        assert!(UserProfile::default().is_empty());
        let profile = UserProfile {
            concerns: vec!["redness".to_owned()],
            ..UserProfile::default()
        };
        assert!(!profile.is_empty());
    }
}
