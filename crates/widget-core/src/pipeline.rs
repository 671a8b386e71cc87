use serde::{Deserialize, Serialize};

use crate::error::{WidgetError, WidgetErrorCategory};

/// MIME types the pipeline accepts for upload.
pub const ACCEPTED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Client-side soft size ceiling. The server enforces its own, larger hard
/// limit independently; this one exists to pre-filter before network cost.
pub const CLIENT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Phase of one capture-to-inference pipeline run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UploadPhase {
    /// No run in progress.
    Idle,
    /// Checking MIME type and size before any network call.
    Validating,
    /// Recompressing the raw blob.
    Downscaling,
    /// Asking the service for a write-once upload ticket.
    RequestingUploadTarget,
    /// PUT of the compressed bytes to the ticket URL.
    Uploading,
    /// Upload done; UI shows the static preview while inference runs.
    Previewing,
    /// Waiting on the inference endpoint.
    Inferring,
    /// Terminal: inference returned a synchronous result.
    Completed,
    /// Terminal for this run: inference accepted but not finished (202).
    /// Distinct from `Failed` so the caller may retry manually.
    Queued,
    /// Terminal: the run failed.
    Failed,
}

impl UploadPhase {
    /// Whether the phase ends a run (controls must be re-enabled here).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Queued | Self::Failed)
    }
}

/// State machine for the upload pipeline.
///
/// Each run is stamped with a monotonically increasing generation; results
/// arriving for an older generation are discarded by the runtime rather than
/// cancelled in flight.
#[derive(Debug, Clone)]
pub struct UploadPipeline {
    generation: u64,
    phase: UploadPhase,
}

impl Default for UploadPipeline {
    fn default() -> Self {
        Self {
            generation: 0,
            phase: UploadPhase::Idle,
        }
    }
}

impl UploadPipeline {
    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `generation` still identifies the live run.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Start a new run and return its generation.
    ///
    /// Allowed from any phase: a new capture supersedes a running pipeline
    /// (last-writer-wins), its UI-visible progress is abandoned and in-flight
    /// results are later dropped by generation comparison.
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.phase = UploadPhase::Validating;
        self.generation
    }

    /// Validate the declared MIME type and raw size.
    ///
    /// Rejection moves straight to `Failed` without any network call.
    pub fn validate(&mut self, mime_type: &str, size_bytes: u64) -> Result<(), WidgetError> {
        self.expect_phase(UploadPhase::Validating, "validate")?;

        if !is_accepted_mime(mime_type) {
            self.phase = UploadPhase::Failed;
            return Err(WidgetError::new(
                WidgetErrorCategory::Validation,
                "unsupported_mime_type",
                format!("unsupported image type '{mime_type}'; expected JPEG, PNG or WebP"),
            ));
        }

        if size_bytes > CLIENT_MAX_UPLOAD_BYTES {
            self.phase = UploadPhase::Failed;
            return Err(WidgetError::new(
                WidgetErrorCategory::Validation,
                "capture_too_large",
                format!("image is {size_bytes} bytes; the limit is {CLIENT_MAX_UPLOAD_BYTES}"),
            ));
        }

        self.phase = UploadPhase::Downscaling;
        Ok(())
    }

    /// Move to the next phase along the only legal edge.
    pub fn advance(&mut self, next: UploadPhase) -> Result<(), WidgetError> {
        use UploadPhase::*;

        let legal = matches!(
            (self.phase, next),
            (Downscaling, RequestingUploadTarget)
                | (RequestingUploadTarget, Uploading)
                | (Uploading, Previewing)
                | (Previewing, Inferring)
                | (Inferring, Completed)
                | (Inferring, Queued)
        );

        if !legal {
            return Err(WidgetError::invalid_phase(
                self.phase,
                format!("advance to {next:?}"),
            ));
        }

        self.phase = next;
        Ok(())
    }

    /// Terminate the current run as failed. Legal from every phase; the
    /// cleanup path runs it unconditionally.
    pub fn fail(&mut self) {
        self.phase = UploadPhase::Failed;
    }

    fn expect_phase(&self, expected: UploadPhase, action: &str) -> Result<(), WidgetError> {
        if self.phase != expected {
            return Err(WidgetError::invalid_phase(self.phase, action));
        }
        Ok(())
    }
}

fn is_accepted_mime(mime_type: &str) -> bool {
    ACCEPTED_MIME_TYPES
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(mime_type.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline_in_validating() -> UploadPipeline {
        let mut pipeline = UploadPipeline::default();
        pipeline.begin();
        pipeline
    }

    #[test]
    fn rejects_unsupported_mime_before_any_network_phase() {
        let mut pipeline = pipeline_in_validating();
        let err = pipeline
            .validate("image/gif", 1_024)
            .expect_err("gif must be rejected");
        assert_eq!(err.category, WidgetErrorCategory::Validation);
        assert_eq!(err.code, "unsupported_mime_type");
        // Straight to Failed: RequestingUploadTarget is never reached.
        assert_eq!(pipeline.phase(), UploadPhase::Failed);
    }

    #[test]
    fn rejects_oversized_capture() {
        let mut pipeline = pipeline_in_validating();
        let err = pipeline
            .validate("image/jpeg", CLIENT_MAX_UPLOAD_BYTES + 1)
            .expect_err("oversized capture must be rejected");
        assert_eq!(err.code, "capture_too_large");
        assert_eq!(pipeline.phase(), UploadPhase::Failed);
    }

    #[test]
    fn accepts_the_documented_mime_set() {
        for mime in ["image/jpeg", "image/png", "image/webp", "IMAGE/JPEG"] {
            let mut pipeline = pipeline_in_validating();
            pipeline
                .validate(mime, 1_024)
                .unwrap_or_else(|err| panic!("{mime} should validate: {err}"));
            assert_eq!(pipeline.phase(), UploadPhase::Downscaling);
        }
    }

    #[test]
    fn runs_happy_path_to_completed() {
        let mut pipeline = pipeline_in_validating();
        pipeline.validate("image/png", 10_000).expect("validate");
        pipeline
            .advance(UploadPhase::RequestingUploadTarget)
            .expect("request target");
        pipeline.advance(UploadPhase::Uploading).expect("upload");
        pipeline.advance(UploadPhase::Previewing).expect("preview");
        pipeline.advance(UploadPhase::Inferring).expect("infer");
        pipeline.advance(UploadPhase::Completed).expect("complete");
        assert!(pipeline.phase().is_terminal());
    }

    #[test]
    fn queued_is_terminal_but_not_failed() {
        let mut pipeline = pipeline_in_validating();
        pipeline.validate("image/png", 10_000).expect("validate");
        pipeline
            .advance(UploadPhase::RequestingUploadTarget)
            .expect("request target");
        pipeline.advance(UploadPhase::Uploading).expect("upload");
        pipeline.advance(UploadPhase::Previewing).expect("preview");
        pipeline.advance(UploadPhase::Inferring).expect("infer");
        pipeline.advance(UploadPhase::Queued).expect("queued");
        assert!(pipeline.phase().is_terminal());
        assert_ne!(pipeline.phase(), UploadPhase::Failed);
    }

    #[test]
    fn rejects_phase_skips() {
        let mut pipeline = pipeline_in_validating();
        pipeline.validate("image/png", 10_000).expect("validate");
        let err = pipeline
            .advance(UploadPhase::Inferring)
            .expect_err("skipping to Inferring must fail");
        assert_eq!(err.code, "invalid_phase_transition");
    }

    #[test]
    fn new_capture_supersedes_running_pipeline() {
        let mut pipeline = pipeline_in_validating();
        pipeline.validate("image/png", 10_000).expect("validate");
        let old_generation = pipeline.generation();

        let new_generation = pipeline.begin();
        assert_eq!(new_generation, old_generation + 1);
        assert_eq!(pipeline.phase(), UploadPhase::Validating);
        assert!(!pipeline.is_current(old_generation));
        assert!(pipeline.is_current(new_generation));
    }

    #[test]
    fn fail_is_legal_from_any_phase() {
        let mut pipeline = UploadPipeline::default();
        pipeline.fail();
        assert_eq!(pipeline.phase(), UploadPhase::Failed);

        let mut pipeline = pipeline_in_validating();
        pipeline.validate("image/png", 10_000).expect("validate");
        pipeline.fail();
        assert_eq!(pipeline.phase(), UploadPhase::Failed);
    }
}
