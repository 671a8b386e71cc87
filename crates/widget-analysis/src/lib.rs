//! Analysis-service runtime for the widget.
//!
//! Owns the resilient HTTP client (identity header, failure classification,
//! exponential backoff), the upload/inference endpoints, and the command-loop
//! runtime that drives the capture-to-inference pipeline.

use std::{
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;
use widget_core::{
    AnalysisOutcome, CaptureSession, CaptureSource, EventStream, FacingMode, RetryPolicy,
    UploadPhase, UploadPipeline, UploadTicket, UserProfile, WidgetChannelError, WidgetChannels,
    WidgetCommand, WidgetError, WidgetErrorCategory, WidgetEvent, classify_http_status,
    rate_limit_wait,
};
use widget_platform::{
    CameraBackend, CameraError, CameraFacing, CaptureController, CodecError, ImageCodec, JPEG_MIME,
};

/// Header carrying the stable per-device identity token, used by the service
/// for per-identity rate limiting.
pub const IDENTITY_HEADER: &str = "x-lumera-client-id";

/// Header carrying the absolute rate-limit reset time (Unix seconds).
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 1_280;
const DEFAULT_JPEG_QUALITY: f32 = 0.85;

/// Callback invoked with the failed attempt number and upcoming backoff delay
/// before the client sleeps.
pub type RetryNotifier = Arc<dyn Fn(u32, Duration) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct AnalysisBackendConfig {
    /// Analysis service base URL, for example `https://api.lumera.example`.
    pub base_url: String,
    /// Stable per-device identity token (see `widget_platform::identity`).
    pub identity_token: String,
    /// Attempt budget per resilient call chain.
    pub max_attempts: u32,
    /// Larger-dimension bound applied during recompression.
    pub max_image_dimension: u32,
    /// JPEG quality used during recompression (0.0–1.0).
    pub jpeg_quality: f32,
}

impl AnalysisBackendConfig {
    pub fn new(base_url: impl Into<String>, identity_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            identity_token: identity_token.into(),
            max_attempts: widget_core::DEFAULT_MAX_ATTEMPTS,
            max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlRequest<'a> {
    mime_type: &'a str,
    metadata: &'a Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlResponse {
    upload_url: String,
    public_url: String,
    expires_at_ms: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InferRequest<'a> {
    image_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_data: Option<&'a UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Value>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct QueuedBody {
    retry_after_ms: Option<u64>,
}

/// HTTP backend for the analysis service.
pub struct AnalysisBackend {
    http: reqwest::Client,
    base: Url,
    identity: String,
    policy: RetryPolicy,
    max_attempts: u32,
    max_image_dimension: u32,
    jpeg_quality: f32,
    retry_notifier: RetryNotifier,
}

impl AnalysisBackend {
    pub fn new(config: AnalysisBackendConfig) -> Result<Self, WidgetError> {
        let base = parse_base_url(&config.base_url)?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(map_client_build_error)?;

        Ok(Self {
            http,
            base,
            identity: config.identity_token,
            policy: RetryPolicy::default(),
            max_attempts: config.max_attempts.max(1),
            max_image_dimension: config.max_image_dimension.max(1),
            jpeg_quality: config.jpeg_quality,
            retry_notifier: Arc::new(|_, _| {}),
        })
    }

    /// Replace the retry notifier, which the runtime points at the UI event
    /// channel so users see "retrying (attempt n)…" before each backoff sleep.
    pub fn with_retry_notifier(mut self, notifier: RetryNotifier) -> Self {
        self.retry_notifier = notifier;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn max_image_dimension(&self) -> u32 {
        self.max_image_dimension
    }

    pub fn jpeg_quality(&self) -> f32 {
        self.jpeg_quality
    }

    /// Ask the service for a write-once upload ticket.
    pub async fn request_upload_ticket(
        &self,
        mime_type: &str,
        metadata: &Value,
    ) -> Result<UploadTicket, WidgetError> {
        let url = self.endpoint("upload-url")?;
        let body = UploadUrlRequest {
            mime_type,
            metadata,
        };

        let response = self
            .execute(self.max_attempts, || self.http.post(url.clone()).json(&body))
            .await?;

        let parsed = response
            .json::<UploadUrlResponse>()
            .await
            .map_err(map_payload_error)?;

        Ok(UploadTicket {
            upload_url: parsed.upload_url,
            public_url: parsed.public_url,
            mime_type: mime_type.to_owned(),
            expires_at_ms: parsed.expires_at_ms,
        })
    }

    /// PUT the compressed bytes to the ticket's write-once URL.
    ///
    /// Success is judged by response status alone. Retrying a PUT against the
    /// same ticket is legal because it only happens after a failed attempt.
    pub async fn upload_blob(
        &self,
        ticket: &UploadTicket,
        bytes: Vec<u8>,
    ) -> Result<(), WidgetError> {
        let url = Url::parse(&ticket.upload_url).map_err(|err| {
            WidgetError::new(
                WidgetErrorCategory::Internal,
                "invalid_upload_url",
                format!("upload ticket carries an unusable URL: {err}"),
            )
        })?;

        self.execute(self.max_attempts, || {
            self.http
                .put(url.clone())
                .header("content-type", ticket.mime_type.clone())
                .body(bytes.clone())
        })
        .await?;

        Ok(())
    }

    /// Invoke the inference endpoint for an uploaded image.
    pub async fn request_inference(
        &self,
        image_url: &str,
        profile: Option<&UserProfile>,
        metadata: Option<&Value>,
    ) -> Result<AnalysisOutcome, WidgetError> {
        let url = self.endpoint("infer")?;
        let body = InferRequest {
            image_url,
            user_data: profile,
            metadata,
        };

        let response = self
            .execute(self.max_attempts, || self.http.post(url.clone()).json(&body))
            .await?;

        if response.status() == reqwest::StatusCode::ACCEPTED {
            // Queued responses may carry no body at all.
            let queued = response.json::<QueuedBody>().await.unwrap_or_default();
            return Ok(AnalysisOutcome::Queued {
                retry_after_hint_ms: queued.retry_after_ms,
            });
        }

        let payload = response.json::<Value>().await.map_err(map_payload_error)?;
        if let Some(reason) = payload.get("error").and_then(Value::as_str) {
            return Ok(AnalysisOutcome::Failed {
                reason: reason.to_owned(),
            });
        }

        Ok(AnalysisOutcome::Ready { payload })
    }

    /// Probe the liveness endpoint. Single attempt; failure is a warning for
    /// the caller, never a hard stop.
    pub async fn health(&self) -> Result<(), WidgetError> {
        let url = self.endpoint("health")?;
        self.execute(1, || self.http.get(url.clone())).await?;
        Ok(())
    }

    async fn execute<F>(
        &self,
        max_attempts: u32,
        build: F,
    ) -> Result<reqwest::Response, WidgetError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        call_with_retry(self.policy, max_attempts, &self.retry_notifier, |_| {
            let request = build().header(IDENTITY_HEADER, self.identity.as_str());
            async move {
                let response = request.send().await.map_err(map_transport_error)?;
                ensure_success(response).await
            }
        })
        .await
    }

    fn endpoint(&self, path: &str) -> Result<Url, WidgetError> {
        self.base.join(path).map_err(|err| {
            WidgetError::new(
                WidgetErrorCategory::Internal,
                "invalid_endpoint",
                format!("cannot build endpoint '{path}': {err}"),
            )
        })
    }
}

/// Run `op` up to `max_attempts` times with exponential backoff.
///
/// Non-retryable failures (rate limit, auth, validation, decode) short-circuit
/// immediately; exhausting the budget re-surfaces the last error tagged as
/// exhausted. `notify` fires with the failed attempt number before each sleep.
pub async fn call_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    max_attempts: u32,
    notify: &RetryNotifier,
    mut op: F,
) -> Result<T, WidgetError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, WidgetError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !err.category.is_retryable() => return Err(err),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(err.after_exhausted_retries());
                }

                let delay = policy.delay_after_attempt(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
                (notify)(attempt, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, WidgetError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let reset_epoch_secs = response
        .headers()
        .get(RATE_LIMIT_RESET_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    Err(error_from_response_parts(
        status,
        &body,
        reset_epoch_secs,
        now_epoch_secs(),
    ))
}

/// Build the typed error for a non-2xx response.
pub fn error_from_response_parts(
    status: u16,
    body: &str,
    reset_epoch_secs: Option<u64>,
    now_epoch_secs: u64,
) -> WidgetError {
    let category = classify_http_status(status);
    let mut error = WidgetError::new(category, "api_error", server_message(body, status));

    if category == WidgetErrorCategory::RateLimited {
        error = error.with_retry_after(rate_limit_wait(reset_epoch_secs, now_epoch_secs));
    }

    error
}

/// Extract the server's own message from an error body when present.
fn server_message(body: &str, status: u16) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message"] {
            if let Some(message) = parsed.get(key).and_then(Value::as_str) {
                return message.to_owned();
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.to_owned()
    }
}

#[derive(Clone)]
pub struct WidgetRuntimeHandle {
    channels: WidgetChannels,
    online: Arc<AtomicBool>,
}

impl WidgetRuntimeHandle {
    pub async fn send(&self, command: WidgetCommand) -> Result<(), WidgetChannelError> {
        self.channels.send_command(command).await
    }

    pub fn subscribe(&self) -> EventStream {
        self.channels.subscribe()
    }

    /// Feed the platform connectivity signal; it shapes the user-facing
    /// message for network failures ("offline" vs "server unreachable").
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

/// Spawn the widget runtime and return its command/event handle.
pub fn spawn_runtime<Cam, C>(
    backend: AnalysisBackend,
    camera: Cam,
    codec: C,
) -> WidgetRuntimeHandle
where
    Cam: CameraBackend + 'static,
    C: ImageCodec + 'static,
{
    let (channels, command_rx) = WidgetChannels::new(128, 512);
    let online = Arc::new(AtomicBool::new(true));

    let retry_events = channels.event_sender();
    let backend = backend.with_retry_notifier(Arc::new(move |attempt, delay| {
        let _ = retry_events.send(WidgetEvent::RetryScheduled {
            attempt,
            delay_ms: delay.as_millis() as u64,
        });
    }));

    let runtime = WidgetRuntime::new(
        channels.clone(),
        command_rx,
        backend,
        camera,
        codec,
        Arc::clone(&online),
    );
    tokio::spawn(async move {
        runtime.run().await;
    });

    WidgetRuntimeHandle { channels, online }
}

struct WidgetRuntime<Cam: CameraBackend, C: ImageCodec> {
    channels: WidgetChannels,
    command_rx: mpsc::Receiver<WidgetCommand>,
    pipeline: Arc<Mutex<UploadPipeline>>,
    camera: CaptureController<Cam>,
    codec: Arc<C>,
    backend: Arc<AnalysisBackend>,
    online: Arc<AtomicBool>,
}

impl<Cam, C> WidgetRuntime<Cam, C>
where
    Cam: CameraBackend + 'static,
    C: ImageCodec + 'static,
{
    fn new(
        channels: WidgetChannels,
        command_rx: mpsc::Receiver<WidgetCommand>,
        backend: AnalysisBackend,
        camera: Cam,
        codec: C,
        online: Arc<AtomicBool>,
    ) -> Self {
        Self {
            channels,
            command_rx,
            pipeline: Arc::new(Mutex::new(UploadPipeline::default())),
            camera: CaptureController::new(camera),
            codec: Arc::new(codec),
            backend: Arc::new(backend),
            online,
        }
    }

    async fn run(mut self) {
        while let Some(command) = self.command_rx.recv().await {
            self.handle_command(command).await;
        }
    }

    async fn handle_command(&mut self, command: WidgetCommand) {
        match command {
            WidgetCommand::StartCamera { facing } => self.handle_start_camera(facing),
            WidgetCommand::SwitchFacing => self.handle_switch_facing(),
            WidgetCommand::StopCamera => {
                self.camera.stop();
                self.channels.emit(WidgetEvent::CameraStopped);
            }
            WidgetCommand::CapturePhoto { profile } => self.handle_capture_photo(profile),
            WidgetCommand::SubmitCapture {
                source,
                mime_type,
                bytes,
                profile,
            } => self.submit(source, mime_type, bytes, profile),
            WidgetCommand::CheckHealth => self.handle_check_health().await,
        }
    }

    fn handle_start_camera(&mut self, facing: FacingMode) {
        match self.camera.start(camera_facing(facing)) {
            Ok(info) => self.channels.emit(WidgetEvent::CameraStarted {
                facing: facing_mode(info.facing),
                can_switch_facing: info.can_switch_facing,
            }),
            Err(err) => self.emit_camera_unavailable(err),
        }
    }

    fn handle_switch_facing(&mut self) {
        match self.camera.switch_facing() {
            Ok(info) => self.channels.emit(WidgetEvent::CameraStarted {
                facing: facing_mode(info.facing),
                can_switch_facing: info.can_switch_facing,
            }),
            Err(err) => self.emit_camera_unavailable(err),
        }
    }

    fn handle_capture_photo(&mut self, profile: Option<UserProfile>) {
        match self.camera.capture() {
            Ok(bytes) => self.submit(CaptureSource::Camera, JPEG_MIME.to_owned(), bytes, profile),
            Err(err) => self.emit_camera_unavailable(err),
        }
    }

    async fn handle_check_health(&self) {
        match self.backend.health().await {
            Ok(()) => self.channels.emit(WidgetEvent::HealthReport {
                healthy: true,
                message: None,
            }),
            Err(err) => {
                warn!(error = %err, "analysis health probe failed");
                self.channels.emit(WidgetEvent::HealthReport {
                    healthy: false,
                    message: Some(err.message),
                });
            }
        }
    }

    /// Start a pipeline run for one capture.
    ///
    /// Validation happens synchronously so a rejected capture never reaches
    /// the network; the rest runs as a task so a newer capture can supersede
    /// it (its late results are dropped by generation comparison).
    fn submit(
        &mut self,
        source: CaptureSource,
        mime_type: String,
        bytes: Vec<u8>,
        profile: Option<UserProfile>,
    ) {
        let session = CaptureSession {
            session_id: Uuid::new_v4().to_string(),
            source,
            mime_type: mime_type.clone(),
            size_bytes: bytes.len() as u64,
            created_at_ms: now_millis(),
        };

        let generation = self
            .pipeline
            .lock()
            .expect("pipeline lock poisoned")
            .begin();

        self.channels
            .emit(WidgetEvent::ControlsEnabled { enabled: false });
        self.channels.emit(WidgetEvent::PipelinePhase {
            generation,
            phase: UploadPhase::Validating,
        });

        let validation = self
            .pipeline
            .lock()
            .expect("pipeline lock poisoned")
            .validate(&mime_type, session.size_bytes);
        if let Err(err) = validation {
            finish_run(
                &self.pipeline,
                &self.channels,
                &self.online,
                generation,
                Err(err),
            );
            return;
        }

        self.channels.emit(WidgetEvent::PipelinePhase {
            generation,
            phase: UploadPhase::Downscaling,
        });

        let pipeline = Arc::clone(&self.pipeline);
        let channels = self.channels.clone();
        let codec = Arc::clone(&self.codec);
        let backend = Arc::clone(&self.backend);
        let online = Arc::clone(&self.online);
        tokio::spawn(async move {
            run_pipeline_task(
                pipeline, channels, codec, backend, online, generation, session, bytes, profile,
            )
            .await;
        });
    }

    fn emit_camera_unavailable(&self, err: CameraError) {
        warn!(error = %err, "camera unavailable");
        self.channels.emit(WidgetEvent::CameraUnavailable {
            code: camera_error_code(&err).to_owned(),
            message: err.to_string(),
        });
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_pipeline_task<C: ImageCodec>(
    pipeline: Arc<Mutex<UploadPipeline>>,
    channels: WidgetChannels,
    codec: Arc<C>,
    backend: Arc<AnalysisBackend>,
    online: Arc<AtomicBool>,
    generation: u64,
    session: CaptureSession,
    bytes: Vec<u8>,
    profile: Option<UserProfile>,
) {
    let compressed = match codec.recompress(
        &bytes,
        backend.max_image_dimension(),
        backend.jpeg_quality(),
    ) {
        Ok(compressed) => compressed,
        Err(err) => {
            finish_run(
                &pipeline,
                &channels,
                &online,
                generation,
                Err(map_codec_error(err)),
            );
            return;
        }
    };

    if !advance_if_current(
        &pipeline,
        &channels,
        &online,
        generation,
        UploadPhase::RequestingUploadTarget,
    ) {
        return;
    }

    let metadata = json!({
        "sessionId": session.session_id,
        "source": session.source,
        "originalMimeType": session.mime_type,
        "width": compressed.width,
        "height": compressed.height,
    });

    let ticket = match backend.request_upload_ticket(JPEG_MIME, &metadata).await {
        Ok(ticket) => ticket,
        Err(err) => {
            finish_run(&pipeline, &channels, &online, generation, Err(err));
            return;
        }
    };

    if !advance_if_current(
        &pipeline,
        &channels,
        &online,
        generation,
        UploadPhase::Uploading,
    ) {
        return;
    }

    if let Err(err) = backend.upload_blob(&ticket, compressed.bytes).await {
        finish_run(&pipeline, &channels, &online, generation, Err(err));
        return;
    }

    if !advance_if_current(
        &pipeline,
        &channels,
        &online,
        generation,
        UploadPhase::Previewing,
    ) {
        return;
    }
    channels.emit(WidgetEvent::PreviewReady {
        generation,
        public_url: ticket.public_url.clone(),
    });

    if !advance_if_current(
        &pipeline,
        &channels,
        &online,
        generation,
        UploadPhase::Inferring,
    ) {
        return;
    }

    let result = backend
        .request_inference(&ticket.public_url, profile.as_ref(), Some(&metadata))
        .await;
    finish_run(&pipeline, &channels, &online, generation, result);
}

/// Advance the live run to `next` and announce the phase.
///
/// Returns `false` when the run was superseded (silently) or the transition
/// was illegal (terminal failure emitted).
fn advance_if_current(
    pipeline: &Mutex<UploadPipeline>,
    channels: &WidgetChannels,
    online: &AtomicBool,
    generation: u64,
    next: UploadPhase,
) -> bool {
    let transition = {
        let mut guard = pipeline.lock().expect("pipeline lock poisoned");
        if !guard.is_current(generation) {
            return false;
        }
        guard.advance(next)
    };

    match transition {
        Ok(()) => {
            channels.emit(WidgetEvent::PipelinePhase {
                generation,
                phase: next,
            });
            true
        }
        Err(err) => {
            finish_run(pipeline, channels, online, generation, Err(err));
            false
        }
    }
}

/// Terminate a run and emit its UI events, unless it has been superseded.
///
/// Controls re-enable unconditionally for the live run on every terminal
/// path; a superseded run emits nothing because the newer run owns the
/// controls state.
fn finish_run(
    pipeline: &Mutex<UploadPipeline>,
    channels: &WidgetChannels,
    online: &AtomicBool,
    generation: u64,
    result: Result<AnalysisOutcome, WidgetError>,
) {
    {
        let mut guard = pipeline.lock().expect("pipeline lock poisoned");
        if !guard.is_current(generation) {
            debug!(generation, "dropping result for superseded pipeline run");
            return;
        }
        match &result {
            Ok(AnalysisOutcome::Queued { .. }) => {
                let _ = guard.advance(UploadPhase::Queued);
            }
            Ok(AnalysisOutcome::Ready { .. }) => {
                let _ = guard.advance(UploadPhase::Completed);
            }
            Ok(AnalysisOutcome::Failed { .. }) | Err(_) => guard.fail(),
        }
    }

    channels.emit(widget_core::terminal_event(
        generation,
        result,
        online.load(Ordering::SeqCst),
    ));
    channels.emit(WidgetEvent::ControlsEnabled { enabled: true });
}

fn camera_facing(mode: FacingMode) -> CameraFacing {
    match mode {
        FacingMode::User => CameraFacing::Front,
        FacingMode::Environment => CameraFacing::Rear,
    }
}

fn facing_mode(facing: CameraFacing) -> FacingMode {
    match facing {
        CameraFacing::Front => FacingMode::User,
        CameraFacing::Rear => FacingMode::Environment,
    }
}

fn camera_error_code(err: &CameraError) -> &'static str {
    match err {
        CameraError::AccessDenied => "camera_access_denied",
        CameraError::NoDevice => "camera_not_found",
        CameraError::NotStarted => "camera_not_started",
        CameraError::Backend(_) => "camera_backend_error",
    }
}

fn map_codec_error(err: CodecError) -> WidgetError {
    match err {
        CodecError::Decode(message) => WidgetError::new(
            WidgetErrorCategory::Decode,
            "decode_error",
            format!("image could not be decoded: {message}"),
        ),
        CodecError::Encode(message) => WidgetError::new(
            WidgetErrorCategory::Internal,
            "encode_error",
            format!("image re-encode failed: {message}"),
        ),
    }
}

/// Parse and normalize the service base URL. A trailing slash is enforced so
/// `Url::join` appends endpoint segments instead of replacing the last one.
fn parse_base_url(raw: &str) -> Result<Url, WidgetError> {
    let trimmed = raw.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/")
    };

    Url::parse(&normalized).map_err(|err| {
        WidgetError::new(
            WidgetErrorCategory::Validation,
            "invalid_base_url",
            format!("invalid analysis base URL '{raw}': {err}"),
        )
    })
}

fn map_transport_error(err: reqwest::Error) -> WidgetError {
    WidgetError::new(
        WidgetErrorCategory::Network,
        "request_failed",
        err.to_string(),
    )
}

fn map_client_build_error(err: reqwest::Error) -> WidgetError {
    WidgetError::new(
        WidgetErrorCategory::Internal,
        "client_build_error",
        err.to_string(),
    )
}

fn map_payload_error(err: reqwest::Error) -> WidgetError {
    WidgetError::new(
        WidgetErrorCategory::Internal,
        "payload_invalid",
        format!("unexpected response payload: {err}"),
    )
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
