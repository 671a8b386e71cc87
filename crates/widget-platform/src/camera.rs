use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use thiserror::Error;

/// Physical camera orientation on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    /// Front ("selfie") camera.
    Front,
    /// Rear camera.
    Rear,
}

impl CameraFacing {
    pub fn flipped(self) -> Self {
        match self {
            Self::Front => Self::Rear,
            Self::Rear => Self::Front,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// The platform denied camera access.
    #[error("camera access denied")]
    AccessDenied,
    /// No camera device exists for the requested facing.
    #[error("no camera device available")]
    NoDevice,
    /// No stream is active for the requested operation.
    #[error("camera has not been started")]
    NotStarted,
    /// Device/driver-level failure.
    #[error("camera backend failure: {0}")]
    Backend(String),
}

/// One media track of an acquired stream. Stopping it releases the hardware
/// lock it holds.
#[derive(Debug, Clone)]
pub struct StreamTrack {
    live: Arc<AtomicBool>,
}

impl StreamTrack {
    pub fn new() -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn live_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.live)
    }
}

impl Default for StreamTrack {
    fn default() -> Self {
        Self::new()
    }
}

/// An acquired camera stream and the tracks it holds open.
#[derive(Debug)]
pub struct CameraStream {
    facing: CameraFacing,
    tracks: Vec<StreamTrack>,
}

impl CameraStream {
    pub fn new(facing: CameraFacing, tracks: Vec<StreamTrack>) -> Self {
        Self { facing, tracks }
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    /// Stop every track, releasing the hardware lock.
    pub fn stop_tracks(&mut self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn has_live_tracks(&self) -> bool {
        self.tracks.iter().any(StreamTrack::is_live)
    }
}

/// An available video input reported by device enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInput {
    pub device_id: String,
    pub label: String,
    pub facing: CameraFacing,
}

/// Device-level camera access. Implementations talk to real hardware; tests
/// use [`FakeCamera`].
pub trait CameraBackend: Send + Sync {
    /// Acquire a stream for the given facing.
    fn open(&self, facing: CameraFacing) -> Result<CameraStream, CameraError>;

    /// Enumerate available video inputs.
    fn list_video_inputs(&self) -> Result<Vec<VideoInput>, CameraError>;

    /// Grab one frame from an open stream as encoded image bytes.
    fn capture_frame(&self, stream: &CameraStream) -> Result<Vec<u8>, CameraError>;
}

/// Result of starting (or re-acquiring) the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraStartInfo {
    pub facing: CameraFacing,
    /// Whether a facing-switch control should be offered. Hidden when only
    /// one camera exists.
    pub can_switch_facing: bool,
}

/// Exclusive owner of the single active camera stream.
///
/// The stream is the one stateful shared resource of the widget; nothing else
/// may start or stop it. Switching facing stops the previous stream's tracks
/// before acquiring the new one, so two hardware locks are never held at
/// once.
pub struct CaptureController<B: CameraBackend> {
    backend: B,
    active: Option<CameraStream>,
    can_switch: bool,
}

impl<B: CameraBackend> CaptureController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            active: None,
            can_switch: false,
        }
    }

    /// Acquire a stream with the given facing preference.
    ///
    /// Failure is reported, not fatal: the caller falls back to
    /// file-picker-only mode. A previously active stream is stopped first.
    pub fn start(&mut self, facing: CameraFacing) -> Result<CameraStartInfo, CameraError> {
        self.release_active();

        let stream = self.backend.open(facing)?;
        let acquired_facing = stream.facing();
        self.active = Some(stream);

        // Enumerate after each successful start: device sets change when
        // cameras are plugged or permissions shift.
        let inputs = self.backend.list_video_inputs().unwrap_or_default();
        self.can_switch = inputs.len() > 1;

        Ok(CameraStartInfo {
            facing: acquired_facing,
            can_switch_facing: self.can_switch,
        })
    }

    /// Stop the current stream and acquire the opposite facing.
    pub fn switch_facing(&mut self) -> Result<CameraStartInfo, CameraError> {
        let current = self.active.as_ref().ok_or(CameraError::NotStarted)?;
        let next = current.facing().flipped();
        self.start(next)
    }

    /// Grab one frame from the active stream.
    pub fn capture(&self) -> Result<Vec<u8>, CameraError> {
        let stream = self.active.as_ref().ok_or(CameraError::NotStarted)?;
        self.backend.capture_frame(stream)
    }

    /// Release the active stream, if any.
    pub fn stop(&mut self) {
        self.release_active();
        self.can_switch = false;
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn facing(&self) -> Option<CameraFacing> {
        self.active.as_ref().map(CameraStream::facing)
    }

    pub fn can_switch_facing(&self) -> bool {
        self.can_switch
    }

    fn release_active(&mut self) {
        if let Some(mut stream) = self.active.take() {
            stream.stop_tracks();
        }
    }
}

/// Scriptable camera backend for tests.
///
/// Keeps a registry of every track it ever issued so leak checks can assert
/// on the number of still-live hardware locks.
#[derive(Clone, Default)]
pub struct FakeCamera {
    inputs: Vec<VideoInput>,
    frame_bytes: Vec<u8>,
    fail_next_open: Arc<Mutex<Option<CameraError>>>,
    issued_tracks: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl FakeCamera {
    pub fn with_inputs(inputs: Vec<VideoInput>) -> Self {
        Self {
            inputs,
            ..Self::default()
        }
    }

    pub fn with_frame_bytes(mut self, frame_bytes: Vec<u8>) -> Self {
        self.frame_bytes = frame_bytes;
        self
    }

    /// Make the next `open` call fail with `error`.
    pub fn fail_next_open(&self, error: CameraError) {
        *self
            .fail_next_open
            .lock()
            .expect("fake camera lock poisoned") = Some(error);
    }

    /// Number of issued tracks that are still holding their hardware lock.
    pub fn live_track_count(&self) -> usize {
        self.issued_tracks
            .lock()
            .expect("fake camera lock poisoned")
            .iter()
            .filter(|flag| flag.load(Ordering::SeqCst))
            .count()
    }
}

impl CameraBackend for FakeCamera {
    fn open(&self, facing: CameraFacing) -> Result<CameraStream, CameraError> {
        if let Some(error) = self
            .fail_next_open
            .lock()
            .expect("fake camera lock poisoned")
            .take()
        {
            return Err(error);
        }

        let track = StreamTrack::new();
        self.issued_tracks
            .lock()
            .expect("fake camera lock poisoned")
            .push(track.live_flag());

        Ok(CameraStream::new(facing, vec![track]))
    }

    fn list_video_inputs(&self) -> Result<Vec<VideoInput>, CameraError> {
        Ok(self.inputs.clone())
    }

    fn capture_frame(&self, stream: &CameraStream) -> Result<Vec<u8>, CameraError> {
        if !stream.has_live_tracks() {
            return Err(CameraError::Backend("stream tracks are stopped".into()));
        }
        Ok(self.frame_bytes.clone())
    }
}
