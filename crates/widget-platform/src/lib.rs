//! Platform capabilities consumed by the widget runtime.
//!
//! Each capability is a trait with a production implementation and an
//! in-memory/fake counterpart for tests: camera access and stream ownership,
//! image recompression, and the persisted per-device client identity.

/// Camera access and exclusive stream ownership.
pub mod camera;
/// Image recompression to bounded JPEG.
pub mod codec;
/// Stable per-device identity token persistence.
pub mod identity;

pub use camera::{
    CameraBackend, CameraError, CameraFacing, CameraStartInfo, CameraStream, CaptureController,
    FakeCamera, StreamTrack, VideoInput,
};
pub use codec::{CodecError, CompressedImage, ImageCodec, JPEG_MIME, JpegCodec};
pub use identity::{
    FileIdentityStore, IdentityStore, IdentityStoreError, InMemoryIdentityStore,
    load_or_create_identity,
};
