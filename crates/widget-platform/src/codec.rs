use image::{codecs::jpeg::JpegEncoder, imageops::FilterType};
use thiserror::Error;

/// Canonical output MIME type: everything re-encodes to JPEG for predictable
/// downstream size.
pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum CodecError {
    /// The source bytes could not be decoded as an image. Fatal for the
    /// capture; retrying a corrupt input cannot help.
    #[error("image decode failed: {0}")]
    Decode(String),
    /// Re-encoding failed.
    #[error("image encode failed: {0}")]
    Encode(String),
}

/// A recompressed image ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    /// JPEG bytes.
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Opaque recompression capability used by the upload pipeline.
pub trait ImageCodec: Send + Sync {
    /// Downsample `input` so its larger dimension is at most `max_dimension`
    /// and re-encode as JPEG at `quality` (0.0–1.0). Aspect ratio is
    /// preserved and images are never upscaled.
    fn recompress(
        &self,
        input: &[u8],
        max_dimension: u32,
        quality: f32,
    ) -> Result<CompressedImage, CodecError>;
}

/// `image`-crate backed codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl ImageCodec for JpegCodec {
    fn recompress(
        &self,
        input: &[u8],
        max_dimension: u32,
        quality: f32,
    ) -> Result<CompressedImage, CodecError> {
        let decoded =
            image::load_from_memory(input).map_err(|err| CodecError::Decode(err.to_string()))?;

        let (src_w, src_h) = (decoded.width(), decoded.height());
        let resized = if src_w.max(src_h) > max_dimension {
            // `resize` keeps aspect ratio by fitting within the bounds.
            decoded.resize(max_dimension, max_dimension, FilterType::Lanczos3)
        } else {
            decoded
        };

        let rgb = resized.to_rgb8();
        let quality_percent = (quality.clamp(0.0, 1.0) * 100.0).round() as u8;

        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut bytes, quality_percent);
        rgb.write_with_encoder(encoder)
            .map_err(|err| CodecError::Encode(err.to_string()))?;

        Ok(CompressedImage {
            bytes,
            width: rgb.width(),
            height: rgb.height(),
        })
    }
}
