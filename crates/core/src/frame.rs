//! Frame Decoding
//!
//! Turns the transport encoding used by the browser client (a base64 string
//! wrapping a JPEG still) into an RGB pixel buffer the recognizer can consume.

use base64::Engine;
use image::RgbImage;

/// Reasons a transported frame could not be turned into pixels.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("frame payload is not a readable image: {0}")]
    Image(#[from] image::ImageError),
    #[error("frame has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

/// Decodes a base64-encoded still image into a 3-channel RGB buffer.
///
/// The image format is sniffed from the payload, so PNG frames are accepted
/// alongside the JPEGs the client normally sends. Alpha and grayscale inputs
/// are converted to RGB.
pub fn decode_frame(encoded: &str) -> Result<RgbImage, DecodeError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
    let image = image::load_from_memory(&bytes)?.to_rgb8();
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::Empty { width, height });
    }
    Ok(image)
}
