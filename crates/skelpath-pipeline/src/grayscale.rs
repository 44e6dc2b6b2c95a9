//! Image decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces either
//! the decoded colour image or a single-channel grayscale image for the
//! binarization stage.

use image::{DynamicImage, GrayImage};

use crate::types::PipelineError;

/// Decode raw image bytes into a [`DynamicImage`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::InvalidInput(
            "input image data is empty".to_string(),
        ));
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Convert a decoded image (colour or grayscale) to 8-bit luminance.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if the image has zero area.
pub fn to_gray(image: &DynamicImage) -> Result<GrayImage, PipelineError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::InvalidInput(format!(
            "image has zero area ({}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(image.to_luma8())
}

/// Decode raw image bytes and convert to grayscale.
///
/// # Errors
///
/// See [`decode`] and [`to_gray`].
pub fn decode_and_grayscale(bytes: &[u8]) -> Result<GrayImage, PipelineError> {
    to_gray(&decode(bytes)?)
}
