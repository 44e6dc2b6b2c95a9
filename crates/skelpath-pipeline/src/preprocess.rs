//! Binarization and morphological denoising.
//!
//! Dark content becomes foreground: a grayscale value strictly below the
//! threshold maps to [`FOREGROUND`], everything else to [`BACKGROUND`].
//! A square opening (erosion then dilation) then removes specks smaller
//! than the kernel.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;

use crate::types::{BACKGROUND, FOREGROUND, PipelineError};

/// Produce a binary foreground mask from a colour or grayscale image.
///
/// `kernel_size` is the side length of the square structuring element
/// used for the opening; it must be odd. A kernel of 1 skips denoising.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if the image has zero area or
/// `kernel_size` is even, zero, or larger than 511.
pub fn binarize(
    image: &DynamicImage,
    threshold: u8,
    kernel_size: u32,
) -> Result<GrayImage, PipelineError> {
    let radius = kernel_radius(kernel_size)?;
    let gray = crate::grayscale::to_gray(image)?;
    let mask = threshold_inverted(&gray, threshold);
    Ok(open_square(&mask, radius))
}

/// Inverted global threshold: `pixel < threshold` becomes foreground.
#[must_use = "returns the binary mask"]
pub fn threshold_inverted(gray: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] < threshold {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Morphological opening with a `(2 * radius + 1)` square element.
///
/// Pixels outside the image never erode the border.
#[must_use = "returns the opened mask"]
pub fn open_square(mask: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    imageproc::morphology::open(mask, Norm::LInf, radius)
}

/// Count foreground pixels in a binary mask.
#[must_use]
pub fn count_foreground(mask: &GrayImage) -> u64 {
    mask.pixels()
        .map(|p| u64::from(u8::from(p.0[0] == FOREGROUND)))
        .sum()
}

fn kernel_radius(kernel_size: u32) -> Result<u8, PipelineError> {
    if kernel_size % 2 == 0 {
        return Err(PipelineError::InvalidInput(format!(
            "noise kernel size must be odd, got {kernel_size}"
        )));
    }
    u8::try_from(kernel_size / 2).map_err(|_| {
        PipelineError::InvalidInput(format!("noise kernel size {kernel_size} is too large"))
    })
}
