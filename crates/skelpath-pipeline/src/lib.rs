//! skelpath-pipeline: Pure skeleton tracing pipeline (sans-IO).
//!
//! Converts raster line art into skeleton paths through:
//! decode -> binarize/denoise -> Zhang-Suen thinning -> endpoint and
//! crosspoint detection -> clustering -> tracing -> stitching ->
//! optional line/Bezier fitting.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns structured data. Filesystem interaction lives
//! in `skelpath-bench`; serialization lives in `skelpath-export`.

pub mod cache;
pub mod cluster;
pub mod diagnostics;
pub mod fit;
pub mod grayscale;
pub mod pipeline;
pub mod preprocess;
pub mod preview;
pub mod skeleton;
pub mod special;
pub mod stitch;
pub mod trace;
pub mod types;

pub use cache::PreprocessCache;
pub use diagnostics::{
    Clock, PipelineDiagnostics, process_staged_with_diagnostics,
    process_staged_with_diagnostics_cached,
};
pub use pipeline::Pipeline;
pub use types::{
    FitConfig, FitKind, FittedPath, ImageSize, LineEndpoints, Path, PathSet, PipelineConfig,
    PipelineError, Point, StagedResult,
};

/// Run the full pipeline and return every intermediate result.
///
/// # Pipeline steps
///
/// 1. Decode image bytes (PNG, JPEG, BMP, WebP)
/// 2. Grayscale, inverted binarization and morphological opening
/// 3. Zhang-Suen thinning
/// 4. Endpoint and crosspoint detection, then clustering
/// 5. Path tracing between special points
/// 6. Stitching of paths whose ends nearly touch
/// 7. Optional line/Bezier fitting (`config.fit_curves`)
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if `image_bytes` is empty,
/// the image has zero area, or `config` fails validation.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
pub fn process_staged(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(image_bytes.to_vec(), config.clone())
        .decode()?
        .preprocess()?
        .skeletonize()
        .detect_points()
        .trace()
        .stitch()
        .fit()?
        .into_result())
}

/// Run the full pipeline and return the [`PathSet`] archive contents.
///
/// An image with no foreground produces an empty `PathSet`, not an
/// error.
///
/// # Errors
///
/// Same as [`process_staged`].
pub fn process(image_bytes: &[u8], config: &PipelineConfig) -> Result<PathSet, PipelineError> {
    process_staged(image_bytes, config).map(StagedResult::into_path_set)
}

/// Run the pipeline on an already decoded image.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if the image has zero area or
/// `config` fails validation.
pub fn process_image(
    image: image::DynamicImage,
    config: &PipelineConfig,
) -> Result<PathSet, PipelineError> {
    Ok(Pipeline::from_image(image, config.clone())
        .preprocess()?
        .skeletonize()
        .detect_points()
        .trace()
        .stitch()
        .fit()?
        .into_result()
        .into_path_set())
}
