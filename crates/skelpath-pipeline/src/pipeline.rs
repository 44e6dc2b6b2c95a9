//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process_staged`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use skelpath_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let config = PipelineConfig::default();
//! let pipeline = Pipeline::new(png, config)
//!     .decode()?
//!     .preprocess()?
//!     .skeletonize()
//!     .detect_points()
//!     .trace()
//!     .stitch()
//!     .fit()?;
//!
//! let staged = pipeline.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying all previously computed
//! intermediates. The caller can inspect the current stage's output via
//! accessor methods at any point.
//!
//! # Memory
//!
//! Every stage from [`Skeletonized`] onward retains both the binary mask
//! and the skeleton alongside the growing vector data. Callers that only
//! need the final [`PathSet`](crate::PathSet) should prefer
//! [`crate::process`].

use image::DynamicImage;

use crate::cache::PreprocessCache;
use crate::skeleton::Thinned;
use crate::special::SpecialPoints;
use crate::types::{
    FittedPath, GrayImage, ImageSize, Path, PipelineConfig, PipelineError, Point, StagedResult,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode the source image and advance to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if the source bytes are
    /// empty. Returns [`PipelineError::ImageDecode`] if the image
    /// format is unrecognized or the data is corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        let image = crate::grayscale::decode(&self.source)?;
        tracing::debug!(
            bytes = self.source.len(),
            width = image.width(),
            height = image.height(),
            "decoded image"
        );
        Ok(Decoded::new(image, self.config))
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
///
/// Call [`preprocess`](Self::preprocess) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .preprocess() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    image: DynamicImage,
    size: ImageSize,
}

impl Decoded {
    fn new(image: DynamicImage, config: PipelineConfig) -> Self {
        let size = ImageSize::of(&image);
        Self {
            config,
            image,
            size,
        }
    }

    /// The decoded source image.
    #[must_use]
    pub const fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Source image size.
    #[must_use]
    pub const fn size(&self) -> ImageSize {
        self.size
    }

    /// Binarize and denoise, advancing to [`Preprocessed`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if the config fails
    /// [`PipelineConfig::validate`] or the image has zero area.
    pub fn preprocess(self) -> Result<Preprocessed, PipelineError> {
        self.config.validate()?;
        let binary = crate::preprocess::binarize(
            &self.image,
            self.config.threshold,
            self.config.noise_kernel_size,
        )?;
        Ok(self.into_preprocessed(binary))
    }

    /// Like [`preprocess`](Self::preprocess), reusing a mask from `cache`
    /// when the same image and parameters were binarized before.
    ///
    /// # Errors
    ///
    /// See [`preprocess`](Self::preprocess).
    pub fn preprocess_cached(
        self,
        cache: &mut PreprocessCache,
    ) -> Result<Preprocessed, PipelineError> {
        self.config.validate()?;
        let binary = cache.binarize(
            &self.image,
            self.config.threshold,
            self.config.noise_kernel_size,
        )?;
        Ok(self.into_preprocessed(binary))
    }

    fn into_preprocessed(self, binary: GrayImage) -> Preprocessed {
        tracing::debug!(
            foreground = crate::preprocess::count_foreground(&binary),
            threshold = self.config.threshold,
            kernel = self.config.noise_kernel_size,
            "binarized"
        );
        Preprocessed {
            config: self.config,
            size: self.size,
            binary,
        }
    }
}

// ───────────────────────── Stage 2: Preprocessed ─────────────────────

/// Pipeline state after binarization and denoising.
///
/// Call [`skeletonize`](Self::skeletonize) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .skeletonize() to continue"]
pub struct Preprocessed {
    config: PipelineConfig,
    size: ImageSize,
    binary: GrayImage,
}

impl Preprocessed {
    /// The binary foreground mask.
    #[must_use]
    pub const fn binary(&self) -> &GrayImage {
        &self.binary
    }

    /// Thin the mask to a skeleton.
    ///
    /// Never fails: a run that hits `max_thinning_iterations` is kept
    /// and flagged through [`Skeletonized::converged`].
    pub fn skeletonize(self) -> Skeletonized {
        let thinned = crate::skeleton::skeletonize(&self.binary, self.config.max_thinning_iterations);
        if let Some(bounded) = thinned.bounded() {
            tracing::warn!(%bounded, "using best-effort skeleton");
        }
        tracing::debug!(
            iterations = thinned.iterations,
            converged = thinned.converged,
            "skeletonized"
        );
        Skeletonized {
            config: self.config,
            size: self.size,
            binary: self.binary,
            thinned,
        }
    }
}

// ───────────────────────── Stage 3: Skeletonized ─────────────────────

/// Pipeline state after thinning.
///
/// Call [`detect_points`](Self::detect_points) to advance to the next
/// stage.
#[must_use = "pipeline stages are consumed by advancing; call .detect_points() to continue"]
pub struct Skeletonized {
    config: PipelineConfig,
    size: ImageSize,
    binary: GrayImage,
    thinned: Thinned,
}

impl Skeletonized {
    /// The thinned skeleton mask.
    #[must_use]
    pub const fn skeleton(&self) -> &GrayImage {
        &self.thinned.skeleton
    }

    /// Thinning iterations performed.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.thinned.iterations
    }

    /// Whether thinning reached a fixed point within its cap.
    #[must_use]
    pub const fn converged(&self) -> bool {
        self.thinned.converged
    }

    /// Classify endpoints and junctions, then cluster each set.
    pub fn detect_points(self) -> PointsDetected {
        let raw = crate::special::find_special_points(&self.thinned.skeleton);
        let endpoints =
            crate::cluster::merge_close_points(&raw.endpoints, self.config.endpoint_merge_distance);
        let junctions =
            crate::cluster::merge_close_points(&raw.junctions, self.config.junction_merge_distance);
        tracing::debug!(
            raw_endpoints = raw.endpoints.len(),
            raw_junctions = raw.junctions.len(),
            endpoints = endpoints.len(),
            junctions = junctions.len(),
            "detected special points"
        );
        PointsDetected {
            config: self.config,
            size: self.size,
            binary: self.binary,
            thinned: self.thinned,
            raw,
            endpoints,
            junctions,
        }
    }
}

// ───────────────────────── Stage 4: PointsDetected ───────────────────

/// Pipeline state after special point detection and clustering.
///
/// Call [`trace`](Self::trace) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .trace() to continue"]
pub struct PointsDetected {
    config: PipelineConfig,
    size: ImageSize,
    binary: GrayImage,
    thinned: Thinned,
    raw: SpecialPoints,
    endpoints: Vec<Point>,
    junctions: Vec<Point>,
}

impl PointsDetected {
    /// Endpoints and junctions before clustering.
    #[must_use]
    pub const fn raw(&self) -> &SpecialPoints {
        &self.raw
    }

    /// Clustered endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &[Point] {
        &self.endpoints
    }

    /// Clustered junctions.
    #[must_use]
    pub fn junctions(&self) -> &[Point] {
        &self.junctions
    }

    /// Walk the skeleton into paths.
    pub fn trace(self) -> Traced {
        let traced =
            crate::trace::trace_paths(&self.thinned.skeleton, &self.endpoints, &self.junctions);
        if traced.is_empty() {
            tracing::warn!("no paths traced; result will be empty");
        }
        Traced {
            config: self.config,
            size: self.size,
            binary: self.binary,
            thinned: self.thinned,
            raw: self.raw,
            endpoints: self.endpoints,
            junctions: self.junctions,
            traced,
        }
    }
}

// ───────────────────────── Stage 5: Traced ───────────────────────────

/// Pipeline state after path tracing.
///
/// Call [`stitch`](Self::stitch) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .stitch() to continue"]
pub struct Traced {
    config: PipelineConfig,
    size: ImageSize,
    binary: GrayImage,
    thinned: Thinned,
    raw: SpecialPoints,
    endpoints: Vec<Point>,
    junctions: Vec<Point>,
    traced: Vec<Path>,
}

impl Traced {
    /// Paths as emitted by the tracer.
    #[must_use]
    pub fn traced(&self) -> &[Path] {
        &self.traced
    }

    /// Join fragments whose ends nearly touch.
    pub fn stitch(self) -> Stitched {
        let stitched = crate::stitch::stitch_paths(&self.traced, self.config.stitch_distance);
        Stitched {
            config: self.config,
            size: self.size,
            binary: self.binary,
            thinned: self.thinned,
            raw: self.raw,
            endpoints: self.endpoints,
            junctions: self.junctions,
            traced: self.traced,
            stitched,
        }
    }
}

// ───────────────────────── Stage 6: Stitched ─────────────────────────

/// Pipeline state after stitching.
///
/// Call [`fit`](Self::fit) to advance to the final stage.
#[must_use = "pipeline stages are consumed by advancing; call .fit() to continue"]
pub struct Stitched {
    config: PipelineConfig,
    size: ImageSize,
    binary: GrayImage,
    thinned: Thinned,
    raw: SpecialPoints,
    endpoints: Vec<Point>,
    junctions: Vec<Point>,
    traced: Vec<Path>,
    stitched: Vec<Path>,
}

impl Stitched {
    /// Paths after stitching.
    #[must_use]
    pub fn stitched(&self) -> &[Path] {
        &self.stitched
    }

    /// Fit a line or Bezier to every stitched path, or skip fitting when
    /// `config.fit_curves` is `false`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Unsupported`] if a path has fewer than 2
    /// points. The tracer never emits one.
    pub fn fit(self) -> Result<Fitted, PipelineError> {
        let fitted = if self.config.fit_curves {
            let fits = crate::fit::fit_paths(&self.stitched, &self.config.fit)?;
            let counts = crate::fit::count_fits(&fits);
            tracing::debug!(
                lines = counts.lines,
                curves = counts.curves,
                unfit = counts.unfit,
                "fitted paths"
            );
            Some(fits)
        } else {
            None
        };
        Ok(Fitted {
            size: self.size,
            binary: self.binary,
            thinned: self.thinned,
            raw: self.raw,
            endpoints: self.endpoints,
            junctions: self.junctions,
            traced: self.traced,
            stitched: self.stitched,
            fitted,
        })
    }
}

// ───────────────────────── Stage 7: Fitted ───────────────────────────

/// Pipeline state after fitting, the final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedResult`] containing all intermediates.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Fitted {
    size: ImageSize,
    binary: GrayImage,
    thinned: Thinned,
    raw: SpecialPoints,
    endpoints: Vec<Point>,
    junctions: Vec<Point>,
    traced: Vec<Path>,
    stitched: Vec<Path>,
    fitted: Option<Vec<FittedPath>>,
}

impl Fitted {
    /// One fit per stitched path, or `None` when fitting was disabled.
    #[must_use]
    pub fn fitted(&self) -> Option<&[FittedPath]> {
        self.fitted.as_deref()
    }

    /// Source image size.
    #[must_use]
    pub const fn size(&self) -> ImageSize {
        self.size
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            image_size: self.size,
            binary: self.binary,
            skeleton: self.thinned.skeleton,
            thinning_iterations: self.thinned.iterations,
            thinning_converged: self.thinned.converged,
            raw_endpoints: self.raw.endpoints,
            raw_junctions: self.raw.junctions,
            endpoints: self.endpoints,
            junctions: self.junctions,
            traced: self.traced,
            stitched: self.stitched,
            fitted: self.fitted,
        }
    }
}

/// Incremental skeleton-to-path pipeline.
///
/// Created via [`Pipeline::new`] (from encoded bytes) or
/// [`Pipeline::from_image`] (from an already decoded image). The caller
/// then chains stage methods to advance through the pipeline; each
/// stage method consumes the current state and returns the next, making
/// it a compile-time error to skip stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from source image bytes and config.
    ///
    /// No processing is performed. Call [`.decode()`](Pending::decode)
    /// to begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }

    /// Start from a decoded image, skipping the decode stage.
    pub fn from_image(image: DynamicImage, config: PipelineConfig) -> Decoded {
        Decoded::new(image, config)
    }
}
