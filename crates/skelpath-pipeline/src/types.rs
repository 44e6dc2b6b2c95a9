//! Shared types for the skelpath pipeline.

use serde::{Deserialize, Serialize};

/// Re-export the raster types so downstream crates can reference
/// intermediate masks and previews without depending on `image` directly.
pub use image::{DynamicImage, GrayImage, RgbImage};

/// Pixel value of a foreground pixel in a binary mask.
pub const FOREGROUND: u8 = 255;

/// Pixel value of a background pixel in a binary mask.
pub const BACKGROUND: u8 = 0;

/// An integer pixel coordinate.
///
/// Serialized as a two-element `[x, y]` array, matching the path
/// archive format. Deserializing anything other than exactly two
/// integers fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Point {
    /// Column (pixels from left edge).
    pub x: i32,
    /// Row (pixels from top edge).
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Whether `other` is one of the 8 neighbours of `self`.
    ///
    /// A point is not adjacent to itself.
    #[must_use]
    pub const fn is_adjacent(self, other: Self) -> bool {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        dx <= 1 && dy <= 1 && (dx != 0 || dy != 0)
    }

    /// Whether the point lies inside a `width` x `height` grid.
    #[must_use]
    pub fn in_bounds(self, width: u32, height: u32) -> bool {
        u32::try_from(self.x).is_ok_and(|x| x < width)
            && u32::try_from(self.y).is_ok_and(|y| y < height)
    }

    /// Raster-order sort key: row first, then column.
    #[must_use]
    pub const fn raster_key(self) -> (i32, i32) {
        (self.y, self.x)
    }

    /// Round a floating-point coordinate pair to the nearest pixel.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self::new(x.round() as i32, y.round() as i32)
    }

    /// The point as a floating-point pair.
    #[must_use]
    pub fn to_f64(self) -> (f64, f64) {
        (f64::from(self.x), f64::from(self.y))
    }
}

impl From<[i32; 2]> for Point {
    fn from([x, y]: [i32; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<Point> for [i32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// An ordered sequence of pixel coordinates tracing one stroke.
///
/// Paths produced by the tracer have at least two points, no repeated
/// adjacent points, and consecutive points that are 8-adjacent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<Point>);

impl Path {
    /// Create a new path from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the path has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the path.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<Point> {
        self.0.first().copied()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<Point> {
        self.0.last().copied()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the path and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// The same points in reverse order.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }

    /// Total polyline length: the sum of distances between consecutive
    /// points.
    #[must_use]
    pub fn arc_length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Straight-line distance between the first and last point.
    #[must_use]
    pub fn chord_length(&self) -> f64 {
        match (self.first(), self.last()) {
            (Some(a), Some(b)) => a.distance(b),
            _ => 0.0,
        }
    }

    /// Chord length divided by arc length: 1.0 for a perfectly straight
    /// path. `None` when the arc length is zero.
    #[must_use]
    pub fn straightness(&self) -> Option<f64> {
        let arc = self.arc_length();
        if arc > 0.0 {
            Some(self.chord_length() / arc)
        } else {
            None
        }
    }
}

impl From<Vec<Point>> for Path {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

/// Which geometric primitive a [`FittedPath`] is persisted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitKind {
    /// Straight line segment.
    Line,
    /// Cubic Bezier curve (or an unfit passthrough path).
    Bezier,
}

/// The result of fitting one [`Path`].
///
/// `fitted_paths[i]` always corresponds to `paths[i]` in a [`PathSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FittedPathRecord", into = "FittedPathRecord")]
pub enum FittedPath {
    /// A straight segment from `p0` to `p1`.
    Line {
        /// Start of the segment.
        p0: Point,
        /// End of the segment.
        p1: Point,
    },
    /// A cubic Bezier curve with control points `p0..p3`.
    Bezier {
        /// Start point (exactly the path's first point).
        p0: Point,
        /// First tangential control point.
        p1: Point,
        /// Second tangential control point.
        p2: Point,
        /// End point (exactly the path's last point).
        p3: Point,
    },
    /// A curved path too short for a cubic fit, passed through as-is.
    ///
    /// Persisted with `"type": "bezier"` and the path's own points.
    Unfit(Path),
}

impl FittedPath {
    /// The persisted type tag.
    #[must_use]
    pub const fn kind(&self) -> FitKind {
        match self {
            Self::Line { .. } => FitKind::Line,
            Self::Bezier { .. } | Self::Unfit(_) => FitKind::Bezier,
        }
    }

    /// The control points (or passthrough points) in persisted order.
    #[must_use]
    pub fn points(&self) -> Vec<Point> {
        match self {
            Self::Line { p0, p1 } => vec![*p0, *p1],
            Self::Bezier { p0, p1, p2, p3 } => vec![*p0, *p1, *p2, *p3],
            Self::Unfit(path) => path.points().to_vec(),
        }
    }

    /// Sample the fitted geometry as a floating-point polyline.
    ///
    /// Beziers are evaluated at `samples` evenly spaced parameter values
    /// in `[0, 1]` (at least 2). Lines yield their two endpoints and
    /// unfit paths yield their own points.
    #[must_use]
    pub fn sample(&self, samples: usize) -> Vec<(f64, f64)> {
        match self {
            Self::Line { p0, p1 } => vec![p0.to_f64(), p1.to_f64()],
            Self::Bezier { p0, p1, p2, p3 } => {
                let control = [p0.to_f64(), p1.to_f64(), p2.to_f64(), p3.to_f64()];
                let n = samples.max(2);
                #[allow(clippy::cast_precision_loss)]
                let last = (n - 1) as f64;
                (0..n)
                    .map(|i| {
                        #[allow(clippy::cast_precision_loss)]
                        let t = i as f64 / last;
                        crate::fit::cubic_point(control, t)
                    })
                    .collect()
            }
            Self::Unfit(path) => path.points().iter().map(|p| p.to_f64()).collect(),
        }
    }
}

/// Wire representation of a [`FittedPath`]: `{"type": ..., "points": [...]}`.
#[derive(Serialize, Deserialize)]
struct FittedPathRecord {
    #[serde(rename = "type")]
    kind: FitKind,
    points: Vec<Point>,
}

impl From<FittedPath> for FittedPathRecord {
    fn from(fitted: FittedPath) -> Self {
        Self {
            kind: fitted.kind(),
            points: fitted.points(),
        }
    }
}

impl TryFrom<FittedPathRecord> for FittedPath {
    type Error = String;

    fn try_from(record: FittedPathRecord) -> Result<Self, Self::Error> {
        match (record.kind, record.points.as_slice()) {
            (FitKind::Line, &[p0, p1]) => Ok(Self::Line { p0, p1 }),
            (FitKind::Bezier, &[p0, p1, p2, p3]) => Ok(Self::Bezier { p0, p1, p2, p3 }),
            (FitKind::Bezier, points) if points.len() >= 2 => {
                Ok(Self::Unfit(Path::new(points.to_vec())))
            }
            (kind, points) => Err(format!(
                "fitted path of type {kind:?} cannot have {} points",
                points.len()
            )),
        }
    }
}

/// Source image size, persisted as `[height, width, channels]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 3]", into = "[u32; 3]")]
pub struct ImageSize {
    /// Height in pixels.
    pub height: u32,
    /// Width in pixels.
    pub width: u32,
    /// Colour channels of the source image.
    pub channels: u32,
}

impl ImageSize {
    /// Size of a decoded image.
    #[must_use]
    pub fn of(image: &DynamicImage) -> Self {
        Self {
            height: image.height(),
            width: image.width(),
            channels: u32::from(image.color().channel_count()),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl From<[u32; 3]> for ImageSize {
    fn from([height, width, channels]: [u32; 3]) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }
}

impl From<ImageSize> for [u32; 3] {
    fn from(size: ImageSize) -> Self {
        [size.height, size.width, size.channels]
    }
}

/// Everything one pipeline run produces, in the persisted archive shape.
///
/// Downstream consumers receive this as-is; any scaling or
/// screen-coordinate mapping is theirs to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSet {
    /// Size of the source image.
    pub image_size: ImageSize,
    /// Traced (and stitched) paths.
    pub paths: Vec<Path>,
    /// Clustered stroke endpoints.
    pub endpoints: Vec<Point>,
    /// Clustered junctions (persisted as `crosspoints`).
    #[serde(rename = "crosspoints")]
    pub junctions: Vec<Point>,
    /// One fit per path, when fitting ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fitted_paths: Option<Vec<FittedPath>>,
}

impl PathSet {
    /// Check the structural invariants of a path set.
    ///
    /// Every path must have at least two points, every path point,
    /// endpoint and junction must lie inside `image_size`, and
    /// `fitted_paths` (when present) must pair one-to-one with `paths`.
    /// Fitted control points are not bounds-checked: Bezier handles may
    /// legitimately leave the image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] describing the first
    /// violation found.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let ImageSize { width, height, .. } = self.image_size;
        let check = |p: Point, what: &str| {
            if p.in_bounds(width, height) {
                Ok(())
            } else {
                Err(PipelineError::InvalidInput(format!(
                    "{what} ({}, {}) outside {width}x{height} image",
                    p.x, p.y
                )))
            }
        };

        for (i, path) in self.paths.iter().enumerate() {
            if path.len() < 2 {
                return Err(PipelineError::InvalidInput(format!(
                    "path {i} has {} points, need at least 2",
                    path.len()
                )));
            }
            for &p in path.points() {
                check(p, "path point")?;
            }
        }
        for &p in &self.endpoints {
            check(p, "endpoint")?;
        }
        for &p in &self.junctions {
            check(p, "crosspoint")?;
        }
        if let Some(fitted) = &self.fitted_paths
            && fitted.len() != self.paths.len()
        {
            return Err(PipelineError::InvalidInput(format!(
                "{} fitted paths for {} paths",
                fitted.len(),
                self.paths.len()
            )));
        }
        Ok(())
    }

    /// Total number of points across all paths.
    #[must_use]
    pub fn total_points(&self) -> usize {
        self.paths.iter().map(Path::len).sum()
    }
}

/// How the two endpoints of a fitted line are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineEndpoints {
    /// Evaluate the fitted line at parameters 0 and 1 from its centroid
    /// along its unit direction.
    #[default]
    UnitStep,
    /// Project the path's first and last points onto the fitted line.
    Projected,
}

/// Parameters for classifying and fitting paths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// Straightness ratio above which a path is fitted as a line.
    pub line_threshold: f64,

    /// Fraction of arc length used to place Bezier handles.
    pub control_dist_factor: f64,

    /// Placement of fitted line endpoints.
    #[serde(default)]
    pub line_endpoints: LineEndpoints,
}

impl FitConfig {
    /// Default straightness threshold.
    pub const DEFAULT_LINE_THRESHOLD: f64 = 0.98;

    /// Default Bezier handle factor.
    pub const DEFAULT_CONTROL_DIST_FACTOR: f64 = 0.25;
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            line_threshold: Self::DEFAULT_LINE_THRESHOLD,
            control_dist_factor: Self::DEFAULT_CONTROL_DIST_FACTOR,
            line_endpoints: LineEndpoints::default(),
        }
    }
}

/// Configuration for the image-to-path pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Grayscale values strictly below this become foreground.
    pub threshold: u8,

    /// Side length of the square opening kernel. Must be odd; 1 disables
    /// denoising.
    pub noise_kernel_size: u32,

    /// Liveness bound on thinning iterations.
    pub max_thinning_iterations: usize,

    /// Endpoints closer than this (pixels) are merged.
    pub endpoint_merge_distance: f64,

    /// Junctions closer than this (pixels) are merged.
    pub junction_merge_distance: f64,

    /// Paths whose nearest ends are closer than this (pixels) are joined.
    pub stitch_distance: f64,

    /// Whether to fit lines and Beziers to the traced paths.
    pub fit_curves: bool,

    /// Fitting parameters.
    pub fit: FitConfig,
}

impl PipelineConfig {
    /// Default binarization threshold.
    pub const DEFAULT_THRESHOLD: u8 = 127;

    /// Default opening kernel size.
    pub const DEFAULT_NOISE_KERNEL_SIZE: u32 = 3;

    /// Default thinning iteration cap.
    pub const DEFAULT_MAX_THINNING_ITERATIONS: usize = 100;

    /// Default endpoint merge distance in pixels.
    pub const DEFAULT_ENDPOINT_MERGE_DISTANCE: f64 = 8.0;

    /// Default junction merge distance in pixels.
    pub const DEFAULT_JUNCTION_MERGE_DISTANCE: f64 = 5.0;

    /// Default stitching distance in pixels.
    pub const DEFAULT_STITCH_DISTANCE: f64 = 5.0;

    /// Largest accepted opening kernel (radius must fit in a `u8`).
    pub const MAX_NOISE_KERNEL_SIZE: u32 = 511;

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] for an even, zero or
    /// oversized kernel, a negative or non-finite distance, or a
    /// non-finite fit parameter.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.noise_kernel_size == 0
            || self.noise_kernel_size % 2 == 0
            || self.noise_kernel_size > Self::MAX_NOISE_KERNEL_SIZE
        {
            return Err(PipelineError::InvalidInput(format!(
                "noise kernel size must be odd and in 1..={}, got {}",
                Self::MAX_NOISE_KERNEL_SIZE,
                self.noise_kernel_size
            )));
        }
        for (name, value) in [
            ("endpoint_merge_distance", self.endpoint_merge_distance),
            ("junction_merge_distance", self.junction_merge_distance),
            ("stitch_distance", self.stitch_distance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidInput(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if !self.fit.line_threshold.is_finite() || !self.fit.control_dist_factor.is_finite() {
            return Err(PipelineError::InvalidInput(
                "fit parameters must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            noise_kernel_size: Self::DEFAULT_NOISE_KERNEL_SIZE,
            max_thinning_iterations: Self::DEFAULT_MAX_THINNING_ITERATIONS,
            endpoint_merge_distance: Self::DEFAULT_ENDPOINT_MERGE_DISTANCE,
            junction_merge_distance: Self::DEFAULT_JUNCTION_MERGE_DISTANCE,
            stitch_distance: Self::DEFAULT_STITCH_DISTANCE,
            fit_curves: true,
            fit: FitConfig::default(),
        }
    }
}

/// Result of running the pipeline with every intermediate preserved.
///
/// Does not derive `PartialEq` because it carries raster masks.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Size of the source image.
    pub image_size: ImageSize,
    /// Binarized, denoised foreground mask.
    pub binary: GrayImage,
    /// Thinned skeleton mask.
    pub skeleton: GrayImage,
    /// Thinning iterations performed.
    pub thinning_iterations: usize,
    /// Whether thinning reached a fixed point within its cap.
    pub thinning_converged: bool,
    /// Endpoints before clustering.
    pub raw_endpoints: Vec<Point>,
    /// Junctions before clustering.
    pub raw_junctions: Vec<Point>,
    /// Clustered endpoints.
    pub endpoints: Vec<Point>,
    /// Clustered junctions.
    pub junctions: Vec<Point>,
    /// Paths as emitted by the tracer.
    pub traced: Vec<Path>,
    /// Paths after stitching.
    pub stitched: Vec<Path>,
    /// One fit per stitched path (`None` when fitting is disabled).
    pub fitted: Option<Vec<FittedPath>>,
}

impl StagedResult {
    /// The persisted aggregate for this run.
    #[must_use]
    pub fn path_set(&self) -> PathSet {
        PathSet {
            image_size: self.image_size,
            paths: self.stitched.clone(),
            endpoints: self.endpoints.clone(),
            junctions: self.junctions.clone(),
            fitted_paths: self.fitted.clone(),
        }
    }

    /// Consume the staged result, keeping only the persisted aggregate.
    #[must_use]
    pub fn into_path_set(self) -> PathSet {
        PathSet {
            image_size: self.image_size,
            paths: self.stitched,
            endpoints: self.endpoints,
            junctions: self.junctions,
            fitted_paths: self.fitted,
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Absent, empty or malformed input, or an out-of-range parameter.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The input bytes are not a decodable image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The operation cannot handle this input (e.g. a path too short to fit).
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An iterative stage hit its cap before converging. The best-effort
    /// result is still usable.
    #[error("{stage} stopped after {iterations} iterations without converging")]
    ComputeBounded {
        /// Stage that hit its cap.
        stage: String,
        /// Iterations performed.
        iterations: usize,
    },
}

/// Serde-compatible proxy for `PipelineError`.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    InvalidInput(String),
    ImageDecode(String),
    Unsupported(String),
    ComputeBounded { stage: String, iterations: usize },
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::InvalidInput(s) => PipelineErrorProxy::InvalidInput(s.clone()),
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::Unsupported(s) => PipelineErrorProxy::Unsupported(s.clone()),
            Self::ComputeBounded { stage, iterations } => PipelineErrorProxy::ComputeBounded {
                stage: stage.clone(),
                iterations: *iterations,
            },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::InvalidInput(s) => Self::InvalidInput(s),
            // The typed image error cannot be rebuilt; keep its message.
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidInput(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::Unsupported(s) => Self::Unsupported(s),
            PipelineErrorProxy::ComputeBounded { stage, iterations } => {
                Self::ComputeBounded { stage, iterations }
            }
        })
    }
}
