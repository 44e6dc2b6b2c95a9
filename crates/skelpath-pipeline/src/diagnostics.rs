//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning. [`process_staged_with_diagnostics`] drives the
//! staged [`Pipeline`](crate::Pipeline) and records a
//! [`StageDiagnostics`] after every step.
//!
//! The crate is sans-IO, so time comes from a caller-supplied [`Clock`].
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::PreprocessCache;
use crate::types::{FittedPath, Path, PipelineConfig, PipelineError, StagedResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Monotonic time source supplied by the caller.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 2: binarization and denoising.
    pub preprocess: StageDiagnostics,
    /// Stage 3: thinning.
    pub skeletonize: StageDiagnostics,
    /// Stage 4: endpoint/junction detection and clustering.
    pub special_points: StageDiagnostics,
    /// Stage 5: path tracing.
    pub trace: StageDiagnostics,
    /// Stage 6: stitching.
    pub stitch: StageDiagnostics,
    /// Stage 7: fitting (only when `config.fit_curves == true`).
    pub fit: Option<StageDiagnostics>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Colour channels of the decoded image.
        channels: u32,
    },
    /// Binarization metrics.
    Preprocess {
        /// Binarization threshold.
        threshold: u8,
        /// Opening kernel side length.
        kernel_size: u32,
        /// Foreground pixels after denoising.
        foreground_pixels: u64,
        /// Total pixel count for computing density.
        total_pixels: u64,
    },
    /// Thinning metrics.
    Skeletonize {
        /// Iterations performed.
        iterations: usize,
        /// Whether a fixed point was reached within the cap.
        converged: bool,
        /// Foreground pixels in the skeleton.
        skeleton_pixels: u64,
    },
    /// Special point metrics.
    SpecialPoints {
        /// Endpoints before clustering.
        raw_endpoints: usize,
        /// Junctions before clustering.
        raw_junctions: usize,
        /// Endpoints after clustering.
        endpoints: usize,
        /// Junctions after clustering.
        junctions: usize,
    },
    /// Path tracing metrics.
    Trace {
        /// Number of paths traced.
        path_count: usize,
        /// Total number of points across all paths.
        total_points: usize,
        /// Minimum points in any single path.
        min_path_points: usize,
        /// Maximum points in any single path.
        max_path_points: usize,
        /// Mean points per path.
        mean_path_points: f64,
    },
    /// Stitching metrics.
    Stitch {
        /// Join distance in pixels.
        distance: f64,
        /// Paths before stitching.
        paths_before: usize,
        /// Paths after stitching.
        paths_after: usize,
    },
    /// Fitting metrics.
    Fit {
        /// Paths fitted as lines.
        lines: usize,
        /// Paths fitted as cubic Beziers.
        curves: usize,
        /// Paths passed through unfit.
        unfit: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Number of output paths.
    pub path_count: usize,
    /// Number of clustered endpoints.
    pub endpoint_count: usize,
    /// Number of clustered junctions.
    pub junction_count: usize,
    /// Points across all output paths.
    pub total_points: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Paths: {}  |  Points: {}  |  Endpoints: {}  |  Crosspoints: {}",
            self.summary.path_count,
            self.summary.total_points,
            self.summary.endpoint_count,
            self.summary.junction_count,
        ));

        lines.join("\n")
    }

    /// Executed stages in pipeline order, with display names.
    #[must_use]
    pub fn stages(&self) -> Vec<(&'static str, &StageDiagnostics)> {
        let mut stages = vec![
            ("Decode", &self.decode),
            ("Preprocess", &self.preprocess),
            ("Skeletonize", &self.skeletonize),
            ("Special Points", &self.special_points),
            ("Trace", &self.trace),
            ("Stitch", &self.stitch),
        ];
        if let Some(ref fit) = self.fit {
            stages.push(("Fit", fit));
        }
        stages
    }
}

/// Run the full pipeline, timing each stage with `clock`.
///
/// # Errors
///
/// Same as [`crate::process_staged`].
pub fn process_staged_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    run_with_diagnostics(image_bytes, config, clock, None)
}

/// Like [`process_staged_with_diagnostics`], binarizing through `cache`
/// so repeated runs over the same image skip the preprocess work.
///
/// # Errors
///
/// Same as [`crate::process_staged`].
pub fn process_staged_with_diagnostics_cached<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
    cache: &mut PreprocessCache,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    run_with_diagnostics(image_bytes, config, clock, Some(cache))
}

fn run_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
    cache: Option<&mut PreprocessCache>,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let pipeline_start = clock.now();

    let t = clock.now();
    let decoded = crate::Pipeline::new(image_bytes.to_vec(), config.clone()).decode()?;
    let size = decoded.size();
    let decode = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Decode {
            input_bytes: image_bytes.len(),
            width: size.width,
            height: size.height,
            channels: size.channels,
        },
    };

    let t = clock.now();
    let preprocessed = match cache {
        Some(cache) => decoded.preprocess_cached(cache)?,
        None => decoded.preprocess()?,
    };
    let preprocess = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Preprocess {
            threshold: config.threshold,
            kernel_size: config.noise_kernel_size,
            foreground_pixels: crate::preprocess::count_foreground(preprocessed.binary()),
            total_pixels: size.pixel_count(),
        },
    };

    let t = clock.now();
    let skeletonized = preprocessed.skeletonize();
    let skeletonize = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Skeletonize {
            iterations: skeletonized.iterations(),
            converged: skeletonized.converged(),
            skeleton_pixels: crate::preprocess::count_foreground(skeletonized.skeleton()),
        },
    };

    let t = clock.now();
    let detected = skeletonized.detect_points();
    let special_points = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::SpecialPoints {
            raw_endpoints: detected.raw().endpoints.len(),
            raw_junctions: detected.raw().junctions.len(),
            endpoints: detected.endpoints().len(),
            junctions: detected.junctions().len(),
        },
    };

    let t = clock.now();
    let traced = detected.trace();
    let stats = path_stats(traced.traced());
    let trace = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Trace {
            path_count: traced.traced().len(),
            total_points: stats.total,
            min_path_points: stats.min,
            max_path_points: stats.max,
            mean_path_points: stats.mean,
        },
    };

    let t = clock.now();
    let paths_before = traced.traced().len();
    let stitched = traced.stitch();
    let stitch = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Stitch {
            distance: config.stitch_distance,
            paths_before,
            paths_after: stitched.stitched().len(),
        },
    };

    let t = clock.now();
    let fitted = stitched.fit()?;
    let fit_duration = clock.elapsed(&t);
    let fit = fitted.fitted().map(|fits| StageDiagnostics {
        duration: fit_duration,
        metrics: fit_tally(fits),
    });

    let staged = fitted.into_result();
    let total_duration = clock.elapsed(&pipeline_start);

    let summary = PipelineSummary {
        image_width: size.width,
        image_height: size.height,
        pixel_count: size.pixel_count(),
        path_count: staged.stitched.len(),
        endpoint_count: staged.endpoints.len(),
        junction_count: staged.junctions.len(),
        total_points: total_points(&staged.stitched),
    };

    let diagnostics = PipelineDiagnostics {
        decode,
        preprocess,
        skeletonize,
        special_points,
        trace,
        stitch,
        fit,
        total_duration,
        summary,
    };
    Ok((staged, diagnostics))
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            channels,
        } => format!("{input_bytes} bytes -> {width}x{height}x{channels}"),
        StageMetrics::Preprocess {
            threshold,
            kernel_size,
            foreground_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "t={threshold} k={kernel_size} fg={foreground_pixels} ({density:.1}%)",
            )
        }
        StageMetrics::Skeletonize {
            iterations,
            converged,
            skeleton_pixels,
        } => {
            let state = if *converged { "converged" } else { "CAPPED" };
            format!("{iterations} iters ({state}), {skeleton_pixels} px")
        }
        StageMetrics::SpecialPoints {
            raw_endpoints,
            raw_junctions,
            endpoints,
            junctions,
        } => format!(
            "endpoints {raw_endpoints}->{endpoints}, crosspoints {raw_junctions}->{junctions}",
        ),
        StageMetrics::Trace {
            path_count,
            total_points,
            min_path_points,
            max_path_points,
            mean_path_points,
        } => format!(
            "{path_count} paths, {total_points} pts (min={min_path_points} max={max_path_points} mean={mean_path_points:.1})",
        ),
        StageMetrics::Stitch {
            distance,
            paths_before,
            paths_after,
        } => format!("d={distance:.1} {paths_before}->{paths_after} paths"),
        StageMetrics::Fit {
            lines,
            curves,
            unfit,
        } => format!("{lines} lines, {curves} beziers, {unfit} unfit"),
    }
}

fn fit_tally(fits: &[FittedPath]) -> StageMetrics {
    let counts = crate::fit::count_fits(fits);
    StageMetrics::Fit {
        lines: counts.lines,
        curves: counts.curves,
        unfit: counts.unfit,
    }
}

/// Statistics for a set of paths.
pub(crate) struct PathStats {
    /// Total number of points across all paths.
    pub total: usize,
    /// Minimum number of points in any single path.
    pub min: usize,
    /// Maximum number of points in any single path.
    pub max: usize,
    /// Mean number of points per path.
    pub mean: f64,
}

/// Compute point statistics for a set of paths.
pub(crate) fn path_stats(paths: &[Path]) -> PathStats {
    let total = total_points(paths);
    let min = paths.iter().map(Path::len).min().unwrap_or(0);
    let max = paths.iter().map(Path::len).max().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let mean = if paths.is_empty() {
        0.0
    } else {
        total as f64 / paths.len() as f64
    };
    PathStats {
        total,
        min,
        max,
        mean,
    }
}

/// Total points across a slice of paths.
pub(crate) fn total_points(paths: &[Path]) -> usize {
    paths.iter().map(Path::len).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::types::Point;

    /// Deterministic clock: every `now()` advances one millisecond.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get() + 1;
            self.0.set(t);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.0.get().saturating_sub(*since))
        }
    }

    fn cross_png() -> Vec<u8> {
        let img = image::GrayImage::from_fn(40, 40, |x, y| {
            let bar = (4..36).contains(&x) && (18..23).contains(&y);
            let post = (18..23).contains(&x) && (4..36).contains(&y);
            image::Luma([if bar || post { 0 } else { 255 }])
        });
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::L8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        assert!((duration_ms(d) - 1234.0).abs() < 0.01);
    }

    #[test]
    fn path_stats_empty() {
        let stats = path_stats(&[]);
        assert_eq!((stats.total, stats.min, stats.max), (0, 0, 0));
        assert!(stats.mean.abs() < f64::EPSILON);
    }

    #[test]
    fn path_stats_computes() {
        let paths = vec![
            Path::new(vec![Point::new(0, 0), Point::new(1, 0)]),
            Path::new((0..4).map(|x| Point::new(x, 0)).collect()),
        ];
        let stats = path_stats(&paths);
        assert_eq!((stats.total, stats.min, stats.max), (6, 2, 4));
        assert!((stats.mean - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fit_tally_counts_each_kind() {
        let line = FittedPath::Line {
            p0: Point::new(0, 0),
            p1: Point::new(1, 0),
        };
        let unfit = FittedPath::Unfit(Path::new(vec![Point::new(0, 0), Point::new(1, 1)]));
        assert!(matches!(
            fit_tally(&[line.clone(), line, unfit]),
            StageMetrics::Fit {
                lines: 2,
                curves: 0,
                unfit: 1
            }
        ));
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let clock = TickClock(Cell::new(0));
        let (staged, diag) =
            process_staged_with_diagnostics(&cross_png(), &PipelineConfig::default(), &clock)
                .unwrap();
        assert_eq!(diag.stages().len(), 7);
        assert_eq!(diag.summary.path_count, staged.stitched.len());
        assert_eq!(diag.summary.junction_count, 1);
        assert_eq!(diag.summary.endpoint_count, 4);
        assert!(diag.total_duration > Duration::ZERO);
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Skeletonize"));
    }

    #[test]
    fn repeated_runs_reuse_the_cached_mask() {
        let clock = TickClock(Cell::new(0));
        let config = PipelineConfig::default();
        let mut cache = PreprocessCache::default();
        let (first, _) =
            process_staged_with_diagnostics_cached(&cross_png(), &config, &clock, &mut cache)
                .unwrap();
        let (second, diag) =
            process_staged_with_diagnostics_cached(&cross_png(), &config, &clock, &mut cache)
                .unwrap();
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
        assert_eq!(second.binary, first.binary);
        assert_eq!(second.stitched, first.stitched);
        assert_eq!(diag.summary.junction_count, 1);
    }

    #[test]
    fn fit_stage_is_absent_when_disabled() {
        let config = PipelineConfig {
            fit_curves: false,
            ..PipelineConfig::default()
        };
        let clock = TickClock(Cell::new(0));
        let (_, diag) = process_staged_with_diagnostics(&cross_png(), &config, &clock).unwrap();
        assert!(diag.fit.is_none());
        assert_eq!(diag.stages().len(), 6);
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) =
            process_staged_with_diagnostics(&cross_png(), &PipelineConfig::default(), &clock)
                .unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert!(json["total_duration"].is_f64());
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.total_duration, diag.total_duration);
    }
}
