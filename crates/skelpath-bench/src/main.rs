//! skelpath-bench: CLI tool for tracing images into path archives and
//! collecting per-stage diagnostics.
//!
//! - `trace` runs the pipeline on an image, prints a diagnostics report,
//!   and optionally writes the JSON path archive, an SVG, and a PNG
//!   preview.
//! - `inspect` loads and validates an archive, prints a summary, and can
//!   re-render it as SVG or PNG.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin skelpath-bench -- trace [OPTIONS] <IMAGE_PATH>
//! cargo run --release --bin skelpath-bench -- inspect [OPTIONS] <ARCHIVE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use skelpath_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use skelpath_pipeline::preview::{DEFAULT_CURVE_SAMPLES, render_fitted};
use skelpath_pipeline::{FitConfig, LineEndpoints, PathSet, PipelineConfig, PreprocessCache};

/// Skeleton tracing and diagnostics for skelpath.
#[derive(Parser)]
#[command(name = "skelpath-bench", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Trace an image into skeleton paths and print diagnostics.
    Trace(TraceArgs),
    /// Load, validate, and summarize a path archive.
    Inspect(InspectArgs),
}

#[derive(Args)]
struct TraceArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    #[command(flatten)]
    params: PipelineArgs,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Write the JSON path archive to file.
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    render: RenderArgs,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Path to a JSON path archive.
    archive_path: PathBuf,

    #[command(flatten)]
    render: RenderArgs,
}

#[derive(Args)]
struct RenderArgs {
    /// Write SVG output to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Draw endpoint and crosspoint markers in the SVG.
    #[arg(long)]
    markers: bool,

    /// Write a PNG preview to file.
    #[arg(long)]
    preview: Option<PathBuf>,
}

#[derive(Args)]
struct PipelineArgs {
    /// Binarization threshold; darker pixels become foreground.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Side length of the square opening kernel (odd; 1 disables).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_NOISE_KERNEL_SIZE)]
    noise_kernel_size: u32,

    /// Cap on Zhang-Suen thinning iterations.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_THINNING_ITERATIONS)]
    max_thinning_iterations: usize,

    /// Distance below which endpoints are merged, in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_ENDPOINT_MERGE_DISTANCE)]
    endpoint_merge_distance: f64,

    /// Distance below which crosspoints are merged, in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_JUNCTION_MERGE_DISTANCE)]
    junction_merge_distance: f64,

    /// Distance below which path ends are stitched, in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_STITCH_DISTANCE)]
    stitch_distance: f64,

    /// Skip line/Bezier fitting.
    #[arg(long)]
    no_fit: bool,

    /// Straightness above which a path is fitted as a line.
    #[arg(long, default_value_t = FitConfig::DEFAULT_LINE_THRESHOLD)]
    line_threshold: f64,

    /// Bezier handle length as a fraction of arc length.
    #[arg(long, default_value_t = FitConfig::DEFAULT_CONTROL_DIST_FACTOR)]
    control_dist_factor: f64,

    /// Placement of fitted line endpoints.
    #[arg(long, value_enum, default_value_t = Endpoints::UnitStep)]
    line_endpoints: Endpoints,
}

/// Fitted line endpoint placement.
#[derive(Clone, Copy, ValueEnum)]
enum Endpoints {
    /// Centroid and one unit along the fitted direction.
    UnitStep,
    /// First and last path points projected onto the fitted line.
    Projected,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(args: &TraceArgs) -> Result<PipelineConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let p = &args.params;
    Ok(PipelineConfig {
        threshold: p.threshold,
        noise_kernel_size: p.noise_kernel_size,
        max_thinning_iterations: p.max_thinning_iterations,
        endpoint_merge_distance: p.endpoint_merge_distance,
        junction_merge_distance: p.junction_merge_distance,
        stitch_distance: p.stitch_distance,
        fit_curves: !p.no_fit,
        fit: FitConfig {
            line_threshold: p.line_threshold,
            control_dist_factor: p.control_dist_factor,
            line_endpoints: match p.line_endpoints {
                Endpoints::UnitStep => LineEndpoints::UnitStep,
                Endpoints::Projected => LineEndpoints::Projected,
            },
        },
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Trace(args) => run_trace(&args),
        Command::Inspect(args) => run_inspect(&args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run_trace(args: &TraceArgs) -> Result<(), String> {
    let config = config_from_cli(args)?;
    let image_bytes = std::fs::read(&args.image_path)
        .map_err(|e| format!("Error reading {}: {e}", args.image_path.display()))?;

    eprintln!(
        "Image: {} ({} bytes)",
        args.image_path.display(),
        image_bytes.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", args.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(args.runs);
    let mut cache = PreprocessCache::default();

    for run in 0..args.runs {
        if args.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, args.runs);
        }

        let (staged, diagnostics) = skelpath_pipeline::process_staged_with_diagnostics_cached(
            &image_bytes,
            &config,
            &StdClock,
            &mut cache,
        )
        .map_err(|e| format!("Pipeline error: {e}"))?;

        if args.json {
            let json = serde_json::to_string_pretty(&diagnostics)
                .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
            println!("{json}");
        } else {
            println!("{}", diagnostics.report());
        }

        // Write outputs on the first run only.
        if run == 0 {
            let set = staged.into_path_set();
            if let Some(ref out) = args.out {
                let json = skelpath_export::to_archive_json(&set)
                    .map_err(|e| format!("Error serializing archive: {e}"))?;
                write_output(out, json.as_bytes(), "Archive")?;
            }
            let title = file_title(&args.image_path);
            let config_json = serde_json::to_string(&config).ok();
            let desc = format!(
                "threshold={} kernel={} stitch={}",
                config.threshold, config.noise_kernel_size, config.stitch_distance,
            );
            let metadata = skelpath_export::SvgMetadata {
                title: Some(title),
                description: Some(&desc),
                config_json: config_json.as_deref(),
            };
            render_outputs(&set, &args.render, &metadata);
        }

        all_diagnostics.push(diagnostics);

        if args.runs > 1 {
            eprintln!();
        }
    }

    if args.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
        println!(
            "Preprocess cache: {} hits, {} misses",
            cache.hits(),
            cache.misses(),
        );
    }
    Ok(())
}

fn run_inspect(args: &InspectArgs) -> Result<(), String> {
    let json = std::fs::read_to_string(&args.archive_path)
        .map_err(|e| format!("Error reading {}: {e}", args.archive_path.display()))?;
    let set = skelpath_export::from_archive_json(&json)
        .map_err(|e| format!("Error loading {}: {e}", args.archive_path.display()))?;

    let size = set.image_size;
    println!("Archive: {}", args.archive_path.display());
    println!(
        "Image: {}x{} ({} channels)",
        size.width, size.height, size.channels
    );
    println!(
        "Paths: {}  |  Points: {}  |  Endpoints: {}  |  Crosspoints: {}",
        set.paths.len(),
        set.total_points(),
        set.endpoints.len(),
        set.junctions.len(),
    );
    match set.fitted_paths.as_deref() {
        Some(fits) => {
            let lines = fits
                .iter()
                .filter(|f| f.kind() == skelpath_pipeline::FitKind::Line)
                .count();
            println!("Fitted: {lines} lines, {} beziers", fits.len() - lines);
        }
        None => println!("Fitted: none"),
    }

    let metadata = skelpath_export::SvgMetadata {
        title: Some(file_title(&args.archive_path)),
        ..skelpath_export::SvgMetadata::default()
    };
    render_outputs(&set, &args.render, &metadata);
    Ok(())
}

/// Write the SVG and PNG preview requested by `render`.
///
/// Failures are reported and do not abort the run.
fn render_outputs(set: &PathSet, render: &RenderArgs, metadata: &skelpath_export::SvgMetadata<'_>) {
    if let Some(ref svg_path) = render.svg {
        let svg = skelpath_export::to_svg(set, metadata, render.markers);
        if let Err(msg) = write_output(svg_path, svg.as_bytes(), "SVG") {
            eprintln!("{msg}");
        }
    }
    if let Some(ref preview_path) = render.preview {
        let preview = render_fitted(set, DEFAULT_CURVE_SAMPLES);
        match preview.save(preview_path) {
            Ok(()) => tracing::info!(path = %preview_path.display(), "preview written"),
            Err(e) => eprintln!("Error writing preview to {}: {e}", preview_path.display()),
        }
    }
}

fn write_output(path: &Path, bytes: &[u8], what: &str) -> Result<(), String> {
    std::fs::write(path, bytes)
        .map_err(|e| format!("Error writing {what} to {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "{what} written");
    Ok(())
}

fn file_title(path: &Path) -> &str {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("skelpath")
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Option<Duration>;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Decode", |d| Some(d.decode.duration)),
        ("Preprocess", |d| Some(d.preprocess.duration)),
        ("Skeletonize", |d| Some(d.skeletonize.duration)),
        ("Special Points", |d| Some(d.special_points.duration)),
        ("Trace", |d| Some(d.trace.duration)),
        ("Stitch", |d| Some(d.stitch.duration)),
        ("Fit", |d| d.fit.as_ref().map(|s| s.duration)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    fn trace_args(argv: &[&str]) -> TraceArgs {
        let mut full = vec!["skelpath-bench", "trace"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Trace(args) => args,
            Command::Inspect(_) => unreachable!("parsed a trace command"),
        }
    }

    #[test]
    fn flags_default_to_pipeline_defaults() {
        let config = config_from_cli(&trace_args(&["in.png"])).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn flags_override_fields() {
        let args = trace_args(&[
            "in.png",
            "--threshold",
            "90",
            "--no-fit",
            "--line-endpoints",
            "projected",
        ]);
        let config = config_from_cli(&args).unwrap();
        assert_eq!(config.threshold, 90);
        assert!(!config.fit_curves);
        assert_eq!(config.fit.line_endpoints, LineEndpoints::Projected);
    }

    #[test]
    fn config_json_wins_over_flags() {
        let args = trace_args(&[
            "in.png",
            "--threshold",
            "90",
            "--config-json",
            r#"{"threshold": 200}"#,
        ]);
        let config = config_from_cli(&args).unwrap();
        assert_eq!(config.threshold, 200);
        assert!((config.stitch_distance - PipelineConfig::DEFAULT_STITCH_DISTANCE).abs() < f64::EPSILON);
    }

    #[test]
    fn bad_config_json_is_an_error() {
        let args = trace_args(&["in.png", "--config-json", "{"]);
        assert!(config_from_cli(&args).is_err());
    }

    /// A scratch directory holding a small bar drawing.
    fn scratch_image(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("skelpath-bench-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let image = dir.join("bar.png");
        image::GrayImage::from_fn(60, 21, |x, y| {
            let ink = (5..55).contains(&x) && (8..13).contains(&y);
            image::Luma([if ink { 0 } else { 255 }])
        })
        .save(&image)
        .unwrap();
        image
    }

    #[test]
    fn trace_writes_the_archive() {
        let image = scratch_image("archive");
        let out = image.with_file_name("bar.json");
        let out_arg = out.to_str().unwrap();
        let args = trace_args(&[image.to_str().unwrap(), "--out", out_arg, "--runs", "2"]);
        run_trace(&args).unwrap();
        let set = skelpath_export::from_archive_json(&std::fs::read_to_string(&out).unwrap())
            .unwrap();
        assert_eq!(set.paths.len(), 1);
        std::fs::remove_dir_all(image.parent().unwrap()).unwrap();
    }

    #[test]
    fn failed_archive_write_fails_the_trace() {
        let image = scratch_image("unwritable");
        let out = image.with_file_name("missing").join("bar.json");
        let args = trace_args(&[image.to_str().unwrap(), "--out", out.to_str().unwrap()]);
        let err = run_trace(&args).unwrap_err();
        assert!(err.starts_with("Error writing Archive"), "{err}");
        std::fs::remove_dir_all(image.parent().unwrap()).unwrap();
    }

    #[test]
    fn zero_runs_is_rejected() {
        let result = Cli::try_parse_from(["skelpath-bench", "trace", "in.png", "--runs", "0"]);
        assert!(result.is_err());
    }
}
