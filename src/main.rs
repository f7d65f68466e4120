// Safety lints
#![deny(bare_trait_objects)]
#![deny(clippy::as_ptr_cast_mut)]
#![deny(clippy::cast_ptr_alignment)]
#![deny(clippy::large_stack_arrays)]
#![deny(clippy::ptr_as_ptr)]
#![deny(clippy::transmute_ptr_to_ptr)]
#![deny(clippy::unwrap_used)]
// Performance lints
#![warn(clippy::cloned_instead_of_copied)]
#![warn(clippy::inefficient_to_string)]
#![warn(clippy::needless_collect)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::or_fun_call)]
#![warn(clippy::trivially_copy_pass_by_ref)]
// Correctness lints
#![deny(clippy::case_sensitive_file_extension_comparisons)]
#![deny(clippy::float_cmp)]
#![deny(clippy::match_same_arms)]
#![deny(clippy::path_buf_push_overwrite)]
// Clarity/formatting lints
#![warn(clippy::default_trait_access)]
#![warn(clippy::explicit_deref_methods)]
#![warn(clippy::if_not_else)]
#![warn(clippy::manual_let_else)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::option_if_let_else)]
#![warn(clippy::redundant_else)]
#![warn(clippy::semicolon_if_nothing_returned)]
// Documentation lints
#![warn(clippy::doc_markdown)]
#![warn(clippy::missing_errors_doc)]

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use shotbound_core::cancel::CancellationToken;
use shotbound_core::config::{ColorSpace, CoreConfig, DetectorConfig, DetectorKind, DetectorSpec};
use shotbound_core::frame_source::y4m::Y4mFrameSource;
use shotbound_core::frame_source::FrameSource;
use shotbound_core::logging::{null_sink, SharedSink};
use shotbound_core::orchestrator::Orchestrator;
use shotbound_core::wire;

#[derive(Clone, Debug, Parser)]
#[command(name = "shotbound", about = "Detects shot boundaries in a y4m video stream")]
struct Args {
    /// Path to a .y4m file. Reading from stdin is not supported: the
    /// orchestrator opens the source independently per detector.
    input: PathBuf,

    /// Optional file to write the JSON report (boundaries + segments) to.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Detector(s) to run; repeat the flag to fuse several (e.g.
    /// `--detector frame_difference --detector histogram`).
    #[arg(long = "detector", value_enum, default_values_t = vec![DetectorArg::FrameDifference])]
    detectors: Vec<DetectorArg>,

    /// Per-detector score threshold in `[0, 1]`.
    #[arg(long, default_value_t = 0.3)]
    threshold: f64,

    /// Minimum frames between two accepted boundaries.
    #[arg(long, default_value_t = 15)]
    min_scene_length: usize,

    /// Directory used for the on-disk detection cache.
    #[arg(long, default_value = ".shotbound-cache")]
    cache_dir: PathBuf,

    /// Disables the on-disk cache entirely.
    #[arg(long)]
    no_cache: bool,

    /// Ignores any cached result for this input and recomputes.
    #[arg(long)]
    force_reprocess: bool,

    /// Worker thread count for the global rayon pool (defaults to the
    /// number of available CPUs).
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum DetectorArg {
    FrameDifference,
    EnhancedFrameDifference,
    Histogram,
    MultiChannelHistogram,
    AdaptiveHistogram,
}

impl DetectorArg {
    fn kind(self) -> DetectorKind {
        match self {
            DetectorArg::FrameDifference => DetectorKind::FrameDifference,
            DetectorArg::EnhancedFrameDifference => DetectorKind::EnhancedFrameDifference,
            DetectorArg::Histogram => DetectorKind::Histogram,
            DetectorArg::MultiChannelHistogram => DetectorKind::MultiChannelHistogram,
            DetectorArg::AdaptiveHistogram => DetectorKind::AdaptiveHistogram,
        }
    }

    fn is_histogram_family(self) -> bool {
        matches!(
            self,
            DetectorArg::Histogram | DetectorArg::MultiChannelHistogram | DetectorArg::AdaptiveHistogram
        )
    }
}

fn build_sink() -> SharedSink {
    #[cfg(feature = "log")]
    {
        shotbound_core::logging::log_facade()
    }
    #[cfg(not(feature = "log"))]
    {
        null_sink()
    }
}

fn open_y4m(path: &std::path::Path) -> shotbound_core::error::CoreResult<Box<dyn FrameSource>> {
    let file = File::open(path)
        .map_err(|e| shotbound_core::error::CoreError::source(format!("cannot open '{}': {e}", path.display())))?;
    let source = Y4mFrameSource::new(std::io::BufReader::new(file))?;
    Ok(Box::new(source))
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(workers) = args.workers {
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build_global()
            .context("failed to configure the worker thread pool")?;
    }

    let specs: Vec<DetectorSpec> = args
        .detectors
        .iter()
        .map(|d| {
            let mut config = if d.is_histogram_family() {
                DetectorConfig::histogram_defaults()
            } else {
                DetectorConfig::default()
            };
            config.threshold = args.threshold;
            config.min_scene_length = args.min_scene_length;
            config.color_space = ColorSpace::Rgb;
            DetectorSpec {
                kind: d.kind(),
                config,
                weight: None,
            }
        })
        .collect();

    let mut config = CoreConfig::default();
    config.cache.enabled = !args.no_cache;
    config.cache.directory = args.cache_dir.clone();

    if args.force_reprocess && config.cache.enabled {
        shotbound_core::cache::Cache::new(&config.cache.directory)
            .clear()
            .context("failed to clear the detection cache before a forced reprocess")?;
    }

    let sink = build_sink();
    let orchestrator = Orchestrator::new(config, sink);
    let input = args.input.clone();

    let (result, segments) = orchestrator
        .detect(
            &input,
            &specs,
            || open_y4m(&input),
            CancellationToken::new(),
            None,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("shot boundary detection failed")?;

    let report = wire::encode_report(&result, &segments);
    println!("{}", String::from_utf8_lossy(&report));

    if let Some(output_path) = args.output {
        std::fs::write(&output_path, &report)
            .with_context(|| format!("failed to write report to '{}'", output_path.display()))?;
    }

    Ok(())
}
