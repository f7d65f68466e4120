//! Orchestrator: wires the frame source, the detector set, post-processing,
//! fusion, segmentation, and the cache into one `detect()` call.

use std::sync::Arc;

use rayon::prelude::*;

use crate::cache::{Cache, CacheKey, VideoFingerprint};
use crate::config::{CoreConfig, DetectorConfig, DetectorKind, DetectorSpec};
use crate::detector::frame_diff::{EnhancedFrameDifferenceDetector, FrameDifferenceDetector};
use crate::detector::histogram::{AdaptiveHistogramDetector, HistogramDetector, MultiChannelHistogramDetector};
use crate::detector::{DetectContext, Detector, ProgressCallback};
use crate::error::{CoreError, CoreResult};
use crate::frame_source::FrameSource;
use crate::fusion::{self, WeightedResult};
use crate::logging::{Level, SharedSink};
use crate::model::{DetectionResult, VideoMetadata};
use crate::postprocess;
use crate::segment::{self, SegmentRules};

/// Extensions the orchestrator accepts without further probing. Callers
/// that need other containers open their own
/// [`FrameSource`] and bypass path-based validation by using
/// [`Orchestrator::detect_from_source`] directly.
const ALLOWED_EXTENSIONS: &[&str] = &["y4m", "mp4", "mkv", "mov", "avi", "webm"];

fn build_detector(spec: &DetectorSpec) -> Arc<dyn Detector> {
    match spec.kind {
        DetectorKind::FrameDifference => Arc::new(FrameDifferenceDetector::new(spec.config.clone())),
        DetectorKind::EnhancedFrameDifference => {
            Arc::new(EnhancedFrameDifferenceDetector::new(spec.config.clone()))
        }
        DetectorKind::Histogram => Arc::new(HistogramDetector::new(spec.config.clone())),
        DetectorKind::MultiChannelHistogram => {
            Arc::new(MultiChannelHistogramDetector::new(spec.config.clone()))
        }
        DetectorKind::AdaptiveHistogram => Arc::new(AdaptiveHistogramDetector::new(spec.config.clone())),
    }
}

/// Validates a config eagerly the way detector construction would reject a
/// nonsensical one.
fn validate_config(kind: DetectorKind, config: &DetectorConfig) -> CoreResult<()> {
    if !(0.0..=1.0).contains(&config.threshold) {
        return Err(CoreError::detector_init(
            kind.id(),
            format!("threshold must be in [0, 1], got {}", config.threshold),
        ));
    }
    if config.resize_height == 0 {
        return Err(CoreError::detector_init(kind.id(), "resize_height must be positive"));
    }
    if config.bins == 0 {
        return Err(CoreError::detector_init(kind.id(), "bins must be positive"));
    }
    Ok(())
}

pub struct Orchestrator {
    config: CoreConfig,
    sink: SharedSink,
}

impl Orchestrator {
    pub fn new(config: CoreConfig, sink: SharedSink) -> Self {
        Orchestrator { config, sink }
    }

    fn cache(&self) -> Option<Cache> {
        self.config.cache.enabled.then(|| Cache::new(&self.config.cache.directory))
    }

    /// Validates `path` has an allowed extension, computes its fingerprint,
    /// and hands off to [`Self::detect_from_source`].
    pub fn detect(
        &self,
        path: &std::path::Path,
        specs: &[DetectorSpec],
        open_source: impl Fn() -> CoreResult<Box<dyn FrameSource>> + Sync,
        cancellation: crate::cancel::CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> CoreResult<(DetectionResult, Vec<crate::model::Segment>)> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some(ext) if ALLOWED_EXTENSIONS.contains(&ext) => {}
            Some(ext) => {
                return Err(CoreError::input(format!("unsupported file extension '.{ext}'")));
            }
            None => return Err(CoreError::input("input path has no file extension")),
        }

        let fingerprint = VideoFingerprint::from_path(path)?;
        self.detect_from_source(fingerprint, specs, open_source, cancellation, progress)
    }

    /// Runs every detector in `specs` against independent [`FrameSource`]
    /// instances produced by `open_source` (one per detector; sources are
    /// single-consumer), post-processes each, fuses if there is more than
    /// one, and segments the fused (or sole) result.
    pub fn detect_from_source(
        &self,
        fingerprint: VideoFingerprint,
        specs: &[DetectorSpec],
        open_source: impl Fn() -> CoreResult<Box<dyn FrameSource>> + Sync,
        cancellation: crate::cancel::CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> CoreResult<(DetectionResult, Vec<crate::model::Segment>)> {
        if specs.is_empty() {
            return Err(CoreError::input("at least one detector must be configured"));
        }

        report(&progress, 0.05, "initializing");
        for spec in specs {
            validate_config(spec.kind, &spec.config)?;
        }
        let detectors: Vec<Arc<dyn Detector>> = specs.iter().map(build_detector).collect();

        let probe = open_source()?;
        let video_info = probe.info();
        drop(probe);

        report(&progress, 0.1, "detecting");
        let cache = self.cache();
        let results: Vec<CoreResult<DetectionResult>> = detectors
            .par_iter()
            .map(|detector| {
                self.run_one(Arc::clone(detector), &fingerprint, &open_source, &cancellation, cache.as_ref())
            })
            .collect();

        let mut raw_results = Vec::with_capacity(results.len());
        for result in results {
            raw_results.push(result?);
        }
        report(&progress, 0.7, "post-processing");

        let fps = video_info.fps;
        let frame_count = raw_results
            .first()
            .map(|r| r.frame_count)
            .unwrap_or(video_info.frame_count);

        let post_processed: Vec<DetectionResult> = raw_results
            .into_iter()
            .zip(specs.iter())
            .map(|(raw, spec)| {
                let boundaries = postprocess::process(&raw.scores, fps, Some(spec.config.threshold), spec.config.min_scene_length, 0.1);
                let boundaries = postprocess::dedup_close_boundaries(&boundaries, self.config.fusion.time_tolerance_sec);
                DetectionResult {
                    boundaries,
                    ..raw
                }
            })
            .collect();

        report(&progress, 0.85, "fusing");
        let fused = if post_processed.len() == 1 {
            post_processed.into_iter().next().unwrap()
        } else {
            let weighted: Vec<WeightedResult<'_>> = post_processed
                .iter()
                .zip(specs.iter())
                .map(|(result, spec)| WeightedResult {
                    result,
                    weight: spec
                        .weight
                        .or_else(|| self.config.fusion.fusion_weights.get(result.algorithm.as_str()).copied())
                        .unwrap_or(1.0),
                })
                .collect();
            fusion::fuse(&weighted, fps, self.config.fusion.time_tolerance_sec)?
        };

        let video = VideoMetadata::new(fps, frame_count);
        let rules = SegmentRules {
            min_segment_duration_sec: self.config.segmentation.min_segment_duration_sec,
            max_segment_duration_sec: self.config.segmentation.max_segment_duration_sec,
            merge_short_segments: self.config.segmentation.merge_short_segments,
        };
        let segments = segment::build_segments(&fused.boundaries, video, &rules);

        report(&progress, 1.0, "done");
        Ok((fused, segments))
    }

    fn run_one(
        &self,
        detector: Arc<dyn Detector>,
        fingerprint: &VideoFingerprint,
        open_source: &(impl Fn() -> CoreResult<Box<dyn FrameSource>> + Sync),
        cancellation: &crate::cancel::CancellationToken,
        cache: Option<&Cache>,
    ) -> CoreResult<DetectionResult> {
        let key = cache.map(|_| CacheKey::compute(fingerprint, detector.name(), detector.config()));

        if let (Some(cache), Some(key)) = (cache, &key) {
            if let Some(cached) = cache.lookup(key)? {
                self.sink.log(Level::Debug, detector.name(), "cache hit");
                return Ok(cached);
            }
        }

        let compute = || -> CoreResult<DetectionResult> {
            let mut source = open_source()?;
            let ctx = DetectContext::new(Arc::clone(&self.sink), cancellation.clone());
            detector.detect(source.as_mut(), &ctx)
        };

        let result = match (cache, &key) {
            (Some(cache), Some(key)) => {
                let result = crate::cache::single_flight::SingleFlight::global().run(key, compute)?;
                cache.store(key, &result)?;
                result
            }
            _ => compute()?,
        };
        Ok(result)
    }
}

fn report(progress: &Option<ProgressCallback>, fraction: f64, stage: &str) {
    if let Some(cb) = progress {
        cb(fraction, stage);
    }
}
