//! Detector: a pluggable algorithm that scores consecutive frame pairs and
//! turns those scores into a coarse boundary list. `detect()` provides the
//! shared frame-walk loop; algorithm authors implement only
//! [`Detector::process_pair`] and the config accessors.

pub mod frame_diff;
pub mod histogram;
pub mod util;

use std::sync::Arc;
use std::time::Instant;

use crate::cancel::CancellationToken;
use crate::config::DetectorConfig;
use crate::error::CoreResult;
use crate::frame_source::{Frame, FrameSource};
use crate::logging::SharedSink;
use crate::model::{Boundary, BoundaryKind, DetectionResult};

/// A caller-supplied callback invoked as frames are consumed. `fraction` is
/// in `[0, 1]`; `stage` is a short human-readable label.
pub type ProgressCallback = Arc<dyn Fn(f64, &str) + Send + Sync>;

/// Shared state every detector's `detect()` walk needs but that isn't part
/// of the algorithm itself: logging, cancellation, and progress reporting.
#[derive(Clone)]
pub struct DetectContext {
    pub sink: SharedSink,
    pub cancellation: CancellationToken,
    pub cancellation_check_interval_frames: usize,
    pub progress: Option<ProgressCallback>,
}

impl DetectContext {
    pub fn new(sink: SharedSink, cancellation: CancellationToken) -> Self {
        DetectContext {
            sink,
            cancellation,
            cancellation_check_interval_frames: 30,
            progress: None,
        }
    }

    fn report(&self, fraction: f64, stage: &str) {
        if let Some(cb) = &self.progress {
            cb(fraction, stage);
        }
    }
}

/// One pluggable shot-boundary algorithm.
///
/// `process_pair` must be a pure function of its two arguments: it may not
/// retain a reference to either frame past the call, and repeated calls
/// with the same two frames must return the same score. This rules out
/// cross-call descriptor caching; every pair recomputes its descriptors
/// from scratch. See DESIGN.md for the tradeoff.
pub trait Detector: Send + Sync {
    /// Stable identifier used in [`DetectionResult::algorithm`], log lines,
    /// and cache keys.
    fn name(&self) -> &'static str;

    fn config(&self) -> &DetectorConfig;

    /// Scores one consecutive frame pair in `[0, 1]`; higher means more
    /// likely to be a shot boundary at `curr`.
    fn process_pair(&self, prev: &Frame, curr: &Frame) -> CoreResult<f64>;

    /// Runs the shared frame-walk loop: reads frames one at a time from
    /// `source`, scores each consecutive pair, and emits a boundary the
    /// first time the score exceeds `config().threshold`, then withholds
    /// further emissions for `config().min_scene_length` frames. This is
    /// only minimal post-processing; the richer multi-stage post-processor
    /// lives in [`crate::postprocess`] and is applied by the orchestrator
    /// on top of the returned dense `scores`.
    fn detect(&self, source: &mut dyn FrameSource, ctx: &DetectContext) -> CoreResult<DetectionResult> {
        let info = source.info();
        let started = Instant::now();

        let mut prev: Option<Frame> = source.next_frame()?;
        let mut index = 0usize;
        let mut scores = Vec::new();
        let mut boundaries = Vec::new();
        let mut frames_since_boundary = self.config().min_scene_length;

        loop {
            if index % ctx.cancellation_check_interval_frames.max(1) == 0 {
                ctx.cancellation.check()?;
            }

            let curr = source.next_frame()?;
            let curr = match curr {
                Some(f) => f,
                None => break,
            };
            let prev_frame = prev.as_ref().expect("loop invariant: prev set before first iteration");

            let score = self.process_pair(prev_frame, &curr)?;
            scores.push(score);

            let frame_index = index + 1;
            if score > self.config().threshold && frames_since_boundary >= self.config().min_scene_length {
                boundaries.push(Boundary::new(frame_index, info.fps, score, BoundaryKind::Cut));
                frames_since_boundary = 0;
            } else {
                frames_since_boundary += 1;
            }

            index += 1;
            if info.frame_count > 1 {
                ctx.report(
                    (index as f64 / (info.frame_count - 1) as f64).min(1.0),
                    self.name(),
                );
            }
            prev = Some(curr);
        }

        Ok(DetectionResult {
            boundaries,
            algorithm: self.name().to_string(),
            processing_time_sec: started.elapsed().as_secs_f64(),
            frame_count: info.frame_count.max(index + 1),
            scores,
            metadata: Default::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_source::memory::InMemoryFrameSource;

    struct ConstantScoreDetector {
        config: DetectorConfig,
        score: f64,
    }

    impl Detector for ConstantScoreDetector {
        fn name(&self) -> &'static str {
            "constant_score"
        }
        fn config(&self) -> &DetectorConfig {
            &self.config
        }
        fn process_pair(&self, _prev: &Frame, _curr: &Frame) -> CoreResult<f64> {
            Ok(self.score)
        }
    }

    #[test]
    fn below_threshold_emits_no_boundaries() {
        let detector = ConstantScoreDetector {
            config: DetectorConfig::default(),
            score: 0.1,
        };
        let mut source =
            InMemoryFrameSource::solid_color_run(30.0, 4, 4, &[([0, 0, 0], 10)]);
        let ctx = DetectContext::new(crate::logging::null_sink(), CancellationToken::new());
        let result = detector.detect(&mut source, &ctx).unwrap();
        assert!(result.boundaries.is_empty());
        assert!(result.boundaries_well_ordered());
    }

    #[test]
    fn above_threshold_respects_min_scene_length() {
        let mut config = DetectorConfig::default();
        config.min_scene_length = 3;
        let detector = ConstantScoreDetector {
            config,
            score: 0.9,
        };
        let mut source =
            InMemoryFrameSource::solid_color_run(30.0, 4, 4, &[([0, 0, 0], 20)]);
        let ctx = DetectContext::new(crate::logging::null_sink(), CancellationToken::new());
        let result = detector.detect(&mut source, &ctx).unwrap();
        assert!(result.boundaries_well_ordered());
        for window in result.boundaries.windows(2) {
            assert!(window[1].frame - window[0].frame >= 3);
        }
    }

    #[test]
    fn cancellation_aborts_the_walk() {
        let detector = ConstantScoreDetector {
            config: DetectorConfig::default(),
            score: 0.0,
        };
        let mut source =
            InMemoryFrameSource::solid_color_run(30.0, 4, 4, &[([0, 0, 0], 1000)]);
        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let ctx = DetectContext::new(crate::logging::null_sink(), cancellation);
        let err = detector.detect(&mut source, &ctx).unwrap_err();
        assert!(matches!(err, crate::error::CoreError::Cancelled));
    }
}
