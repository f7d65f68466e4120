//! Histogram-based detectors.

use super::util::{
    color_histogram, concat_histograms, edge_orientation_histogram, histogram_score,
    resize_shorter_side, spatial_histograms, to_gray, Histogram,
};
use super::Detector;
use crate::config::DetectorConfig;
use crate::error::CoreResult;
use crate::frame_source::Frame;

fn preprocess(frame: &Frame, resize_height: u32) -> image::RgbImage {
    resize_shorter_side(&frame.to_rgb_image(), resize_height)
}

/// Global per-channel color histogram compared by a weighted blend of four
/// distance measures.
pub struct HistogramDetector {
    config: DetectorConfig,
}

impl HistogramDetector {
    pub fn new(config: DetectorConfig) -> Self {
        HistogramDetector { config }
    }
}

impl Default for HistogramDetector {
    fn default() -> Self {
        HistogramDetector::new(DetectorConfig::histogram_defaults())
    }
}

impl Detector for HistogramDetector {
    fn name(&self) -> &'static str {
        "histogram"
    }

    fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn process_pair(&self, prev: &Frame, curr: &Frame) -> CoreResult<f64> {
        let prev_rgb = preprocess(prev, self.config.resize_height);
        let curr_rgb = preprocess(curr, self.config.resize_height);
        let bins_per_channel = (self.config.bins / 4).max(2);
        let h1 = color_histogram(&prev_rgb, bins_per_channel, self.config.color_space);
        let h2 = color_histogram(&curr_rgb, bins_per_channel, self.config.color_space);
        Ok(histogram_score(&h1, &h2))
    }
}

/// Global histogram plus a spatial grid of block histograms plus a
/// Canny-edge-orientation histogram, concatenated before scoring.
pub struct MultiChannelHistogramDetector {
    config: DetectorConfig,
}

impl MultiChannelHistogramDetector {
    pub fn new(config: DetectorConfig) -> Self {
        MultiChannelHistogramDetector { config }
    }

    fn descriptor(&self, frame: &Frame) -> Histogram {
        let rgb = preprocess(frame, self.config.resize_height);
        let bins_per_channel = (self.config.bins / 8).max(2);
        let global = color_histogram(&rgb, bins_per_channel, self.config.color_space);
        let spatial = spatial_histograms(&rgb, self.config.grid_size, bins_per_channel, self.config.color_space);
        let gray = to_gray(&rgb);
        let edges = edge_orientation_histogram(&gray, 18);
        concat_histograms(std::iter::once(global).chain(spatial).chain(std::iter::once(edges)))
    }
}

impl Default for MultiChannelHistogramDetector {
    fn default() -> Self {
        let mut config = DetectorConfig::histogram_defaults();
        config.use_spatial_histogram = true;
        MultiChannelHistogramDetector::new(config)
    }
}

impl Detector for MultiChannelHistogramDetector {
    fn name(&self) -> &'static str {
        "multi_channel_histogram"
    }

    fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn process_pair(&self, prev: &Frame, curr: &Frame) -> CoreResult<f64> {
        let h1 = self.descriptor(prev);
        let h2 = self.descriptor(curr);
        Ok(histogram_score(&h1, &h2))
    }
}

/// Wraps a base histogram detector: runs it once to obtain a dense score
/// sequence, then re-derives boundaries with a per-index local threshold
/// `mean + k*stddev` over a `±adaptation_window/2`-frame window, keeping
/// only scores that also clear the base detector's global threshold. `k`
/// is fixed at 2: in a near-flat region the
/// local stddev collapses toward zero, so the effective threshold tracks
/// the local mean closely and the detector behaves like a plain
/// above-the-mean test; away from flat regions a larger local spread keeps
/// it conservative.
pub struct AdaptiveHistogramDetector {
    config: DetectorConfig,
    base: HistogramDetector,
}

impl AdaptiveHistogramDetector {
    const K: f64 = 2.0;

    pub fn new(config: DetectorConfig) -> Self {
        let base = HistogramDetector::new(config.clone());
        AdaptiveHistogramDetector { config, base }
    }

    /// Computes the dense score sequence via the base detector, then the
    /// adaptively-thresholded boundary-eligible mask for each index.
    pub fn adaptive_mask(&self, scores: &[f64]) -> Vec<bool> {
        let half_window = (self.config.adaptation_window / 2).max(1);
        scores
            .iter()
            .enumerate()
            .map(|(i, &score)| {
                let lo = i.saturating_sub(half_window);
                let hi = (i + half_window + 1).min(scores.len());
                let window = &scores[lo..hi];
                let n = window.len() as f64;
                let mean = window.iter().sum::<f64>() / n;
                let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let local_threshold = mean + Self::K * variance.sqrt();
                score > local_threshold && score > self.config.threshold
            })
            .collect()
    }
}

impl Default for AdaptiveHistogramDetector {
    fn default() -> Self {
        let mut config = DetectorConfig::histogram_defaults();
        config.adaptive_threshold = true;
        AdaptiveHistogramDetector::new(config)
    }
}

impl Detector for AdaptiveHistogramDetector {
    fn name(&self) -> &'static str {
        "adaptive_histogram"
    }

    fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn process_pair(&self, prev: &Frame, curr: &Frame) -> CoreResult<f64> {
        self.base.process_pair(prev, curr)
    }

    fn detect(
        &self,
        source: &mut dyn crate::frame_source::FrameSource,
        ctx: &super::DetectContext,
    ) -> CoreResult<crate::model::DetectionResult> {
        let fps = source.info().fps;
        let mut base_result = self.base.detect(source, ctx)?;
        let mask = self.adaptive_mask(&base_result.scores);

        let mut boundaries = Vec::new();
        let mut frames_since_boundary = self.config.min_scene_length;
        for (i, eligible) in mask.iter().enumerate() {
            frames_since_boundary += 1;
            if *eligible && frames_since_boundary >= self.config.min_scene_length {
                boundaries.push(crate::model::Boundary::new(
                    i + 1,
                    fps,
                    base_result.scores[i],
                    crate::model::BoundaryKind::Cut,
                ));
                frames_since_boundary = 0;
            }
        }

        base_result.algorithm = self.name().to_string();
        base_result.boundaries = boundaries;
        Ok(base_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{DetectContext, Detector as _};
    use crate::frame_source::memory::InMemoryFrameSource;

    #[test]
    fn identical_color_frames_score_zero() {
        let detector = HistogramDetector::default();
        let mut source = InMemoryFrameSource::solid_color_run(30.0, 16, 16, &[([50, 60, 70], 4)]);
        let ctx = DetectContext::new(crate::logging::null_sink(), crate::cancel::CancellationToken::new());
        let result = detector.detect(&mut source, &ctx).unwrap();
        assert!(result.scores.iter().all(|&s| s < 1e-9));
    }

    #[test]
    fn color_shift_is_detected() {
        let mut config = DetectorConfig::histogram_defaults();
        config.threshold = 0.1;
        let detector = HistogramDetector::new(config);
        let mut source = InMemoryFrameSource::solid_color_run(
            30.0,
            16,
            16,
            &[([0, 0, 0], 5), ([255, 0, 0], 5)],
        );
        let ctx = DetectContext::new(crate::logging::null_sink(), crate::cancel::CancellationToken::new());
        let result = detector.detect(&mut source, &ctx).unwrap();
        assert!(!result.boundaries.is_empty());
    }

    #[test]
    fn adaptive_mask_flags_the_outlier_window() {
        let detector = AdaptiveHistogramDetector::default();
        let mut scores = vec![0.01; 40];
        scores[20] = 0.5;
        let mask = detector.adaptive_mask(&scores);
        assert!(mask[20]);
        assert!(!mask[5]);
    }

    #[test]
    fn multi_channel_descriptor_is_longer_than_global_alone() {
        let detector = MultiChannelHistogramDetector::default();
        let frame = Frame::new(16, 16, vec![30u8; 16 * 16 * 3]);
        let descriptor = detector.descriptor(&frame);
        let global_only = color_histogram(&preprocess(&frame, detector.config.resize_height), 4, detector.config.color_space);
        assert!(descriptor.len() > global_only.len());
    }
}
