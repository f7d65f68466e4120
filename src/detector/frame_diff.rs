//! Frame-difference detectors.

use super::util::{
    enhance_edges, estimate_translation, gaussian_blur_rgb, gradient_diff, mean_abs_diff_gray,
    resize_shorter_side, ssim_distance, to_gray, warp_translate,
};
use super::Detector;
use crate::config::DetectorConfig;
use crate::error::CoreResult;
use crate::frame_source::Frame;

/// Blurred-grayscale mean absolute difference.
pub struct FrameDifferenceDetector {
    config: DetectorConfig,
}

impl FrameDifferenceDetector {
    pub fn new(config: DetectorConfig) -> Self {
        FrameDifferenceDetector { config }
    }

    fn preprocess(&self, frame: &Frame) -> image::GrayImage {
        let rgb = resize_shorter_side(&frame.to_rgb_image(), self.config.resize_height);
        let blurred = gaussian_blur_rgb(&rgb);
        to_gray(&blurred)
    }
}

impl Default for FrameDifferenceDetector {
    fn default() -> Self {
        FrameDifferenceDetector::new(DetectorConfig::default())
    }
}

impl Detector for FrameDifferenceDetector {
    fn name(&self) -> &'static str {
        "frame_difference"
    }

    fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn process_pair(&self, prev: &Frame, curr: &Frame) -> CoreResult<f64> {
        let prev_gray = self.preprocess(prev);
        let curr_gray = self.preprocess(curr);
        Ok(mean_abs_diff_gray(&prev_gray, &curr_gray))
    }
}

/// Weighted combination of pixel difference, `1 - SSIM`, and gradient
/// difference, with optional edge enhancement and motion compensation.
/// Weights are fixed at `[0.4, 0.3, 0.3]`.
pub struct EnhancedFrameDifferenceDetector {
    config: DetectorConfig,
}

impl EnhancedFrameDifferenceDetector {
    const WEIGHTS: [f64; 3] = [0.4, 0.3, 0.3];

    pub fn new(config: DetectorConfig) -> Self {
        EnhancedFrameDifferenceDetector { config }
    }

    fn preprocess(&self, frame: &Frame) -> image::RgbImage {
        resize_shorter_side(&frame.to_rgb_image(), self.config.resize_height)
    }
}

impl Default for EnhancedFrameDifferenceDetector {
    fn default() -> Self {
        EnhancedFrameDifferenceDetector::new(DetectorConfig::default())
    }
}

impl Detector for EnhancedFrameDifferenceDetector {
    fn name(&self) -> &'static str {
        "enhanced_frame_difference"
    }

    fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn process_pair(&self, prev: &Frame, curr: &Frame) -> CoreResult<f64> {
        let prev_rgb = self.preprocess(prev);
        let mut curr_rgb = self.preprocess(curr);

        if self.config.motion_compensation {
            let prev_gray_for_flow = to_gray(&prev_rgb);
            let curr_gray_for_flow = to_gray(&curr_rgb);
            let (dx, dy) = estimate_translation(&prev_gray_for_flow, &curr_gray_for_flow);
            curr_rgb = warp_translate(&curr_rgb, -dx, -dy);
        }

        let mut prev_gray = to_gray(&prev_rgb);
        let mut curr_gray = to_gray(&curr_rgb);
        if self.config.edge_enhancement {
            prev_gray = enhance_edges(&prev_gray);
            curr_gray = enhance_edges(&curr_gray);
        }

        let pixel_score = mean_abs_diff_gray(&prev_gray, &curr_gray);
        let ssim_score = ssim_distance(&prev_gray, &curr_gray);
        let gradient_score = gradient_diff(&prev_gray, &curr_gray);

        Ok(Self::WEIGHTS[0] * pixel_score + Self::WEIGHTS[1] * ssim_score + Self::WEIGHTS[2] * gradient_score)
    }
}
