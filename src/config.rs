//! Typed configuration for detectors, fusion, segmentation, caching, and
//! runtime knobs.
//!
//! Unknown dotted keys from a configuration provider are a logged warning,
//! not an error.

use std::collections::BTreeMap;

use crate::logging::{Level, SharedSink};

/// Color space used by the histogram family of detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Rgb,
    Hsv,
    Lab,
}

impl ColorSpace {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorSpace::Rgb => "RGB",
            ColorSpace::Hsv => "HSV",
            ColorSpace::Lab => "LAB",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RGB" => Some(ColorSpace::Rgb),
            "HSV" => Some(ColorSpace::Hsv),
            "LAB" => Some(ColorSpace::Lab),
            _ => None,
        }
    }
}

/// Immutable tuning knobs for one detector instance.
///
/// Both detector families share this bag; fields meaningless to a given
/// detector are simply unused by it. Canonicalized key/value pairs feed the
/// cache key digest.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub threshold: f64,
    pub min_scene_length: usize,
    pub resize_height: u32,
    pub color_space: ColorSpace,
    pub bins: u32,
    pub adaptation_window: usize,
    pub grid_size: u32,
    pub edge_enhancement: bool,
    pub motion_compensation: bool,
    pub adaptive_threshold: bool,
    pub use_spatial_histogram: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            threshold: 0.3,
            min_scene_length: 15,
            resize_height: 240,
            color_space: ColorSpace::Rgb,
            bins: 256,
            adaptation_window: 30,
            grid_size: 4,
            edge_enhancement: false,
            motion_compensation: false,
            adaptive_threshold: false,
            use_spatial_histogram: false,
        }
    }
}

impl DetectorConfig {
    /// Default config for the histogram family (threshold 0.4).
    pub fn histogram_defaults() -> Self {
        DetectorConfig {
            threshold: 0.4,
            ..DetectorConfig::default()
        }
    }

    /// Canonical, sorted `(key, value)` pairs used to build the cache key
    /// digest.
    pub fn canonical_pairs(&self) -> BTreeMap<&'static str, String> {
        let mut pairs = BTreeMap::new();
        pairs.insert("threshold", format!("{:.6}", self.threshold));
        pairs.insert("min_scene_length", self.min_scene_length.to_string());
        pairs.insert("resize_height", self.resize_height.to_string());
        pairs.insert("color_space", self.color_space.as_str().to_string());
        pairs.insert("bins", self.bins.to_string());
        pairs.insert("adaptation_window", self.adaptation_window.to_string());
        pairs.insert("grid_size", self.grid_size.to_string());
        pairs.insert("edge_enhancement", self.edge_enhancement.to_string());
        pairs.insert(
            "motion_compensation",
            self.motion_compensation.to_string(),
        );
        pairs.insert("adaptive_threshold", self.adaptive_threshold.to_string());
        pairs.insert(
            "use_spatial_histogram",
            self.use_spatial_histogram.to_string(),
        );
        pairs
    }
}

/// Which built-in detector kind a config section targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorKind {
    FrameDifference,
    EnhancedFrameDifference,
    Histogram,
    MultiChannelHistogram,
    AdaptiveHistogram,
}

impl DetectorKind {
    pub fn id(self) -> &'static str {
        match self {
            DetectorKind::FrameDifference => "frame_difference",
            DetectorKind::EnhancedFrameDifference => "enhanced_frame_difference",
            DetectorKind::Histogram => "histogram",
            DetectorKind::MultiChannelHistogram => "multi_channel_histogram",
            DetectorKind::AdaptiveHistogram => "adaptive_histogram",
        }
    }
}

/// One entry in the detector set the orchestrator is asked to run.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSpec {
    pub kind: DetectorKind,
    pub config: DetectorConfig,
    pub weight: Option<f64>,
}

/// `detection.default_detector`: which built-in detector (or ensemble) a
/// caller gets when it asks for "the default" rather than naming one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultDetector {
    FrameDifference,
    Histogram,
    Multi,
}

impl DefaultDetector {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "frame_difference" => Some(DefaultDetector::FrameDifference),
            "histogram" => Some(DefaultDetector::Histogram),
            "multi" => Some(DefaultDetector::Multi),
            _ => None,
        }
    }
}

impl Default for DefaultDetector {
    fn default() -> Self {
        DefaultDetector::Multi
    }
}

/// `detection.frame_difference.*` and `detection.histogram.*`: the default
/// tuning each detector family gets before any per-run override.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    pub default_detector: DefaultDetector,
    pub frame_difference: DetectorConfig,
    pub histogram: DetectorConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            default_detector: DefaultDetector::default(),
            frame_difference: DetectorConfig::default(),
            histogram: DetectorConfig::histogram_defaults(),
        }
    }
}

/// Weighted fusion of multiple detectors' boundary votes.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    pub fusion_weights: BTreeMap<String, f64>,
    pub time_tolerance_sec: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            fusion_weights: BTreeMap::new(),
            time_tolerance_sec: 1.0,
        }
    }
}

/// Controls how boundaries are turned into final scene segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationConfig {
    pub min_segment_duration_sec: f64,
    pub max_segment_duration_sec: f64,
    pub merge_short_segments: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        SegmentationConfig {
            min_segment_duration_sec: 1.0,
            max_segment_duration_sec: 300.0,
            merge_short_segments: false,
        }
    }
}

/// Detection-result cache settings. Corrupt or stale-format blobs are always treated as
/// a miss and removed (see [`crate::cache::Cache::lookup`]) — there is no
/// alternate policy to select here.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub directory: std::path::PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            directory: std::path::PathBuf::from(".shotbound-cache"),
        }
    }
}

/// Worker pool and cancellation-polling knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeConfig {
    pub max_workers: usize,
    pub cancellation_check_interval_frames: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            cancellation_check_interval_frames: 30,
        }
    }
}

/// Top-level typed configuration record assembling every config namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    pub detection: DetectionConfig,
    pub fusion: FusionConfig,
    pub segmentation: SegmentationConfig,
    pub cache: CacheConfig,
    pub runtime: RuntimeConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            detection: DetectionConfig::default(),
            fusion: FusionConfig::default(),
            segmentation: SegmentationConfig::default(),
            cache: CacheConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// A single typed value a configuration provider may supply for a dotted
/// key.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
}

impl CoreConfig {
    /// Builds a config from a dotted-key map, logging unknown keys as a
    /// warning rather than failing.
    pub fn from_key_values(
        values: &BTreeMap<String, ConfigValue>,
        sink: &SharedSink,
    ) -> CoreConfig {
        let mut config = CoreConfig::default();
        for (key, value) in values {
            if let Some(weight_key) = key.strip_prefix("detection.multi_detector.fusion_weights.") {
                if let ConfigValue::Float(v) = value {
                    config.fusion.fusion_weights.insert(weight_key.to_string(), *v);
                    continue;
                }
            }

            match (key.as_str(), value) {
                ("detection.default_detector", ConfigValue::Str(v)) => {
                    match DefaultDetector::parse(v) {
                        Some(parsed) => config.detection.default_detector = parsed,
                        None => sink.log(
                            Level::Warn,
                            "config",
                            &format!("unrecognized detection.default_detector value: {v}"),
                        ),
                    }
                }
                ("detection.frame_difference.threshold", ConfigValue::Float(v)) => {
                    config.detection.frame_difference.threshold = *v;
                }
                ("detection.frame_difference.min_scene_length", ConfigValue::Int(v)) if *v > 0 => {
                    config.detection.frame_difference.min_scene_length = *v as usize;
                }
                ("detection.frame_difference.resize_height", ConfigValue::Int(v)) if *v > 0 => {
                    config.detection.frame_difference.resize_height = *v as u32;
                }
                ("detection.frame_difference.edge_enhancement", ConfigValue::Bool(v)) => {
                    config.detection.frame_difference.edge_enhancement = *v;
                }
                ("detection.frame_difference.motion_compensation", ConfigValue::Bool(v)) => {
                    config.detection.frame_difference.motion_compensation = *v;
                }
                ("detection.frame_difference.adaptive_threshold", ConfigValue::Bool(v)) => {
                    config.detection.frame_difference.adaptive_threshold = *v;
                }
                ("detection.histogram.threshold", ConfigValue::Float(v)) => {
                    config.detection.histogram.threshold = *v;
                }
                ("detection.histogram.bins", ConfigValue::Int(v)) if *v > 0 => {
                    config.detection.histogram.bins = *v as u32;
                }
                ("detection.histogram.color_space", ConfigValue::Str(v)) => {
                    match ColorSpace::parse(v) {
                        Some(parsed) => config.detection.histogram.color_space = parsed,
                        None => sink.log(
                            Level::Warn,
                            "config",
                            &format!("unrecognized detection.histogram.color_space value: {v}"),
                        ),
                    }
                }
                ("detection.histogram.min_scene_length", ConfigValue::Int(v)) if *v > 0 => {
                    config.detection.histogram.min_scene_length = *v as usize;
                }
                ("detection.histogram.grid_size", ConfigValue::Int(v)) if *v > 0 => {
                    config.detection.histogram.grid_size = *v as u32;
                }
                ("detection.histogram.use_spatial_histogram", ConfigValue::Bool(v)) => {
                    config.detection.histogram.use_spatial_histogram = *v;
                }
                ("detection.histogram.adaptation_window", ConfigValue::Int(v)) if *v > 0 => {
                    config.detection.histogram.adaptation_window = *v as usize;
                }
                ("detection.histogram.edge_enhancement", ConfigValue::Bool(v)) => {
                    config.detection.histogram.edge_enhancement = *v;
                }
                ("detection.histogram.motion_compensation", ConfigValue::Bool(v)) => {
                    config.detection.histogram.motion_compensation = *v;
                }
                ("detection.histogram.adaptive_threshold", ConfigValue::Bool(v)) => {
                    config.detection.histogram.adaptive_threshold = *v;
                }
                ("segmentation.min_segment_duration_sec", ConfigValue::Float(v)) => {
                    config.segmentation.min_segment_duration_sec = *v;
                }
                ("segmentation.max_segment_duration_sec", ConfigValue::Float(v)) => {
                    config.segmentation.max_segment_duration_sec = *v;
                }
                ("segmentation.merge_short_segments", ConfigValue::Bool(v)) => {
                    config.segmentation.merge_short_segments = *v;
                }
                ("detection.multi_detector.time_tolerance_sec", ConfigValue::Float(v)) => {
                    config.fusion.time_tolerance_sec = *v;
                }
                ("cache.enabled", ConfigValue::Bool(v)) => {
                    config.cache.enabled = *v;
                }
                ("cache.directory", ConfigValue::Str(v)) => {
                    config.cache.directory = std::path::PathBuf::from(v);
                }
                ("runtime.max_workers", ConfigValue::Int(v)) if *v > 0 => {
                    config.runtime.max_workers = *v as usize;
                }
                ("runtime.cancellation_check_interval_frames", ConfigValue::Int(v))
                    if *v > 0 =>
                {
                    config.runtime.cancellation_check_interval_frames = *v as usize;
                }
                _ => {
                    sink.log(
                        Level::Warn,
                        "config",
                        &format!("unrecognized configuration key: {key}"),
                    );
                }
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pairs_are_sorted_and_stable() {
        let config = DetectorConfig::default();
        let pairs = config.canonical_pairs();
        let keys: Vec<_> = pairs.keys().collect();
        let mut sorted_keys = keys.clone();
        sorted_keys.sort();
        assert_eq!(keys, sorted_keys);
    }

    #[test]
    fn recognized_detection_keys_take_effect() {
        let mut values = BTreeMap::new();
        values.insert(
            "detection.default_detector".to_string(),
            ConfigValue::Str("histogram".to_string()),
        );
        values.insert(
            "detection.frame_difference.threshold".to_string(),
            ConfigValue::Float(0.55),
        );
        values.insert(
            "detection.frame_difference.edge_enhancement".to_string(),
            ConfigValue::Bool(true),
        );
        values.insert(
            "detection.histogram.motion_compensation".to_string(),
            ConfigValue::Bool(true),
        );
        values.insert(
            "detection.histogram.adaptive_threshold".to_string(),
            ConfigValue::Bool(true),
        );
        values.insert(
            "detection.multi_detector.fusion_weights.histogram".to_string(),
            ConfigValue::Float(2.0),
        );
        values.insert(
            "detection.multi_detector.default_detector".to_string(),
            ConfigValue::Str("not_a_real_key".to_string()),
        );
        let sink = crate::logging::null_sink();
        let config = CoreConfig::from_key_values(&values, &sink);

        assert_eq!(config.detection.default_detector, DefaultDetector::Histogram);
        assert!((config.detection.frame_difference.threshold - 0.55).abs() < 1e-9);
        assert!(config.detection.frame_difference.edge_enhancement);
        assert!(config.detection.histogram.motion_compensation);
        assert!(config.detection.histogram.adaptive_threshold);
        assert_eq!(config.fusion.fusion_weights.get("histogram"), Some(&2.0));
    }

    #[test]
    fn unknown_key_logs_warning_not_error() {
        let mut values = BTreeMap::new();
        values.insert(
            "detection.frame_difference.nonsense".to_string(),
            ConfigValue::Bool(true),
        );
        let sink = crate::logging::null_sink();
        // Must not panic; unknown keys are advisory only.
        let _ = CoreConfig::from_key_values(&values, &sink);
    }
}
