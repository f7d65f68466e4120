//! Core data model: value objects created by producers, consumed by
//! callers, and never mutated after emission.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata attached to a [`Boundary`] or [`Segment`] by its producer.
/// A `BTreeMap` keeps serialization and equality checks deterministic.
pub type Metadata = BTreeMap<String, String>;

/// Kind of shot transition a [`Boundary`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    Cut,
    Fade,
    Dissolve,
    Start,
    End,
}

impl BoundaryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BoundaryKind::Cut => "cut",
            BoundaryKind::Fade => "fade",
            BoundaryKind::Dissolve => "dissolve",
            BoundaryKind::Start => "start",
            BoundaryKind::End => "end",
        }
    }
}

/// A detected shot transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub frame: usize,
    pub timestamp: f64,
    pub confidence: f64,
    pub kind: BoundaryKind,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Boundary {
    pub fn new(frame: usize, fps: f64, confidence: f64, kind: BoundaryKind) -> Self {
        Boundary {
            frame,
            timestamp: frame as f64 / fps,
            confidence,
            kind,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Result of running one detector (or the fusion engine) end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub boundaries: Vec<Boundary>,
    pub algorithm: String,
    pub processing_time_sec: f64,
    pub frame_count: usize,
    /// Dense per-transition score sequence (length = frame_count - 1 for
    /// pairwise detectors, or sampled_frames - 1 for sampled detectors).
    #[serde(default)]
    pub scores: Vec<f64>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DetectionResult {
    /// Checks that boundary frame indices are strictly increasing and each
    /// lies in `[0, frame_count)`.
    pub fn boundaries_well_ordered(&self) -> bool {
        let mut prev: Option<usize> = None;
        for boundary in &self.boundaries {
            if boundary.frame >= self.frame_count {
                return false;
            }
            if let Some(prev_frame) = prev {
                if boundary.frame <= prev_frame {
                    return false;
                }
            }
            prev = Some(boundary.frame);
        }
        true
    }
}

/// A half-open `[start_frame, end_frame)` interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub start_frame: usize,
    pub end_frame: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Segment {
    pub fn frame_len(&self) -> usize {
        self.end_frame - self.start_frame
    }
}

/// Metadata about the source video, needed by the Segmenter and Orchestrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub fps: f64,
    pub frame_count: usize,
    pub duration_sec: f64,
}

impl VideoMetadata {
    pub fn new(fps: f64, frame_count: usize) -> Self {
        VideoMetadata {
            fps,
            frame_count,
            duration_sec: frame_count as f64 / fps,
        }
    }
}
