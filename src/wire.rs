//! Wire format: the JSON representation used both for on-disk cache blobs
//! and for the CLI's `--output` file.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::model::{DetectionResult, Metadata, Segment};

/// One cached detection result plus the format version it was written
/// with. Absence of a recognized `version` field (or any other structural
/// mismatch) makes a blob indistinguishable from corrupt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: u32,
    pub result: DetectionResult,
}

pub fn encode_cache_entry(version: u32, result: &DetectionResult) -> Vec<u8> {
    let entry = CacheEntry {
        version,
        result: result.clone(),
    };
    serde_json::to_vec(&entry).expect("DetectionResult always serializes")
}

pub fn decode_cache_entry(bytes: &[u8]) -> CoreResult<CacheEntry> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::CacheCorrupt { key: e.to_string() })
}

/// The `--output` report: boundaries plus the derived segments, with the
/// detector/ensemble identifier that produced them. `metadata` is required
/// in v2, unlike the optional `scores`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub version: u32,
    pub algorithm: String,
    pub frame_count: usize,
    pub processing_time_sec: f64,
    pub boundaries: Vec<crate::model::Boundary>,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub scores: Vec<f64>,
    pub metadata: Metadata,
}

pub const REPORT_FORMAT_VERSION: u32 = 2;

pub fn encode_report(result: &DetectionResult, segments: &[Segment]) -> Vec<u8> {
    let envelope = ReportEnvelope {
        version: REPORT_FORMAT_VERSION,
        algorithm: result.algorithm.clone(),
        frame_count: result.frame_count,
        processing_time_sec: result.processing_time_sec,
        boundaries: result.boundaries.clone(),
        segments: segments.to_vec(),
        scores: result.scores.clone(),
        metadata: result.metadata.clone(),
    };
    serde_json::to_vec_pretty(&envelope).expect("ReportEnvelope always serializes")
}
