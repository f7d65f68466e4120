//! Fusion engine: combines several detectors' already-post-processed
//! boundary lists into one ensemble result.

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::model::{Boundary, BoundaryKind, DetectionResult};

/// One detector's contribution to the ensemble: its result plus the weight
/// its votes carry (`detection.multi_detector.fusion_weights`, default 1.0
/// when a detector has no configured weight).
pub struct WeightedResult<'a> {
    pub result: &'a DetectionResult,
    pub weight: f64,
}

struct Vote {
    frame: usize,
    confidence: f64,
    weight: f64,
    algorithm: String,
}

/// Fuses `inputs` by collecting every boundary into one timeline, clustering
/// votes that land within `tolerance_sec` of each other, and collapsing
/// each cluster into one boundary with a weighted-average confidence.
/// Clustering measures distance to each cluster's first member rather than
/// its running centroid, so a cluster's tolerance window is fixed once its
/// first vote lands. A vote never joins a cluster that already contains a
/// vote from the same algorithm: one detector's own sequential boundaries
/// are already spaced apart by its min-scene-length filter and represent
/// distinct cuts, so fusion must not re-collapse them into each other — only
/// agreement between *different* detectors should merge votes.
///
/// All inputs must agree on `frame_count`; otherwise returns
/// [`CoreError::FusionInconsistentInput`].
pub fn fuse(inputs: &[WeightedResult<'_>], fps: f64, tolerance_sec: f64) -> CoreResult<DetectionResult> {
    if inputs.is_empty() {
        return Ok(DetectionResult {
            boundaries: Vec::new(),
            algorithm: "ensemble".to_string(),
            processing_time_sec: 0.0,
            frame_count: 0,
            scores: Vec::new(),
            metadata: Default::default(),
        });
    }

    let frame_count = inputs[0].result.frame_count;
    for input in inputs {
        if input.result.frame_count != frame_count {
            return Err(CoreError::FusionInconsistentInput {
                message: format!(
                    "detector '{}' reports frame_count {} but '{}' reports {}",
                    input.result.algorithm, input.result.frame_count, inputs[0].result.algorithm, frame_count
                ),
            });
        }
    }

    let mut votes: Vec<Vote> = Vec::new();
    for input in inputs {
        for boundary in &input.result.boundaries {
            votes.push(Vote {
                frame: boundary.frame,
                confidence: boundary.confidence,
                weight: input.weight,
                algorithm: input.result.algorithm.clone(),
            });
        }
    }
    votes.sort_by_key(|v| v.frame);

    let tolerance_frames = (tolerance_sec * fps).round().max(0.0) as usize;
    let mut clusters: Vec<Vec<Vote>> = Vec::new();
    for vote in votes {
        let fits_last = clusters
            .last()
            .map(|c| {
                let within_tolerance = c
                    .first()
                    .map(|first| vote.frame.abs_diff(first.frame) <= tolerance_frames)
                    .unwrap_or(false);
                let same_algorithm_already_present =
                    c.iter().any(|v| v.algorithm == vote.algorithm);
                within_tolerance && !same_algorithm_already_present
            })
            .unwrap_or(false);
        if fits_last {
            clusters.last_mut().unwrap().push(vote);
        } else {
            clusters.push(vec![vote]);
        }
    }

    let boundaries: Vec<Boundary> = clusters
        .into_iter()
        .map(|cluster| merge_cluster(cluster, fps))
        .collect();

    let mut metadata = BTreeMap::new();
    metadata.insert(
        "contributing_algorithms".to_string(),
        inputs
            .iter()
            .map(|i| i.result.algorithm.clone())
            .collect::<Vec<_>>()
            .join(","),
    );

    Ok(DetectionResult {
        boundaries,
        algorithm: "ensemble".to_string(),
        processing_time_sec: inputs.iter().map(|i| i.result.processing_time_sec).sum(),
        frame_count,
        scores: Vec::new(),
        metadata,
    })
}

/// Collapses one cluster of votes into a single boundary: frame position is
/// the weighted-average frame of the cluster, confidence is the
/// weighted-average confidence. Falls back to an unweighted mean with
/// confidence 0 when every vote in the cluster has weight 0, so a cluster
/// of all-zero-weight votes still produces a boundary rather than vanishing.
fn merge_cluster(cluster: Vec<Vote>, fps: f64) -> Boundary {
    let total_weight: f64 = cluster.iter().map(|v| v.weight).sum();
    let contributors = cluster.len();

    let (frame, confidence) = if total_weight > 0.0 {
        let frame = cluster
            .iter()
            .map(|v| v.frame as f64 * v.weight)
            .sum::<f64>()
            / total_weight;
        let confidence = cluster
            .iter()
            .map(|v| v.confidence * v.weight)
            .sum::<f64>()
            / total_weight;
        (frame.round() as usize, confidence)
    } else {
        let frame = cluster.iter().map(|v| v.frame as f64).sum::<f64>() / contributors as f64;
        (frame.round() as usize, 0.0)
    };

    let mut metadata = BTreeMap::new();
    metadata.insert("cluster_size".to_string(), contributors.to_string());
    let mut algorithms: Vec<String> = cluster.iter().map(|v| v.algorithm.clone()).collect();
    algorithms.sort();
    algorithms.dedup();
    metadata.insert("contributing_algorithms".to_string(), algorithms.join(","));

    Boundary::new(frame, fps, confidence, BoundaryKind::Cut).with_metadata(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(algorithm: &str, frames: &[usize], frame_count: usize) -> DetectionResult {
        DetectionResult {
            boundaries: frames
                .iter()
                .map(|&f| Boundary::new(f, 30.0, 0.8, BoundaryKind::Cut))
                .collect(),
            algorithm: algorithm.to_string(),
            processing_time_sec: 0.1,
            frame_count,
            scores: Vec::new(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn single_detector_weight_one_is_identity() {
        let r = result("frame_difference", &[10, 40, 90], 100);
        let inputs = vec![WeightedResult {
            result: &r,
            weight: 1.0,
        }];
        let fused = fuse(&inputs, 30.0, 1.0).unwrap();
        let frames: Vec<usize> = fused.boundaries.iter().map(|b| b.frame).collect();
        assert_eq!(frames, vec![10, 40, 90]);
    }

    #[test]
    fn mismatched_frame_counts_are_rejected() {
        let r1 = result("a", &[1], 100);
        let r2 = result("b", &[1], 200);
        let inputs = vec![
            WeightedResult { result: &r1, weight: 1.0 },
            WeightedResult { result: &r2, weight: 1.0 },
        ];
        let err = fuse(&inputs, 30.0, 1.0).unwrap_err();
        assert!(matches!(err, CoreError::FusionInconsistentInput { .. }));
    }

    #[test]
    fn close_votes_from_different_detectors_cluster_together() {
        let r1 = result("frame_difference", &[50], 200);
        let r2 = result("histogram", &[52], 200);
        let inputs = vec![
            WeightedResult { result: &r1, weight: 1.0 },
            WeightedResult { result: &r2, weight: 1.0 },
        ];
        // tolerance_sec * fps = 1.0 * 30 = 30 frames, well within range.
        let fused = fuse(&inputs, 30.0, 1.0).unwrap();
        assert_eq!(fused.boundaries.len(), 1);
        assert_eq!(fused.boundaries[0].metadata.get("cluster_size").unwrap(), "2");
    }
}
