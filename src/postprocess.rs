//! Post-processor: turns one detector's dense score sequence into a final
//! boundary list, independent of any other detector. Operates purely on
//! `&[f64]`/`&[Boundary]` — no frame access.

use crate::model::{Boundary, BoundaryKind};

/// Sliding-window mean smoothing (default window 5).
pub fn smooth_scores(scores: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let half = window / 2;
    (0..scores.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(scores.len());
            let slice = &scores[lo..hi];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// The 85th-percentile score, used as the adaptive global threshold.
/// Returns 0 for an empty input.
pub fn adaptive_threshold(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let rank = ((sorted.len() as f64 - 1.0) * 0.85).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Finds local maxima above `threshold`, enforcing a minimum separation of
/// `min_distance` indices — ties within that distance keep the earlier,
/// higher-scoring index. Callers typically pass `min_scene_length` (default
/// 15) as `min_distance`.
pub fn find_peaks(scores: &[f64], threshold: f64, min_distance: usize) -> Vec<usize> {
    let mut candidates: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, &s)| s > threshold)
        .map(|(i, _)| i)
        .collect();
    candidates.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap()
            .then(a.cmp(&b))
    });

    let mut accepted: Vec<usize> = Vec::new();
    for candidate in candidates {
        let too_close = accepted
            .iter()
            .any(|&a| a.abs_diff(candidate) < min_distance);
        if !too_close {
            accepted.push(candidate);
        }
    }
    accepted.sort_unstable();
    accepted
}

/// Walks `boundaries` in order, keeping a boundary only if it is at least
/// `min_scene_length` frames past the last *kept* boundary. No confidence
/// comparison: the earlier boundary always wins and later ones within the
/// window are dropped outright.
pub fn filter_min_scene_length(boundaries: &[Boundary], min_scene_length: usize) -> Vec<Boundary> {
    let mut out: Vec<Boundary> = Vec::new();
    let mut last_kept_frame: Option<usize> = None;
    for boundary in boundaries {
        let keep = match last_kept_frame {
            Some(last) => boundary.frame - last >= min_scene_length,
            None => true,
        };
        if keep {
            last_kept_frame = Some(boundary.frame);
            out.push(boundary.clone());
        }
    }
    out
}

/// Drops boundaries whose confidence is below `floor` (default floor 0.1).
pub fn filter_confidence_floor(boundaries: &[Boundary], floor: f64) -> Vec<Boundary> {
    boundaries.iter().filter(|b| b.confidence >= floor).cloned().collect()
}

/// Merges boundaries within `tolerance_sec` seconds of each other, keeping
/// the higher-confidence one (earlier index on exact tie). Used to collapse
/// near-duplicate boundaries from the same detector before fusion.
pub fn dedup_close_boundaries(boundaries: &[Boundary], tolerance_sec: f64) -> Vec<Boundary> {
    let mut sorted = boundaries.to_vec();
    sorted.sort_by(|a, b| a.frame.cmp(&b.frame));

    let mut out: Vec<Boundary> = Vec::new();
    for boundary in sorted {
        match out.last() {
            Some(last) if (boundary.timestamp - last.timestamp).abs() <= tolerance_sec => {
                if boundary.confidence > last.confidence {
                    *out.last_mut().unwrap() = boundary;
                }
            }
            _ => out.push(boundary),
        }
    }
    out
}

/// Full C3 pipeline: smooth, derive an adaptive threshold unless the caller
/// supplies a fixed one, find peaks, turn peaks into `Cut` boundaries at
/// `fps`, then apply the minimum scene length and confidence floor filters.
pub fn process(
    scores: &[f64],
    fps: f64,
    fixed_threshold: Option<f64>,
    min_scene_length: usize,
    confidence_floor: f64,
) -> Vec<Boundary> {
    let smoothed = smooth_scores(scores, 5);
    let threshold = fixed_threshold.unwrap_or_else(|| adaptive_threshold(&smoothed));
    let peaks = find_peaks(&smoothed, threshold, min_scene_length);

    let boundaries: Vec<Boundary> = peaks
        .into_iter()
        .map(|idx| Boundary::new(idx + 1, fps, smoothed[idx], BoundaryKind::Cut))
        .collect();

    let boundaries = filter_min_scene_length(&boundaries, min_scene_length);
    filter_confidence_floor(&boundaries, confidence_floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothing_preserves_length() {
        let scores = vec![0.1, 0.9, 0.1, 0.1, 0.8, 0.1];
        assert_eq!(smooth_scores(&scores, 3).len(), scores.len());
    }

    #[test]
    fn adaptive_threshold_of_constant_scores_equals_that_constant() {
        let scores = vec![0.4; 20];
        assert!((adaptive_threshold(&scores) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn find_peaks_enforces_min_distance() {
        let scores = vec![0.0, 0.9, 0.9, 0.0, 0.0, 0.9, 0.0];
        let peaks = find_peaks(&scores, 0.5, 3);
        for window in peaks.windows(2) {
            assert!(window[1] - window[0] >= 3);
        }
    }

    #[test]
    fn dedup_keeps_higher_confidence_within_tolerance() {
        let a = Boundary::new(30, 30.0, 0.4, BoundaryKind::Cut);
        let b = Boundary::new(33, 30.0, 0.8, BoundaryKind::Cut);
        let out = dedup_close_boundaries(&[a, b], 1.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].frame, 33);
    }

    #[test]
    fn min_scene_length_drops_the_later_boundary_even_if_more_confident() {
        let boundaries = vec![
            Boundary::new(40, 30.0, 0.5, BoundaryKind::Cut),
            Boundary::new(45, 30.0, 0.6, BoundaryKind::Cut),
            Boundary::new(80, 30.0, 0.55, BoundaryKind::Cut),
        ];
        let out = filter_min_scene_length(&boundaries, 15);
        let frames: Vec<usize> = out.iter().map(|b| b.frame).collect();
        assert_eq!(frames, vec![40, 80]);
    }

    #[test]
    fn confidence_floor_drops_low_confidence_boundaries() {
        let low = Boundary::new(5, 30.0, 0.05, BoundaryKind::Cut);
        let high = Boundary::new(10, 30.0, 0.5, BoundaryKind::Cut);
        let out = filter_confidence_floor(&[low, high], 0.1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].frame, 10);
    }
}
