//! End-to-end scenarios run against synthetic, in-memory clips — no real
//! video file or decoder involved, just the orchestrator wired to
//! deterministic solid-color frame runs.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use shotbound_core::cache::VideoFingerprint;
use shotbound_core::cancel::CancellationToken;
use shotbound_core::config::{ColorSpace, CoreConfig, DetectorConfig, DetectorKind, DetectorSpec};
use shotbound_core::frame_source::memory::InMemoryFrameSource;
use shotbound_core::frame_source::FrameSource;
use shotbound_core::logging::null_sink;
use shotbound_core::model::{Boundary, BoundaryKind, DetectionResult, VideoMetadata};
use shotbound_core::orchestrator::Orchestrator;
use shotbound_core::{fusion, postprocess, segment};

fn cache_config(dir: &std::path::Path) -> CoreConfig {
    let mut config = CoreConfig::default();
    config.cache.enabled = true;
    config.cache.directory = dir.to_path_buf();
    config
}

fn frame_diff_spec(threshold: f64, min_scene_length: usize) -> DetectorSpec {
    let mut config = DetectorConfig::default();
    config.threshold = threshold;
    config.min_scene_length = min_scene_length;
    config.color_space = ColorSpace::Rgb;
    DetectorSpec {
        kind: DetectorKind::FrameDifference,
        config,
        weight: None,
    }
}

fn fingerprint(name: &str) -> VideoFingerprint {
    VideoFingerprint {
        path: PathBuf::from(name),
        size_bytes: 0,
        modified_unix_nanos: 0,
    }
}

/// E1: a perfectly static clip produces no boundaries and exactly one
/// segment spanning the whole clip.
#[test]
fn e1_static_clip_has_no_boundaries_and_one_segment() {
    let dir = std::env::temp_dir().join("shotbound-e2e-e1");
    let orchestrator = Orchestrator::new(cache_config(&dir), null_sink());
    let specs = vec![frame_diff_spec(0.3, 15)];
    let open_source = || -> shotbound_core::error::CoreResult<Box<dyn FrameSource>> {
        Ok(Box::new(InMemoryFrameSource::solid_color_run(30.0, 16, 16, &[([128, 128, 128], 90)])))
    };

    let (result, segments) = orchestrator
        .detect_from_source(fingerprint("e1"), &specs, open_source, CancellationToken::new(), None)
        .unwrap();

    assert!(result.boundaries.is_empty());
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].start_frame, 0);
    assert_eq!(segments[0].end_frame, 90);
    let _ = std::fs::remove_dir_all(&dir);
}

/// E2: a single hard cut midway through the clip produces exactly one
/// boundary near the cut point and two segments.
#[test]
fn e2_single_hard_cut_yields_two_segments() {
    let dir = std::env::temp_dir().join("shotbound-e2e-e2");
    let orchestrator = Orchestrator::new(cache_config(&dir), null_sink());
    let specs = vec![frame_diff_spec(0.15, 10)];
    let open_source = || -> shotbound_core::error::CoreResult<Box<dyn FrameSource>> {
        Ok(Box::new(InMemoryFrameSource::solid_color_run(
            30.0,
            16,
            16,
            &[([10, 10, 10], 60), ([245, 245, 245], 60)],
        )))
    };

    let (result, segments) = orchestrator
        .detect_from_source(fingerprint("e2"), &specs, open_source, CancellationToken::new(), None)
        .unwrap();

    assert_eq!(result.boundaries.len(), 1);
    assert!((result.boundaries[0].frame as i64 - 60).abs() <= 2);
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].end_frame, segments[1].start_frame);
    let _ = std::fs::remove_dir_all(&dir);
}

/// E3: of three candidate boundaries at frames 40, 45 and 80, the one at 45
/// falls within `min_scene_length` (15) of the kept boundary at 40 and is
/// dropped outright even though its confidence (0.6) is higher — the earlier
/// boundary always wins, confidence never decides.
#[test]
fn e3_boundary_within_min_scene_length_is_dropped_regardless_of_confidence() {
    let boundaries = vec![
        Boundary::new(40, 30.0, 0.5, BoundaryKind::Cut),
        Boundary::new(45, 30.0, 0.6, BoundaryKind::Cut),
        Boundary::new(80, 30.0, 0.55, BoundaryKind::Cut),
    ];

    let kept = postprocess::filter_min_scene_length(&boundaries, 15);

    let frames: Vec<usize> = kept.iter().map(|b| b.frame).collect();
    assert_eq!(frames, vec![40, 80]);
}

fn fusion_input(algorithm: &str, votes: &[(usize, f64)], frame_count: usize) -> DetectionResult {
    DetectionResult {
        boundaries: votes
            .iter()
            .map(|&(frame, confidence)| Boundary::new(frame, 30.0, confidence, BoundaryKind::Cut))
            .collect(),
        algorithm: algorithm.to_string(),
        processing_time_sec: 0.0,
        frame_count,
        scores: Vec::new(),
        metadata: Default::default(),
    }
}

/// E4: detector A votes for cuts at 100 (confidence 0.8) and 250 (0.6);
/// detector B votes at 102 (0.7) and 260 (0.9). With equal weights and a
/// 1.0s tolerance at 30fps, each pair is within tolerance of the other and
/// fuses into one boundary at the weighted-average frame and confidence:
/// (100+102)/2 = 101 at (0.8+0.7)/2 = 0.75, and (250+260)/2 = 255 at
/// (0.6+0.9)/2 = 0.75.
#[test]
fn e4_two_detectors_fuse_into_weighted_average_boundaries() {
    let a = fusion_input("frame_difference", &[(100, 0.8), (250, 0.6)], 300);
    let b = fusion_input("histogram", &[(102, 0.7), (260, 0.9)], 300);
    let inputs = vec![
        fusion::WeightedResult { result: &a, weight: 1.0 },
        fusion::WeightedResult { result: &b, weight: 1.0 },
    ];

    let fused = fusion::fuse(&inputs, 30.0, 1.0).unwrap();

    assert_eq!(fused.boundaries.len(), 2);
    assert_eq!(fused.boundaries[0].frame, 101);
    assert!((fused.boundaries[0].confidence - 0.75).abs() < 1e-9);
    assert_eq!(fused.boundaries[1].frame, 255);
    assert!((fused.boundaries[1].confidence - 0.75).abs() < 1e-9);
}

/// E5: a 1000s segment (30fps, 30000 frames) with `max_segment_duration_sec`
/// of 300 splits into fixed 300s chunks measured from the segment start,
/// with the 100s remainder landing in the last chunk: 300/300/300/100.
#[test]
fn e5_long_segment_splits_into_fixed_chunks_with_remainder_last() {
    let video = VideoMetadata::new(30.0, 30 * 1000);
    let rules = segment::SegmentRules {
        min_segment_duration_sec: 1.0,
        max_segment_duration_sec: 300.0,
        merge_short_segments: false,
    };

    let segments = segment::build_segments(&[], video, &rules);

    let durations: Vec<f64> = segments.iter().map(|s| s.duration).collect();
    assert_eq!(durations.len(), 4);
    for (got, want) in durations.iter().zip([300.0, 300.0, 300.0, 100.0]) {
        assert!((got - want).abs() < 1e-6, "got {durations:?}");
    }
}

/// E6: 8 threads call `detect_from_source` concurrently against the same
/// fingerprint and detector config with an empty cache. Single-flight
/// coordination means only the race's leader actually opens a source to run
/// the detector; every other caller either joins the leader or finds the
/// leader's result already cached. Each `detect_from_source` call opens one
/// extra source itself to probe the clip's frame rate/count up front, so 8
/// calls contribute 8 probe opens plus exactly one detection-run open if
/// (and only if) single-flight collapsed the race correctly — 9 total opens
/// rather than 16. All 8 results must be identical.
#[test]
fn e6_concurrent_calls_run_the_detector_exactly_once() {
    let dir = std::env::temp_dir().join("shotbound-e2e-e6");
    let _ = std::fs::remove_dir_all(&dir);
    let orchestrator = Orchestrator::new(cache_config(&dir), null_sink());
    let specs = vec![frame_diff_spec(0.2, 10)];
    let opens = Arc::new(AtomicUsize::new(0));
    let make_open_source = {
        let opens = Arc::clone(&opens);
        move || -> shotbound_core::error::CoreResult<Box<dyn FrameSource>> {
            opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(InMemoryFrameSource::solid_color_run(
                30.0,
                16,
                16,
                &[([0, 0, 0], 45), ([255, 255, 255], 45)],
            )))
        }
    };

    const CALLERS: usize = 8;
    let barrier = Barrier::new(CALLERS);
    let fp = fingerprint("e6");
    let results: Vec<(DetectionResult, Vec<shotbound_core::model::Segment>)> =
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..CALLERS)
                .map(|_| {
                    let orchestrator = &orchestrator;
                    let specs = &specs;
                    let barrier = &barrier;
                    let fp = fp.clone();
                    let open_source = make_open_source.clone();
                    scope.spawn(move || {
                        barrier.wait();
                        orchestrator
                            .detect_from_source(fp, specs, open_source, CancellationToken::new(), None)
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

    assert_eq!(opens.load(Ordering::SeqCst), CALLERS + 1);
    let (first, _) = &results[0];
    for (result, _) in &results {
        assert_eq!(result, first);
    }
    let _ = std::fs::remove_dir_all(&dir);
}
