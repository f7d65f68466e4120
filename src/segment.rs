//! Segmenter: turns a boundary list into ordered, disjoint, video-covering
//! segments.

use crate::model::{Boundary, BoundaryKind, Segment, VideoMetadata};

/// `segmentation.*` knobs the segmenter reads; kept separate from
/// [`crate::config::SegmentationConfig`] import to avoid a cyclic module
/// dependency — callers pass the fields they need.
pub struct SegmentRules {
    pub min_segment_duration_sec: f64,
    pub max_segment_duration_sec: f64,
    pub merge_short_segments: bool,
}

/// Builds the final segment list from `boundaries`:
/// 1. Insert synthetic `Start`/`End` boundaries at frame 0 and `frame_count`.
/// 2. Build one provisional segment between each consecutive pair.
/// 3. Split any segment longer than `max_segment_duration_sec` into
///    `ceil(duration / max)` equal sub-segments (confidence 0.5, tagged).
/// 4. If `merge_short_segments`, fuse any segment shorter than
///    `min_segment_duration_sec` into its successor (or predecessor if it
///    is the last segment).
/// 5. Re-index segments 0..N in final order.
pub fn build_segments(boundaries: &[Boundary], video: VideoMetadata, rules: &SegmentRules) -> Vec<Segment> {
    if video.frame_count == 0 {
        return Vec::new();
    }

    let mut marks: Vec<Boundary> = Vec::with_capacity(boundaries.len() + 2);
    marks.push(Boundary::new(0, video.fps, 1.0, BoundaryKind::Start));
    marks.extend(boundaries.iter().cloned());
    marks.push(Boundary::new(video.frame_count, video.fps, 1.0, BoundaryKind::End));
    marks.sort_by_key(|b| b.frame);
    marks.dedup_by_key(|b| b.frame);

    let mut provisional = Vec::new();
    for window in marks.windows(2) {
        let (start, end) = (&window[0], &window[1]);
        if end.frame <= start.frame {
            continue;
        }
        provisional.push(raw_segment(start, end, video.fps));
    }

    let split: Vec<Segment> = provisional
        .into_iter()
        .flat_map(|seg| split_if_too_long(seg, rules.max_segment_duration_sec, video.fps))
        .collect();

    let merged = if rules.merge_short_segments {
        merge_short(split, rules.min_segment_duration_sec)
    } else {
        split
    };

    reindex(merged)
}

fn raw_segment(start: &Boundary, end: &Boundary, fps: f64) -> Segment {
    let start_frame = start.frame;
    let end_frame = end.frame;
    let start_time = start_frame as f64 / fps;
    let end_time = end_frame as f64 / fps;
    Segment {
        index: 0,
        start_frame,
        end_frame,
        start_time,
        end_time,
        duration: end_time - start_time,
        confidence: start.confidence.min(end.confidence),
        metadata: Default::default(),
    }
}

/// Splits `segment` into fixed `max_duration_sec`-sized chunks measured from
/// the segment's own start time, when it exceeds `max_duration_sec`; the
/// last chunk is clamped to the segment's true end rather than padded out to
/// a full `max_duration_sec`. Each split part gets confidence 0.5 and an
/// `is_split` metadata marker.
fn split_if_too_long(segment: Segment, max_duration_sec: f64, fps: f64) -> Vec<Segment> {
    if max_duration_sec <= 0.0 || segment.duration <= max_duration_sec {
        return vec![segment];
    }

    let num_splits = (segment.duration / max_duration_sec).ceil().max(1.0) as usize;
    let mut out = Vec::with_capacity(num_splits);
    for i in 0..num_splits {
        let chunk_start_time = segment.start_time + i as f64 * max_duration_sec;
        let chunk_end_time =
            (segment.start_time + (i + 1) as f64 * max_duration_sec).min(segment.end_time);
        if chunk_end_time <= chunk_start_time {
            continue;
        }

        let start_frame = (chunk_start_time * fps).round() as usize;
        let end_frame = if i + 1 == num_splits {
            segment.end_frame
        } else {
            (chunk_end_time * fps).round() as usize
        };
        if end_frame <= start_frame {
            continue;
        }

        let mut metadata = segment.metadata.clone();
        metadata.insert("is_split".to_string(), "true".to_string());
        out.push(Segment {
            index: 0,
            start_frame,
            end_frame,
            start_time: chunk_start_time,
            end_time: chunk_end_time,
            duration: chunk_end_time - chunk_start_time,
            confidence: 0.5,
            metadata,
        });
    }
    out
}

/// Fuses any segment shorter than `min_duration_sec` into its successor; the
/// final segment (which has no successor) fuses into its predecessor
/// instead.
fn merge_short(segments: Vec<Segment>, min_duration_sec: f64) -> Vec<Segment> {
    if segments.is_empty() {
        return segments;
    }
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        if segment.duration < min_duration_sec && !out.is_empty() {
            let prev = out.last_mut().unwrap();
            extend_with(prev, &segment);
        } else {
            out.push(segment);
        }
    }

    // A short first segment has no predecessor to absorb into during the
    // forward pass; fold it into what is now the first merged segment.
    if out.len() > 1 && out[0].duration < min_duration_sec {
        let short = out.remove(0);
        let mut merged = short;
        extend_with(&mut merged, &out[0]);
        out[0] = merged;
    }
    out
}

fn extend_with(target: &mut Segment, addition: &Segment) {
    target.end_frame = addition.end_frame;
    target.end_time = addition.end_time;
    target.duration = target.end_time - target.start_time;
    target.confidence = target.confidence.min(addition.confidence);
}

fn reindex(mut segments: Vec<Segment>) -> Vec<Segment> {
    for (i, segment) in segments.iter_mut().enumerate() {
        segment.index = i;
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> SegmentRules {
        SegmentRules {
            min_segment_duration_sec: 1.0,
            max_segment_duration_sec: 300.0,
            merge_short_segments: false,
        }
    }

    #[test]
    fn empty_boundaries_yield_one_full_range_segment() {
        let video = VideoMetadata::new(30.0, 900);
        let segments = build_segments(&[], video, &rules());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_frame, 0);
        assert_eq!(segments[0].end_frame, 900);
    }

    #[test]
    fn segments_are_disjoint_ordered_and_cover_the_video() {
        let video = VideoMetadata::new(30.0, 900);
        let boundaries = vec![
            Boundary::new(100, 30.0, 0.9, BoundaryKind::Cut),
            Boundary::new(400, 30.0, 0.8, BoundaryKind::Cut),
            Boundary::new(700, 30.0, 0.7, BoundaryKind::Cut),
        ];
        let segments = build_segments(&boundaries, video, &rules());
        assert_eq!(segments[0].start_frame, 0);
        assert_eq!(segments.last().unwrap().end_frame, 900);
        for window in segments.windows(2) {
            assert_eq!(window[0].end_frame, window[1].start_frame);
        }
        for (i, s) in segments.iter().enumerate() {
            assert_eq!(s.index, i);
        }
    }

    #[test]
    fn long_segment_is_split_into_fixed_chunks_with_remainder_last() {
        // One 1000s segment at 30fps, max=300s: expect 300/300/300/100.
        let video = VideoMetadata::new(30.0, 30 * 1000);
        let mut r = rules();
        r.max_segment_duration_sec = 300.0;
        let segments = build_segments(&[], video, &r);
        assert_eq!(segments.len(), 4);
        let durations: Vec<f64> = segments.iter().map(|s| s.duration).collect();
        for (got, want) in durations.iter().zip([300.0, 300.0, 300.0, 100.0]) {
            assert!((got - want).abs() < 1e-6, "got {durations:?}");
        }
        for s in &segments {
            assert_eq!(s.metadata.get("is_split").map(String::as_str), Some("true"));
        }
    }

    #[test]
    fn merge_short_segments_respects_min_duration() {
        let video = VideoMetadata::new(30.0, 900);
        let boundaries = vec![
            Boundary::new(10, 30.0, 0.9, BoundaryKind::Cut),
            Boundary::new(450, 30.0, 0.8, BoundaryKind::Cut),
        ];
        let mut r = rules();
        r.merge_short_segments = true;
        r.min_segment_duration_sec = 5.0;
        let segments = build_segments(&boundaries, video, &r);
        // 10-frame (0.33s) first segment must have been absorbed.
        assert!(segments.iter().all(|s| s.duration >= 5.0 || segments.len() == 1));
    }
}
