//! In-memory [`FrameSource`] used by tests and by callers that already have
//! decoded frames (e.g. from their own decoder) and just want to drive the
//! detection pipeline without touching disk.

use super::{Frame, FrameSource, VideoInfo};
use crate::error::CoreResult;

pub struct InMemoryFrameSource {
    info: VideoInfo,
    frames: std::vec::IntoIter<Frame>,
}

impl InMemoryFrameSource {
    pub fn new(fps: f64, frames: Vec<Frame>) -> Self {
        let (width, height) = frames
            .first()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0));
        let info = VideoInfo {
            width,
            height,
            fps,
            frame_count: frames.len(),
            codec_tag: "raw".to_string(),
        };
        InMemoryFrameSource {
            info,
            frames: frames.into_iter(),
        }
    }

    /// Builds runs of solid-color frames of `width`x`height`, useful for
    /// synthetic hard-cut and steady-state test scenarios.
    pub fn solid_color_run(
        fps: f64,
        width: u32,
        height: u32,
        runs: &[([u8; 3], usize)],
    ) -> Self {
        let mut frames = Vec::new();
        for (bgr, count) in runs {
            let mut data = Vec::with_capacity((width * height * 3) as usize);
            for _ in 0..(width * height) {
                data.extend_from_slice(bgr);
            }
            for _ in 0..*count {
                frames.push(Frame::new(width, height, data.clone()));
            }
        }
        InMemoryFrameSource::new(fps, frames)
    }
}

impl FrameSource for InMemoryFrameSource {
    fn info(&self) -> VideoInfo {
        self.info.clone()
    }

    fn next_frame(&mut self) -> CoreResult<Option<Frame>> {
        Ok(self.frames.next())
    }
}
