//! A lazy producer of decoded frames from a video path.
//!
//! The source is single-consumer; concurrent readers must open independent
//! instances. Pixel format delivered to detectors is 3-channel 8-bit BGR —
//! detectors perform their own color conversion from there.

pub mod memory;
pub mod y4m;

use crate::error::{CoreError, CoreResult};

/// One decoded frame, stored as interleaved 8-bit BGR, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// `3 * width * height` bytes, channel order B, G, R.
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width as usize) * (height as usize) * 3);
        Frame {
            width,
            height,
            data,
        }
    }

    /// View as an `image::RgbImage`, swapping B and R so downstream
    /// `image`/`imageproc` operations (which assume RGB channel order)
    /// produce correct results.
    pub fn to_rgb_image(&self) -> image::RgbImage {
        let mut buf = vec![0u8; self.data.len()];
        for (src, dst) in self.data.chunks_exact(3).zip(buf.chunks_exact_mut(3)) {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
        }
        image::RgbImage::from_raw(self.width, self.height, buf)
            .expect("buffer length matches width*height*3 by construction")
    }

    pub fn to_gray_image(&self) -> image::GrayImage {
        image::imageops::grayscale(&self.to_rgb_image())
    }
}

/// Static properties of a video, queryable without decoding any frames.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: usize,
    pub codec_tag: String,
}

/// Contract a video decoder must satisfy to feed the detection pipeline.
pub trait FrameSource {
    fn info(&self) -> VideoInfo;

    /// Reads the next frame, or `Ok(None)` at end of stream. A frame-level
    /// decode failure after at least one frame has been produced should be
    /// surfaced as `Err(CoreError::Source { frame_index: Some(_), .. })`
    /// rather than treated as end of stream.
    fn next_frame(&mut self) -> CoreResult<Option<Frame>>;
}

/// Opens a source, failing with `SourceError::SourceUnavailable` semantics
/// when the path cannot be opened at all.
pub fn open_unavailable(path: &str, cause: impl std::fmt::Display) -> CoreError {
    CoreError::source(format!("cannot open source '{path}': {cause}"))
}
