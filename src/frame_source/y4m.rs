//! [`FrameSource`] adapter over a YUV4MPEG2 (`.y4m`) stream, the decoder
//! `main.rs` consumes directly. This crate treats it as one concrete
//! implementation of the `FrameSource` trait rather than the only possible
//! one.

use std::io::Read;

use super::{Frame, FrameSource, VideoInfo};
use crate::error::{CoreError, CoreResult};

/// Wraps a `y4m::Decoder`, converting each decoded YCbCr frame to 8-bit BGR
/// using the BT.601 matrix (the common case for SD/web-sourced clips; HD
/// sources nominally want BT.709 coefficients, a known approximation).
pub struct Y4mFrameSource<R: Read> {
    decoder: y4m::Decoder<R>,
    frame_count: usize,
    produced_any: bool,
}

impl<R: Read> Y4mFrameSource<R> {
    pub fn new(reader: R) -> CoreResult<Self> {
        let decoder = y4m::decode(reader)
            .map_err(|e| super::open_unavailable("y4m stream", e))?;
        Ok(Y4mFrameSource {
            decoder,
            frame_count: 0,
            produced_any: false,
        })
    }

    fn convert_to_bgr(width: usize, height: usize, chroma_w: usize, chroma_h: usize, raw: &y4m::Frame<'_>) -> Frame {
        let y_plane = raw.get_y_plane();
        let u_plane = raw.get_u_plane();
        let v_plane = raw.get_v_plane();

        let mut data = vec![0u8; width * height * 3];
        for row in 0..height {
            let chroma_row = row * chroma_h / height;
            for col in 0..width {
                let chroma_col = col * chroma_w / width;
                let y = y_plane[row * width + col] as f32;
                let u = u_plane[chroma_row * chroma_w + chroma_col] as f32 - 128.0;
                let v = v_plane[chroma_row * chroma_w + chroma_col] as f32 - 128.0;

                let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
                let g = (y - 0.344_136 * u - 0.714_136 * v).clamp(0.0, 255.0) as u8;
                let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

                let idx = (row * width + col) * 3;
                data[idx] = b;
                data[idx + 1] = g;
                data[idx + 2] = r;
            }
        }

        Frame::new(width as u32, height as u32, data)
    }
}

/// Chroma plane dimensions for the common y4m colorspaces. Unknown/high
/// bit-depth spaces fall back to 4:2:0 subsampling, the most common case.
fn chroma_dimensions(colorspace: y4m::Colorspace, width: usize, height: usize) -> (usize, usize) {
    use y4m::Colorspace::*;
    match colorspace {
        C444 | C444p10 | C444p12 => (width, height),
        C422 | C422p10 | C422p12 => ((width + 1) / 2, height),
        _ => ((width + 1) / 2, (height + 1) / 2),
    }
}

impl<R: Read> FrameSource for Y4mFrameSource<R> {
    /// `frame_count` reflects frames decoded so far, not a known total —
    /// streamed y4m carries no frame-count header. Callers needing an upfront total
    /// should decode via a seekable container and a `FrameSource` that can
    /// report it, or drain the stream once to count frames first.
    fn info(&self) -> VideoInfo {
        let ratio = self.decoder.get_framerate();
        VideoInfo {
            width: self.decoder.get_width() as u32,
            height: self.decoder.get_height() as u32,
            fps: ratio.num as f64 / ratio.den as f64,
            frame_count: self.frame_count,
            codec_tag: format!("{:?}", self.decoder.get_colorspace()),
        }
    }

    fn next_frame(&mut self) -> CoreResult<Option<Frame>> {
        let width = self.decoder.get_width();
        let height = self.decoder.get_height();
        let (chroma_w, chroma_h) = chroma_dimensions(self.decoder.get_colorspace(), width, height);
        let result = self.decoder.read_frame();
        match result {
            Ok(raw) => {
                let frame = Self::convert_to_bgr(width, height, chroma_w, chroma_h, &raw);
                self.frame_count += 1;
                self.produced_any = true;
                Ok(Some(frame))
            }
            Err(y4m::Error::EOF) => Ok(None),
            Err(e) if !self.produced_any => Err(CoreError::source(format!(
                "y4m stream ended before any frame was decoded: {e}"
            ))),
            Err(e) => Err(CoreError::source_at(
                format!("y4m decode failure: {e}"),
                self.frame_count,
            )),
        }
    }
}
