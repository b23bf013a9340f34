//! Pixel-format conversion to packed RGB24.
//!
//! Every source format the decoder can hand out is converted into the
//! one layout the render surface and the bridge speak: interleaved
//! RGB24, rows contiguous, stride == width*3.
//!
//! Output buffers come from a small free-list keyed by (height, width),
//! so steady-state streaming does not allocate per frame.

use std::collections::HashMap;

use crate::error::FarviewError;
use crate::video::frame::{PixelFormat, RgbImage, VideoFrame};

/// Buffers kept per (height, width) key before excess ones are freed.
const POOL_DEPTH: usize = 4;

// ── RgbConverter ─────────────────────────────────────────────────

/// Converts [`VideoFrame`]s of any supported format into pooled
/// [`RgbImage`]s.
pub struct RgbConverter {
    pool: HashMap<(u32, u32), Vec<Vec<u8>>>,
}

impl RgbConverter {
    pub fn new() -> Self {
        Self {
            pool: HashMap::new(),
        }
    }

    /// Convert one frame to RGB24.
    ///
    /// The output is exactly `frame.height * frame.width * 3` bytes
    /// regardless of the source format.
    pub fn convert(&mut self, frame: &VideoFrame) -> Result<RgbImage, FarviewError> {
        frame.validate()?;

        let mut image = self.take_buffer(frame.width, frame.height);
        let w = frame.width as usize;
        let h = frame.height as usize;

        match frame.format {
            PixelFormat::Rgb8 => {
                pack_rows(&frame.planes[0].data, frame.planes[0].stride, w * 3, h, image.data_mut());
            }
            PixelFormat::Bgra8 => {
                swizzle_4to3(&frame.planes[0], w, h, image.data_mut(), [2, 1, 0]);
            }
            PixelFormat::Rgba8 => {
                swizzle_4to3(&frame.planes[0], w, h, image.data_mut(), [0, 1, 2]);
            }
            PixelFormat::Yuv420 => {
                yuv420_to_rgb(frame, image.data_mut());
            }
        }

        Ok(image)
    }

    /// Return an image's buffer to the pool for reuse.
    pub fn recycle(&mut self, image: RgbImage) {
        let key = (image.height(), image.width());
        let free = self.pool.entry(key).or_default();
        if free.len() < POOL_DEPTH {
            free.push(image.into_vec());
        }
    }

    /// Number of pooled buffers for the given dimensions (test hook).
    pub fn pooled(&self, width: u32, height: u32) -> usize {
        self.pool.get(&(height, width)).map_or(0, Vec::len)
    }

    fn take_buffer(&mut self, width: u32, height: u32) -> RgbImage {
        let needed = width as usize * height as usize * RgbImage::CHANNELS;
        if let Some(free) = self.pool.get_mut(&(height, width)) {
            if let Some(mut buf) = free.pop() {
                debug_assert_eq!(buf.len(), needed);
                buf.resize(needed, 0);
                // Size was validated when the buffer was pooled.
                return RgbImage::from_raw(width, height, buf)
                    .unwrap_or_else(|_| RgbImage::zeroed(width, height));
            }
        }
        RgbImage::zeroed(width, height)
    }
}

impl Default for RgbConverter {
    fn default() -> Self {
        Self::new()
    }
}

// ── Conversion kernels ───────────────────────────────────────────

/// Copy `h` rows of `row_bytes` each from a strided source into a
/// tightly packed destination.
fn pack_rows(src: &[u8], stride: usize, row_bytes: usize, h: usize, dst: &mut [u8]) {
    for y in 0..h {
        let s = y * stride;
        let d = y * row_bytes;
        dst[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
    }
}

/// Convert a 4-byte-per-pixel plane to RGB using the channel index map
/// `[r, g, b]` into each source pixel.
fn swizzle_4to3(
    plane: &crate::video::frame::Plane,
    w: usize,
    h: usize,
    dst: &mut [u8],
    rgb_idx: [usize; 3],
) {
    for y in 0..h {
        let row = &plane.data[y * plane.stride..y * plane.stride + w * 4];
        let out = &mut dst[y * w * 3..(y + 1) * w * 3];
        for x in 0..w {
            let px = &row[x * 4..x * 4 + 4];
            out[x * 3] = px[rgb_idx[0]];
            out[x * 3 + 1] = px[rgb_idx[1]];
            out[x * 3 + 2] = px[rgb_idx[2]];
        }
    }
}

/// Planar I420 → interleaved RGB24, full-range BT.601.
fn yuv420_to_rgb(frame: &VideoFrame, dst: &mut [u8]) {
    let w = frame.width as usize;
    let h = frame.height as usize;
    let y_plane = &frame.planes[0];
    let u_plane = &frame.planes[1];
    let v_plane = &frame.planes[2];

    for row in 0..h {
        let y_row = &y_plane.data[row * y_plane.stride..];
        let u_row = &u_plane.data[(row / 2) * u_plane.stride..];
        let v_row = &v_plane.data[(row / 2) * v_plane.stride..];
        let out = &mut dst[row * w * 3..(row + 1) * w * 3];

        for col in 0..w {
            let y = y_row[col] as f32;
            let u = u_row[col / 2] as f32 - 128.0;
            let v = v_row[col / 2] as f32 - 128.0;

            let r = (y + 1.402 * v).round().clamp(0.0, 255.0) as u8;
            let g = (y - 0.344 * u - 0.714 * v).round().clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u).round().clamp(0.0, 255.0) as u8;

            out[col * 3] = r;
            out[col * 3 + 1] = g;
            out[col * 3 + 2] = b;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::frame::Plane;

    fn bgra_frame(w: u32, h: u32, b: u8, g: u8, r: u8, stride_pad: usize) -> VideoFrame {
        let stride = w as usize * 4 + stride_pad;
        let mut data = vec![0u8; stride * h as usize];
        for y in 0..h as usize {
            for x in 0..w as usize {
                let off = y * stride + x * 4;
                data[off] = b;
                data[off + 1] = g;
                data[off + 2] = r;
                data[off + 3] = 0xFF;
            }
        }
        VideoFrame::packed(PixelFormat::Bgra8, w, h, data, stride)
    }

    #[test]
    fn bgra_swizzles_to_rgb() {
        let mut conv = RgbConverter::new();
        let frame = bgra_frame(4, 2, 10, 20, 30, 0);
        let img = conv.convert(&frame).unwrap();

        assert_eq!(img.data().len(), 4 * 2 * 3);
        for px in img.data().chunks(3) {
            assert_eq!(px, &[30, 20, 10]);
        }
    }

    #[test]
    fn padded_stride_is_skipped() {
        let mut conv = RgbConverter::new();
        // 8 bytes of row padding must not leak into the output.
        let frame = bgra_frame(3, 3, 1, 2, 3, 8);
        let img = conv.convert(&frame).unwrap();
        assert_eq!(img.data().len(), 3 * 3 * 3);
        for px in img.data().chunks(3) {
            assert_eq!(px, &[3, 2, 1]);
        }
    }

    #[test]
    fn rgba_keeps_channel_order() {
        let mut conv = RgbConverter::new();
        let w = 2usize;
        let mut data = vec![0u8; w * 4];
        data.copy_from_slice(&[9, 8, 7, 255, 1, 2, 3, 255]);
        let frame = VideoFrame::packed(PixelFormat::Rgba8, 2, 1, data, w * 4);

        let img = conv.convert(&frame).unwrap();
        assert_eq!(img.data(), &[9, 8, 7, 1, 2, 3]);
    }

    #[test]
    fn rgb_passthrough_repacks_rows() {
        let mut conv = RgbConverter::new();
        let stride = 2 * 3 + 2; // padded
        let mut data = vec![0xEE; stride * 2];
        data[0..6].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        data[stride..stride + 6].copy_from_slice(&[7, 8, 9, 10, 11, 12]);
        let frame = VideoFrame::packed(PixelFormat::Rgb8, 2, 2, data, stride);

        let img = conv.convert(&frame).unwrap();
        assert_eq!(img.data(), &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn yuv_gray_maps_to_gray() {
        let mut conv = RgbConverter::new();
        let frame = VideoFrame::yuv420(
            4,
            4,
            Plane { data: vec![128; 16], stride: 4 },
            Plane { data: vec![128; 4], stride: 2 },
            Plane { data: vec![128; 4], stride: 2 },
        );

        let img = conv.convert(&frame).unwrap();
        for px in img.data().chunks(3) {
            assert_eq!(px, &[128, 128, 128]);
        }
    }

    #[test]
    fn yuv_red_has_dominant_red_channel() {
        // Y=81, U=90, V=240 is the classic full-range red.
        let mut conv = RgbConverter::new();
        let frame = VideoFrame::yuv420(
            2,
            2,
            Plane { data: vec![81; 4], stride: 2 },
            Plane { data: vec![90; 1], stride: 1 },
            Plane { data: vec![240; 1], stride: 1 },
        );

        let img = conv.convert(&frame).unwrap();
        let px = &img.data()[0..3];
        assert!(px[0] > 220, "red channel low: {}", px[0]);
        assert!(px[1] < 40, "green channel high: {}", px[1]);
        assert!(px[2] < 40, "blue channel high: {}", px[2]);
    }

    #[test]
    fn output_size_is_h_w_3_for_all_formats() {
        let mut conv = RgbConverter::new();
        let cases: Vec<VideoFrame> = vec![
            bgra_frame(640, 480, 0, 0, 0, 0),
            VideoFrame::packed(PixelFormat::Rgb8, 320, 240, vec![0; 320 * 3 * 240], 320 * 3),
            VideoFrame::yuv420(
                16,
                8,
                Plane { data: vec![0; 16 * 8], stride: 16 },
                Plane { data: vec![0; 8 * 4], stride: 8 },
                Plane { data: vec![0; 8 * 4], stride: 8 },
            ),
        ];

        for frame in &cases {
            let img = conv.convert(frame).unwrap();
            assert_eq!(
                img.data().len(),
                frame.height as usize * frame.width as usize * 3
            );
            assert_eq!(img.width(), frame.width);
            assert_eq!(img.height(), frame.height);
        }
    }

    #[test]
    fn pool_reuses_buffers() {
        let mut conv = RgbConverter::new();
        let frame = bgra_frame(8, 8, 1, 1, 1, 0);

        let img = conv.convert(&frame).unwrap();
        assert_eq!(conv.pooled(8, 8), 0);

        conv.recycle(img);
        assert_eq!(conv.pooled(8, 8), 1);

        // Next conversion for the same dimensions drains the pool.
        let _img2 = conv.convert(&frame).unwrap();
        assert_eq!(conv.pooled(8, 8), 0);
    }

    #[test]
    fn pool_depth_is_bounded() {
        let mut conv = RgbConverter::new();
        for _ in 0..10 {
            conv.recycle(RgbImage::zeroed(4, 4));
        }
        assert!(conv.pooled(4, 4) <= POOL_DEPTH);
    }

    #[test]
    fn invalid_frame_rejected() {
        let mut conv = RgbConverter::new();
        let frame = VideoFrame::packed(PixelFormat::Bgra8, 4, 4, vec![0; 8], 16);
        assert!(conv.convert(&frame).is_err());
    }
}
