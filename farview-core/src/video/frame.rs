//! Frame representations for the display pipeline.
//!
//! [`VideoFrame`] is the decoder-owned, transient picture handed to the
//! uploader: per-plane byte buffers with per-plane strides, exactly as
//! decoders hand them out. [`RgbImage`] is the converted, tightly packed
//! RGB24 buffer that gets written to the render surface and forwarded on
//! the bridge.

use crate::error::FarviewError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha.
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
    /// Planar YUV 4:2:0 (I420): full-res Y plane, half-res U and V.
    Yuv420,
}

impl PixelFormat {
    /// Number of planes this format carries.
    pub const fn plane_count(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 | PixelFormat::Rgb8 => 1,
            PixelFormat::Yuv420 => 3,
        }
    }

    /// Bytes per pixel for packed formats (plane 0).
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Yuv420 => 1,
        }
    }
}

// ── VideoFrame ───────────────────────────────────────────────────

/// One plane of a decoded frame.
///
/// `stride` is the row pitch in bytes and may exceed the visible row
/// width due to decoder alignment requirements.
#[derive(Debug, Clone)]
pub struct Plane {
    pub data: Vec<u8>,
    pub stride: usize,
}

/// One decoded video picture.
///
/// Produced by the frame source, consumed exactly once by the uploader
/// (moved into the conversion call), then dropped.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Plane buffers; `format.plane_count()` entries.
    pub planes: Vec<Plane>,
}

impl VideoFrame {
    /// Build a packed single-plane frame (BGRA/RGBA/RGB).
    pub fn packed(
        format: PixelFormat,
        width: u32,
        height: u32,
        data: Vec<u8>,
        stride: usize,
    ) -> Self {
        Self {
            width,
            height,
            format,
            planes: vec![Plane { data, stride }],
        }
    }

    /// Build a planar YUV 4:2:0 frame from its three planes.
    pub fn yuv420(
        width: u32,
        height: u32,
        y: Plane,
        u: Plane,
        v: Plane,
    ) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Yuv420,
            planes: vec![y, u, v],
        }
    }

    /// Validate dimensions and plane sizes against the format.
    pub fn validate(&self) -> Result<(), FarviewError> {
        if self.width == 0 || self.height == 0 {
            return Err(FarviewError::InvalidFrame("zero dimension"));
        }
        if self.planes.len() != self.format.plane_count() {
            return Err(FarviewError::InvalidFrame("wrong plane count"));
        }

        let w = self.width as usize;
        let h = self.height as usize;

        match self.format {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 | PixelFormat::Rgb8 => {
                let bpp = self.format.bytes_per_pixel();
                let plane = &self.planes[0];
                if plane.stride < w * bpp {
                    return Err(FarviewError::InvalidFrame("stride shorter than row"));
                }
                if plane.data.len() < plane.stride * h {
                    return Err(FarviewError::InvalidFrame("plane shorter than stride*height"));
                }
            }
            PixelFormat::Yuv420 => {
                if w % 2 != 0 || h % 2 != 0 {
                    return Err(FarviewError::InvalidFrame("yuv420 needs even dimensions"));
                }
                let (cw, ch) = (w / 2, h / 2);
                let y = &self.planes[0];
                if y.stride < w || y.data.len() < y.stride * h {
                    return Err(FarviewError::InvalidFrame("y plane too short"));
                }
                for plane in &self.planes[1..] {
                    if plane.stride < cw || plane.data.len() < plane.stride * ch {
                        return Err(FarviewError::InvalidFrame("chroma plane too short"));
                    }
                }
            }
        }
        Ok(())
    }
}

// ── RgbImage ─────────────────────────────────────────────────────

/// A tightly packed RGB24 image: row-major, stride == width*3.
///
/// The invariant `data.len() == height * width * 3` holds for every
/// constructed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbImage {
    /// Bytes per pixel.
    pub const CHANNELS: usize = 3;

    /// An all-zero (black) image.
    pub fn zeroed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * Self::CHANNELS],
        }
    }

    /// Wrap an existing buffer, validating the size invariant.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FarviewError> {
        let expected = width as usize * height as usize * Self::CHANNELS;
        if data.len() != expected {
            return Err(FarviewError::InvalidFrame("rgb buffer size mismatch"));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The packed pixel bytes, `height * width * 3` of them.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// One packed row.
    pub fn row(&self, y: u32) -> &[u8] {
        let w = self.width as usize * Self::CHANNELS;
        let start = y as usize * w;
        &self.data[start..start + w]
    }

    /// Consume the image, returning the raw buffer (for pooling).
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

// ── FrameSource ──────────────────────────────────────────────────

/// The decoder-side seam: hands out pending decoded frames.
///
/// `pull_frame` transfers ownership of one frame to the caller;
/// returning `None` means nothing is pending, which is a no-op for the
/// uploader, not an error.
pub trait FrameSource {
    fn pull_frame(&mut self) -> Option<VideoFrame>;
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_frame_validates() {
        let frame = VideoFrame::packed(PixelFormat::Bgra8, 4, 2, vec![0u8; 4 * 4 * 2], 16);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn packed_frame_short_stride_rejected() {
        let frame = VideoFrame::packed(PixelFormat::Bgra8, 4, 2, vec![0u8; 32], 8);
        assert!(frame.validate().is_err());
    }

    #[test]
    fn yuv_frame_odd_dimensions_rejected() {
        let frame = VideoFrame::yuv420(
            3,
            2,
            Plane { data: vec![0; 6], stride: 3 },
            Plane { data: vec![0; 2], stride: 1 },
            Plane { data: vec![0; 2], stride: 1 },
        );
        assert!(frame.validate().is_err());
    }

    #[test]
    fn rgb_image_size_invariant() {
        let img = RgbImage::zeroed(640, 480);
        assert_eq!(img.data().len(), 640 * 480 * 3);

        assert!(RgbImage::from_raw(4, 4, vec![0u8; 10]).is_err());
        assert!(RgbImage::from_raw(4, 4, vec![0u8; 48]).is_ok());
    }

    #[test]
    fn rgb_image_row_access() {
        let mut img = RgbImage::zeroed(2, 2);
        img.data_mut()[6..12].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(img.row(1), &[1, 2, 3, 4, 5, 6]);
    }
}
