//! Double-buffered render surface.
//!
//! The uploader writes the inactive slot and publishes with
//! [`swap`](RenderSurface::swap); the renderer reads the active slot.
//! Both sides go through one mutex, so a reader can never observe a
//! half-written buffer — the swap is the single publication point.

use std::mem;
use std::sync::Mutex;

use farview_core::error::FarviewError;
use farview_core::video::RgbImage;

/// Largest slot dimension the surface will accept (the usual GPU
/// texture-size limit).
pub const MAX_SURFACE_DIM: u32 = 8192;

// ── RenderContext ────────────────────────────────────────────────

/// The GPU-context seam the uploader binds to.
///
/// `on_frames_available` must run with this context current; the
/// uploader calls [`make_current`](RenderContext::make_current) first
/// whenever it is not.
pub trait RenderContext: Send + Sync {
    fn is_current(&self) -> bool;
    fn make_current(&self) -> Result<(), FarviewError>;
}

/// CPU-side surface context; trivially always current.
pub struct SoftwareContext;

impl RenderContext for SoftwareContext {
    fn is_current(&self) -> bool {
        true
    }

    fn make_current(&self) -> Result<(), FarviewError> {
        Ok(())
    }
}

// ── RenderSurface ────────────────────────────────────────────────

#[derive(Default)]
struct Slot {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

struct Buffers {
    back: Slot,
    front: Slot,
    front_valid: bool,
    generation: u64,
}

/// Double-buffered frame store shared by the uploader and the
/// renderer.
pub struct RenderSurface {
    buffers: Mutex<Buffers>,
    max_dim: u32,
}

impl RenderSurface {
    pub fn new() -> Self {
        Self::with_max_dim(MAX_SURFACE_DIM)
    }

    /// Override the dimension limit (tests force write failures with a
    /// tiny limit).
    pub fn with_max_dim(max_dim: u32) -> Self {
        Self {
            buffers: Mutex::new(Buffers {
                back: Slot::default(),
                front: Slot::default(),
                front_valid: false,
                generation: 0,
            }),
            max_dim,
        }
    }

    /// Write an image into the inactive slot.
    ///
    /// Does not publish; callers follow up with [`swap`](Self::swap)
    /// on success. Failure leaves the active slot untouched.
    pub fn write_back(&self, image: &RgbImage) -> Result<(), FarviewError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(FarviewError::SlotWrite("zero-sized frame".into()));
        }
        if image.width() > self.max_dim || image.height() > self.max_dim {
            return Err(FarviewError::SlotWrite(format!(
                "{}x{} exceeds surface limit {}",
                image.width(),
                image.height(),
                self.max_dim,
            )));
        }

        let mut buffers = self.buffers.lock().unwrap();
        let back = &mut buffers.back;
        back.width = image.width();
        back.height = image.height();
        back.data.clear();
        back.data.extend_from_slice(image.data());
        Ok(())
    }

    /// Publish the inactive slot: swap it with the active one.
    pub fn swap(&self) {
        let mut buffers = self.buffers.lock().unwrap();
        let Buffers { back, front, .. } = &mut *buffers;
        mem::swap(back, front);
        buffers.front_valid = true;
        buffers.generation += 1;
    }

    /// Snapshot the active slot, if a frame has been published.
    pub fn frame(&self) -> Option<RgbImage> {
        let buffers = self.buffers.lock().unwrap();
        if !buffers.front_valid {
            return None;
        }
        RgbImage::from_raw(
            buffers.front.width,
            buffers.front.height,
            buffers.front.data.clone(),
        )
        .ok()
    }

    /// Number of publishes so far.
    pub fn generation(&self) -> u64 {
        self.buffers.lock().unwrap().generation
    }
}

impl Default for RenderSurface {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
