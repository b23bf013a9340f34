//! Frame uploader — decoder output to render surface and bridge.
//!
//! On each availability signal the uploader pulls one pending frame,
//! converts it to RGB24, writes it into the surface's inactive slot,
//! publishes with a swap, and — when forwarding is enabled — sends the
//! converted buffer as one message on the outbound bridge.
//!
//! A render-slot failure is benign: the frame is still forwarded. A
//! bridge failure disables forwarding for the rest of the session
//! instead of killing the stream.

use std::sync::Arc;

use tracing::{info, warn};

use farview_core::bridge::FrameForwarder;
use farview_core::error::FarviewError;
use farview_core::video::{FrameSource, RgbConverter};

use crate::config::BridgeConfig;
use crate::surface::{RenderContext, RenderSurface};

/// Uploads decoded frames into the render surface and forwards them on
/// the bridge.
pub struct FrameUploader {
    source: Box<dyn FrameSource + Send>,
    surface: Arc<RenderSurface>,
    context: Arc<dyn RenderContext>,
    converter: RgbConverter,
    forwarder: Option<FrameForwarder>,
}

impl FrameUploader {
    /// Bind the uploader to its collaborators.
    ///
    /// The bridge configuration is injected here; if forwarding is
    /// enabled, the outbound endpoint is connected now. A connect
    /// failure logs and leaves forwarding disabled — the stream itself
    /// is unaffected.
    pub async fn new(
        source: Box<dyn FrameSource + Send>,
        surface: Arc<RenderSurface>,
        context: Arc<dyn RenderContext>,
        bridge: &BridgeConfig,
    ) -> Self {
        let forwarder = if bridge.forward_frames {
            match FrameForwarder::connect(&bridge.dispatch_addr).await {
                Ok(f) => Some(f),
                Err(e) => {
                    warn!(
                        "frame forwarding to {} unavailable: {e}",
                        bridge.dispatch_addr
                    );
                    None
                }
            }
        } else {
            None
        };

        Self {
            source,
            surface,
            context,
            converter: RgbConverter::new(),
            forwarder,
        }
    }

    /// Whether the outbound bridge is currently connected.
    pub fn forwarding_enabled(&self) -> bool {
        self.forwarder.is_some()
    }

    /// Process one availability signal.
    ///
    /// Runs on the render task; the bound context is made current
    /// first when it is not already.
    pub async fn on_frames_available(&mut self) -> Result<(), FarviewError> {
        if !self.context.is_current() {
            self.context.make_current()?;
        }

        let Some(frame) = self.source.pull_frame() else {
            // Nothing pending — a no-op, not an error.
            return Ok(());
        };

        let image = match self.converter.convert(&frame) {
            Ok(image) => image,
            Err(e) => {
                warn!("skipping unconvertible frame: {e}");
                return Ok(());
            }
        };
        drop(frame);

        match self.surface.write_back(&image) {
            Ok(()) => self.surface.swap(),
            // Local display failure must not stop forwarding.
            Err(e) => warn!("render slot write failed: {e}"),
        }

        if let Some(forwarder) = self.forwarder.as_mut() {
            if let Err(e) = forwarder.send(&image).await {
                warn!("frame forwarding failed: {e}; forwarding disabled");
                self.forwarder = None;
            }
        }

        self.converter.recycle(image);
        Ok(())
    }
}

impl Drop for FrameUploader {
    fn drop(&mut self) {
        if let Some(forwarder) = &self.forwarder {
            info!(
                frames = forwarder.frames_sent(),
                "frame forwarding endpoint released"
            );
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
