//! Outbound frame endpoint.
//!
//! Connects to the configured dispatch address over loopback TCP and
//! sends one [`FrameMessage`] per rendered frame. The forwarder is
//! exclusively owned by the uploader and used from a single task for
//! its entire lifetime; the socket is released exactly once on drop.

use std::net::SocketAddr;

use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info};

use crate::bridge::wire::{FrameCodec, FrameMessage};
use crate::error::FarviewError;
use crate::video::frame::RgbImage;

/// Sends converted frames to the external consumer.
#[derive(Debug)]
pub struct FrameForwarder {
    framed: FramedWrite<TcpStream, FrameCodec>,
    peer: SocketAddr,
    frames_sent: u64,
}

impl FrameForwarder {
    /// Connect to the dispatch address (e.g. `"127.0.0.1:5555"`).
    pub async fn connect(addr: &str) -> Result<Self, FarviewError> {
        let peer: SocketAddr = addr.parse()?;
        let stream = TcpStream::connect(peer).await?;
        stream.set_nodelay(true)?;
        info!("frame forwarding connected to {peer}");

        Ok(Self {
            framed: FramedWrite::new(stream, FrameCodec),
            peer,
            frames_sent: 0,
        })
    }

    /// Serialize and send one frame.
    ///
    /// A failure here is returned to the caller, which is expected to
    /// log it and drop the forwarder (forwarding disabled) rather than
    /// treat it as fatal.
    pub async fn send(&mut self, image: &RgbImage) -> Result<(), FarviewError> {
        self.framed.send(FrameMessage::from_image(image)).await?;
        self.frames_sent += 1;
        debug!(
            frames = self.frames_sent,
            width = image.width(),
            height = image.height(),
            "forwarded frame"
        );
        Ok(())
    }

    /// The dispatch address this forwarder targets.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Total frames sent since connecting.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }
}

// ── Tests ────────────────────────────────────────────────────────
