//! Out-of-band frame/event bridge.
//!
//! Two independent loopback channels connect the client to an external
//! peer process:
//!
//! ```text
//! Uploader ──[FrameMessage over TCP]──────────► external consumer
//!   one message per rendered frame, RGB24 payload
//!
//! external producer ──[ControllerState dgram]─► EventBridgeListener ──► Session
//!   one fixed-size record per UDP datagram on port 5556
//! ```
//!
//! Each endpoint is owned by exactly one task for its whole lifetime.
//! Channel failures are typed errors; callers log them and disable the
//! affected direction instead of aborting.

pub mod forwarder;
pub mod listener;
pub mod wire;

pub use forwarder::FrameForwarder;
pub use listener::{EVENT_BRIDGE_PORT, EVENT_POLL_INTERVAL, EventBridgeListener, InputSink};
pub use wire::{FrameCodec, FrameMessage, MAX_PAYLOAD_SIZE};
