//! # farview-core
//!
//! Core library for the farview streaming client.
//!
//! This crate contains:
//! - **Protocol**: session input-event types and the fixed-size
//!   synthetic controller record
//! - **Bridge**: the outbound frame channel (`FrameMessage` +
//!   `FrameCodec` + `FrameForwarder`) and the inbound synthetic-event
//!   listener (`EventBridgeListener`)
//! - **Video**: decoded-frame model, RGB24 conversion with pooled
//!   buffers, and the `FrameSource` decoder seam
//! - **Error**: `FarviewError` — typed, `thiserror`-based error
//!   hierarchy

pub mod bridge;
pub mod error;
pub mod protocol;
pub mod video;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use bridge::{
    EVENT_BRIDGE_PORT, EVENT_POLL_INTERVAL, EventBridgeListener, FrameCodec, FrameForwarder,
    FrameMessage, InputSink,
};
pub use error::FarviewError;
pub use protocol::{ControllerState, KeyAction, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
pub use video::{FrameSource, PixelFormat, Plane, RgbConverter, RgbImage, VideoFrame};
