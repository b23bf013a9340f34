//! # farview-gui — Remote Display Streaming Client
//!
//! Connects to a remote streaming host, receives decoded video frames,
//! publishes them into a double-buffered render surface, and forwards
//! local input back to the session. An out-of-band bridge sends every
//! rendered frame to an external consumer and injects synthetic
//! controller events received from an external producer.

pub mod config;
pub mod input;
pub mod session;
pub mod surface;
pub mod uploader;
pub mod window;
