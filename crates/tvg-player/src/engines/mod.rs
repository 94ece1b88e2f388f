//! Streaming engine implementations.

pub mod hls;
pub mod mpegts;

pub use hls::HlsEngine;
pub use mpegts::{MpegTsEngine, SharedStash, Stash};
