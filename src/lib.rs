//! tvgate - Live TV gateway
//!
//! This library crate re-exports the workspace crates for embedding and
//! integration testing.

pub use tvg_core as core;
pub use tvg_player as player;
pub use tvg_relay as relay;
