//! tvg-core: shared foundation for the tvgate workspace.
//!
//! Carries the unified error type, the TOML configuration model, and the
//! channel catalog consumed by both the relay server and the player library.

pub mod channel;
pub mod config;
pub mod error;

pub use channel::{ChannelCatalog, ChannelDescriptor};
pub use config::Config;
pub use error::{Error, Result};
