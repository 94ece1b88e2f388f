//! tvg-player: the adaptive playback core.
//!
//! Classifies channel source URLs, selects a streaming engine, and drives a
//! per-slot session state machine covering buffering, error classification,
//! and recovery. All media fetching goes through the relay, never directly
//! to upstream hosts.

pub mod classify;
pub mod engine;
pub mod engines;
pub mod relay;
pub mod session;
pub mod surface;
pub mod testing;

pub use classify::{classify, SourceKind};
pub use engine::{
    Engine, EngineError, EngineEvent, EngineEventReceiver, EngineEventSender, EngineFactory,
    EngineKind, EngineSpec, ErrorClass, StreamingEngineFactory,
};
pub use relay::RelayEndpoint;
pub use session::{PlaybackStatus, PlayerSession};
pub use surface::{PlaybackSurface, SurfaceEvent};
