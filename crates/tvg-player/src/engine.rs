//! The engine strategy interface.
//!
//! A session selects exactly one engine per channel assignment. Engines own
//! their background I/O and report progress through an event channel; the
//! session never observes events from an engine it has superseded.

use tokio::sync::mpsc;

use tvg_core::config::PlayerConfig;

use crate::surface::PlaybackSurface;

/// Which engine implementation a spec asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    MpegTs,
    Hls,
}

/// Everything a factory needs to build an engine.
#[derive(Debug, Clone)]
pub struct EngineSpec {
    pub kind: EngineKind,
    /// Relay-wrapped URL the engine should fetch.
    pub source_url: String,
    pub config: PlayerConfig,
}

/// Broad class of an engine failure, driving the recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Network,
    Media,
    AutoplayBlocked,
    Other,
}

/// An engine failure with enough detail to pick a recovery path.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    pub class: ErrorClass,
    pub fatal: bool,
    pub message: String,
}

impl EngineError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Network,
            fatal: true,
            message: message.into(),
        }
    }

    pub fn media(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Media,
            fatal: true,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Other,
            fatal: true,
            message: message.into(),
        }
    }

    pub fn autoplay_blocked() -> Self {
        Self {
            class: ErrorClass::AutoplayBlocked,
            fatal: false,
            message: "autoplay blocked by the host".into(),
        }
    }

    pub fn non_fatal(mut self) -> Self {
        self.fatal = false;
        self
    }
}

/// Notifications an engine sends back to its session.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The pre-roll stash has filled; playback can start.
    Settled,
    /// A manifest was parsed with this many quality levels.
    ManifestParsed { levels: usize },
    /// The buffer ran dry mid-play.
    Stalled,
    /// Data arrived again after a stall.
    Resumed,
    /// The stream finished.
    Ended,
    /// Something went wrong.
    Failed(EngineError),
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// The single capability set every engine implements.
///
/// Selected once at channel-assignment time; switching engines always goes
/// through a full teardown first.
pub trait Engine: Send {
    /// Bind the engine to a playback surface.
    fn attach(&mut self, surface: &mut dyn PlaybackSurface) -> Result<(), EngineError>;
    fn play(&mut self) -> Result<(), EngineError>;
    fn pause(&mut self) -> Result<(), EngineError>;
    /// Stop all background work. Must be safe to call more than once.
    fn dispose(&mut self);
}

/// Builds engines for a session.
pub trait EngineFactory: Send + Sync {
    fn build(&self, spec: &EngineSpec, events: EngineEventSender) -> Box<dyn Engine>;
}

/// The production factory: streaming engines fetching through the relay.
#[derive(Debug, Default)]
pub struct StreamingEngineFactory;

impl EngineFactory for StreamingEngineFactory {
    fn build(&self, spec: &EngineSpec, events: EngineEventSender) -> Box<dyn Engine> {
        match spec.kind {
            EngineKind::MpegTs => Box::new(crate::engines::MpegTsEngine::new(spec, events)),
            EngineKind::Hls => Box::new(crate::engines::HlsEngine::new(spec, events)),
        }
    }
}
