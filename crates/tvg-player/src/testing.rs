//! Test doubles: scripted engines, a recording factory, and a recording
//! surface, for driving a session without any real I/O.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{
    Engine, EngineError, EngineEventSender, EngineFactory, EngineKind, EngineSpec,
};
use crate::surface::PlaybackSurface;

/// Shared call recorder.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count_of(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }
}

/// Scripted engine double. Records every capability call into the log as
/// `engine[N].<call>` so ordering across engines is assertable. Error
/// scripting lives on the factory and is consulted at call time, so a test
/// can clear it mid-scenario.
pub struct MockEngine {
    id: usize,
    log: CallLog,
    attach_error: Arc<Mutex<Option<EngineError>>>,
    play_error: Arc<Mutex<Option<EngineError>>>,
}

impl Engine for MockEngine {
    fn attach(&mut self, _surface: &mut dyn PlaybackSurface) -> Result<(), EngineError> {
        self.log.record(format!("engine[{}].attach", self.id));
        match self.attach_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn play(&mut self) -> Result<(), EngineError> {
        self.log.record(format!("engine[{}].play", self.id));
        match self.play_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.log.record(format!("engine[{}].pause", self.id));
        Ok(())
    }

    fn dispose(&mut self) {
        self.log.record(format!("engine[{}].dispose", self.id));
    }
}

/// What the factory built, for assertions and event injection.
#[derive(Debug, Clone)]
pub struct BuiltEngine {
    pub id: usize,
    pub kind: EngineKind,
    pub source_url: String,
    pub events: EngineEventSender,
}

/// Factory double handing out [`MockEngine`]s.
#[derive(Default)]
pub struct MockFactory {
    log: CallLog,
    built: Mutex<Vec<BuiltEngine>>,
    attach_error: Arc<Mutex<Option<EngineError>>>,
    play_error: Arc<Mutex<Option<EngineError>>>,
}

impl MockFactory {
    pub fn new(log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            ..Default::default()
        })
    }

    /// Every engine built from now on fails its attach with this error.
    pub fn fail_attach_with(&self, err: EngineError) {
        *self.attach_error.lock() = Some(err);
    }

    /// Every engine built from now on fails its play with this error.
    pub fn fail_play_with(&self, err: EngineError) {
        *self.play_error.lock() = Some(err);
    }

    pub fn clear_play_error(&self) {
        *self.play_error.lock() = None;
    }

    pub fn built(&self) -> Vec<BuiltEngine> {
        self.built.lock().clone()
    }

    pub fn built_count(&self) -> usize {
        self.built.lock().len()
    }

    /// Event sender of the most recently built engine.
    pub fn last_events(&self) -> Option<EngineEventSender> {
        self.built.lock().last().map(|b| b.events.clone())
    }
}

impl EngineFactory for MockFactory {
    fn build(&self, spec: &EngineSpec, events: EngineEventSender) -> Box<dyn Engine> {
        let id = self.built.lock().len();
        self.log.record(format!("engine[{id}].build"));
        self.built.lock().push(BuiltEngine {
            id,
            kind: spec.kind,
            source_url: spec.source_url.clone(),
            events,
        });
        Box::new(MockEngine {
            id,
            log: self.log.clone(),
            attach_error: Arc::clone(&self.attach_error),
            play_error: Arc::clone(&self.play_error),
        })
    }
}

/// Surface double recording every interaction.
pub struct MockSurface {
    log: CallLog,
    native_hls: bool,
}

impl MockSurface {
    pub fn new(log: CallLog) -> Box<Self> {
        Box::new(Self {
            log,
            native_hls: false,
        })
    }

    /// A surface that demuxes HLS itself, like Safari.
    pub fn with_native_hls(log: CallLog) -> Box<Self> {
        Box::new(Self {
            log,
            native_hls: true,
        })
    }
}

impl PlaybackSurface for MockSurface {
    fn set_source(&mut self, url: &str) {
        self.log.record(format!("surface.set_source({url})"));
    }

    fn clear_source(&mut self) {
        self.log.record("surface.clear_source");
    }

    fn set_muted(&mut self, muted: bool) {
        self.log.record(format!("surface.set_muted({muted})"));
    }

    fn request_play(&mut self) {
        self.log.record("surface.request_play");
    }

    fn request_pause(&mut self) {
        self.log.record("surface.request_pause");
    }

    fn request_fullscreen(&mut self) {
        self.log.record("surface.request_fullscreen");
    }

    fn supports_native_hls(&self) -> bool {
        self.native_hls
    }
}
