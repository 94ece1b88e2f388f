//! The playback session state machine.
//!
//! One session per on-screen slot. A session owns its surface and at most
//! one engine; assigning a channel always tears the previous engine down
//! first (detach, then dispose), so an engine never outlives its assignment
//! and never reports into a session that has moved on. Two sessions share
//! nothing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use tvg_core::config::PlayerConfig;
use tvg_core::ChannelDescriptor;

use crate::classify::{classify, SourceKind};
use crate::engine::{
    Engine, EngineError, EngineEvent, EngineEventReceiver, EngineFactory, EngineKind, EngineSpec,
    ErrorClass,
};
use crate::relay::RelayEndpoint;
use crate::surface::{PlaybackSurface, SurfaceEvent};

const GENERIC_ERROR: &str = "Cannot load this channel";
const NETWORK_ERROR: &str = "Playback stopped, check your connection";

/// User-visible playback state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Loading,
    Playing,
    Paused,
    Buffering,
    /// Terminal for the current assignment; exited by reassigning.
    Errored { message: String },
}

pub struct PlayerSession {
    factory: Arc<dyn EngineFactory>,
    surface: Box<dyn PlaybackSurface>,
    relay: RelayEndpoint,
    config: PlayerConfig,
    channel: Option<ChannelDescriptor>,
    engine: Option<Box<dyn Engine>>,
    engine_kind: Option<EngineKind>,
    events: Option<EngineEventReceiver>,
    status: PlaybackStatus,
    muted: bool,
    media_recoveries: u32,
    hls_media_recovered: bool,
    scheduled_retry: Option<Instant>,
}

impl PlayerSession {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        surface: Box<dyn PlaybackSurface>,
        relay: RelayEndpoint,
        config: PlayerConfig,
    ) -> Self {
        Self {
            factory,
            surface,
            relay,
            config,
            channel: None,
            engine: None,
            engine_kind: None,
            events: None,
            status: PlaybackStatus::Idle,
            muted: false,
            media_recoveries: 0,
            hls_media_recovered: false,
            scheduled_retry: None,
        }
    }

    pub fn status(&self) -> &PlaybackStatus {
        &self.status
    }

    pub fn channel(&self) -> Option<&ChannelDescriptor> {
        self.channel.as_ref()
    }

    pub fn engine_kind(&self) -> Option<EngineKind> {
        self.engine_kind
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Whether a reload is waiting on its delay.
    pub fn retry_pending(&self) -> bool {
        self.scheduled_retry.is_some()
    }

    /// Bind a channel to this session, replacing whatever was playing.
    pub fn assign_channel(&mut self, channel: ChannelDescriptor) {
        self.teardown();
        self.media_recoveries = 0;
        self.hls_media_recovered = false;
        tracing::info!(channel = %channel.id, "Assigning channel");
        self.channel = Some(channel);
        self.status = PlaybackStatus::Loading;
        self.start_engine();
    }

    /// Return to [`PlaybackStatus::Idle`] with no channel bound.
    pub fn clear_channel(&mut self) {
        self.teardown();
        self.channel = None;
        self.status = PlaybackStatus::Idle;
    }

    /// Detach listeners first, then dispose the engine. Idempotent; safe
    /// with no engine bound.
    pub fn teardown(&mut self) {
        self.events = None;
        if let Some(mut engine) = self.engine.take() {
            engine.dispose();
        }
        self.engine_kind = None;
        self.scheduled_retry = None;
        self.surface.clear_source();
    }

    /// Drain pending engine events into the state machine. Cheap; call from
    /// a UI tick.
    pub fn pump(&mut self) {
        loop {
            let event = match self.events.as_mut().map(|rx| rx.try_recv()) {
                Some(Ok(event)) => event,
                _ => return,
            };
            self.handle_engine_event(event);
        }
    }

    /// Fire a due scheduled reload. Returns true if one started.
    pub fn poll_retry(&mut self, now: Instant) -> bool {
        match self.scheduled_retry {
            Some(due) if now >= due => {
                self.scheduled_retry = None;
                tracing::info!("Retrying stream load");
                self.status = PlaybackStatus::Loading;
                self.start_engine();
                true
            }
            _ => false,
        }
    }

    pub fn toggle_play(&mut self) {
        match &self.status {
            PlaybackStatus::Playing | PlaybackStatus::Buffering => {
                if let Some(engine) = self.engine.as_mut() {
                    if let Err(err) = engine.pause() {
                        tracing::warn!(%err, "Pause failed");
                    }
                } else {
                    self.surface.request_pause();
                }
                self.status = PlaybackStatus::Paused;
            }
            PlaybackStatus::Paused => {
                if let Some(engine) = self.engine.as_mut() {
                    match engine.play() {
                        Ok(()) => self.status = PlaybackStatus::Playing,
                        Err(err) if err.class == ErrorClass::AutoplayBlocked => {
                            tracing::debug!("Autoplay still blocked");
                        }
                        Err(err) => self.handle_engine_error(err),
                    }
                } else {
                    self.surface.request_play();
                    self.status = PlaybackStatus::Playing;
                }
            }
            PlaybackStatus::Idle | PlaybackStatus::Loading | PlaybackStatus::Errored { .. } => {}
        }
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.surface.set_muted(self.muted);
    }

    pub fn request_fullscreen(&mut self) {
        self.surface.request_fullscreen();
    }

    /// Surface events update status no matter which engine is active, so
    /// the state machine stays consistent for native and direct playback.
    pub fn handle_surface_event(&mut self, event: SurfaceEvent) {
        if matches!(
            self.status,
            PlaybackStatus::Idle | PlaybackStatus::Errored { .. }
        ) {
            return;
        }
        match event {
            SurfaceEvent::Play => self.status = PlaybackStatus::Playing,
            SurfaceEvent::Pause => self.status = PlaybackStatus::Paused,
            SurfaceEvent::Waiting => self.status = PlaybackStatus::Buffering,
            SurfaceEvent::CanPlay => {
                if matches!(
                    self.status,
                    PlaybackStatus::Loading | PlaybackStatus::Buffering
                ) {
                    self.status = PlaybackStatus::Playing;
                }
            }
            SurfaceEvent::Error => {
                tracing::warn!("Surface reported a playback error");
                self.teardown();
                self.fail(GENERIC_ERROR);
            }
        }
    }

    fn start_engine(&mut self) {
        let Some(channel) = self.channel.clone() else {
            return;
        };
        match classify(&channel.source_url) {
            SourceKind::ContinuousTs => self.build_engine(EngineKind::MpegTs, &channel.source_url),
            SourceKind::SegmentedHls => {
                if self.surface.supports_native_hls() {
                    // The surface demuxes HLS itself; still feed it through
                    // the relay so rewriting and the allow-list apply.
                    let url = self.relay.stream_url(&channel.source_url);
                    self.surface.set_source(&url);
                } else {
                    self.build_engine(EngineKind::Hls, &channel.source_url);
                }
            }
            SourceKind::Direct => {
                self.surface.set_source(&channel.source_url);
            }
        }
    }

    fn build_engine(&mut self, kind: EngineKind, source_url: &str) {
        let spec = EngineSpec {
            kind,
            source_url: self.relay.stream_url(source_url),
            config: self.config.clone(),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let mut engine = self.factory.build(&spec, tx);
        if let Err(err) = engine.attach(self.surface.as_mut()) {
            tracing::warn!(%err, "Engine attach failed");
            engine.dispose();
            self.fail(GENERIC_ERROR);
            return;
        }
        self.engine = Some(engine);
        self.engine_kind = Some(kind);
        self.events = Some(rx);
    }

    /// Dispose the current engine and build a fresh one for the same
    /// channel, keeping the visible status untouched.
    fn rebuild_engine(&mut self) {
        self.teardown();
        self.start_engine();
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Settled => self.begin_playback(),
            EngineEvent::ManifestParsed { levels } => {
                tracing::debug!(levels, "Manifest parsed");
                if levels > 0 {
                    self.begin_playback();
                }
            }
            EngineEvent::Stalled => {
                if self.status == PlaybackStatus::Playing {
                    self.status = PlaybackStatus::Buffering;
                }
            }
            EngineEvent::Resumed => {
                if self.status == PlaybackStatus::Buffering {
                    self.status = PlaybackStatus::Playing;
                }
            }
            EngineEvent::Ended => {
                tracing::info!("Stream ended");
                if matches!(
                    self.status,
                    PlaybackStatus::Playing | PlaybackStatus::Buffering
                ) {
                    self.status = PlaybackStatus::Paused;
                }
            }
            EngineEvent::Failed(err) => self.handle_engine_error(err),
        }
    }

    fn begin_playback(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        match engine.play() {
            Ok(()) => self.status = PlaybackStatus::Playing,
            Err(err) if err.class == ErrorClass::AutoplayBlocked => {
                tracing::debug!("Autoplay blocked; paused and ready");
                self.status = PlaybackStatus::Paused;
            }
            Err(err) => self.handle_engine_error(err),
        }
    }

    fn handle_engine_error(&mut self, err: EngineError) {
        match self.engine_kind {
            Some(EngineKind::MpegTs) => self.handle_continuous_error(err),
            Some(EngineKind::Hls) => self.handle_hls_error(err),
            None => {
                tracing::warn!(%err, "Engine error with no engine bound");
                self.fail(GENERIC_ERROR);
            }
        }
    }

    /// Continuous streams reconnect at the relay layer, not here: network
    /// faults are terminal for the assignment. Media faults get a bounded
    /// silent self-heal.
    fn handle_continuous_error(&mut self, err: EngineError) {
        match err.class {
            ErrorClass::Network => {
                tracing::warn!(%err, "Continuous stream network error");
                self.teardown();
                self.fail(NETWORK_ERROR);
            }
            ErrorClass::Media => {
                if self.media_recoveries < self.config.media_recovery_limit {
                    self.media_recoveries += 1;
                    tracing::info!(
                        attempt = self.media_recoveries,
                        "Recovering from media error"
                    );
                    self.rebuild_engine();
                } else {
                    tracing::warn!(%err, "Media recovery limit reached");
                    self.teardown();
                    self.fail(GENERIC_ERROR);
                }
            }
            ErrorClass::AutoplayBlocked => self.status = PlaybackStatus::Paused,
            ErrorClass::Other => {
                tracing::warn!(%err, "Continuous stream error");
                self.teardown();
                self.fail(GENERIC_ERROR);
            }
        }
    }

    /// Segmented playback acts on fatal errors only. Network faults reload
    /// after a delay and never escalate; media faults recover once.
    fn handle_hls_error(&mut self, err: EngineError) {
        if !err.fatal {
            tracing::debug!(%err, "Non-fatal hls error ignored");
            return;
        }
        match err.class {
            ErrorClass::Network => {
                let delay = Duration::from_millis(self.config.retry_delay_ms);
                tracing::info!(%err, delay_ms = self.config.retry_delay_ms, "Scheduling stream reload");
                self.teardown();
                self.scheduled_retry = Some(Instant::now() + delay);
            }
            ErrorClass::Media => {
                if !self.hls_media_recovered {
                    self.hls_media_recovered = true;
                    tracing::info!("Attempting media error recovery");
                    self.rebuild_engine();
                } else {
                    tracing::warn!(%err, "Repeated media error");
                    self.teardown();
                    self.fail(GENERIC_ERROR);
                }
            }
            ErrorClass::AutoplayBlocked => self.status = PlaybackStatus::Paused,
            ErrorClass::Other => {
                tracing::warn!(%err, "Fatal hls error");
                self.teardown();
                self.fail(GENERIC_ERROR);
            }
        }
    }

    fn fail(&mut self, message: &str) {
        self.status = PlaybackStatus::Errored {
            message: message.to_string(),
        };
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
