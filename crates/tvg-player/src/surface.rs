//! The playback surface abstraction.
//!
//! The surface is whatever renders video for a session: a `<video>` element
//! in a browser shell, a mock in tests. The session forwards its events into
//! the state machine so status stays consistent even when no engine object
//! exists at all (native and direct playback).

/// Events a playback surface raises, independent of any engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Play,
    Pause,
    Waiting,
    CanPlay,
    Error,
}

/// The rendering surface a session drives.
pub trait PlaybackSurface: Send {
    /// Point the surface at a URL it should load natively.
    fn set_source(&mut self, url: &str);
    /// Drop the current source and any buffered media.
    fn clear_source(&mut self);
    fn set_muted(&mut self, muted: bool);
    fn request_play(&mut self);
    fn request_pause(&mut self);
    fn request_fullscreen(&mut self);
    /// Whether the surface can demux HLS without a software engine.
    fn supports_native_hls(&self) -> bool;
}
