//! Continuous MPEG-TS engine.
//!
//! One long relay fetch feeds a bounded pre-roll stash. Correctness is
//! preferred over latency: the reader never chases the live edge, it keeps
//! the stash as full as capacity allows and parks when the consumer falls
//! behind.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::engine::{Engine, EngineError, EngineEvent, EngineEventSender, EngineSpec};
use crate::surface::PlaybackSurface;

/// How long without a chunk before the stream counts as stalled.
const STALL_WINDOW: Duration = Duration::from_secs(3);
/// Poll interval while the stash sits at capacity.
const BACKPRESSURE_POLL: Duration = Duration::from_millis(50);

/// Chunks waiting to be demuxed, bounded by the configured capacity.
#[derive(Debug, Default)]
pub struct Stash {
    chunks: VecDeque<Bytes>,
    bytes: usize,
}

impl Stash {
    pub(crate) fn push(&mut self, chunk: Bytes) {
        self.bytes += chunk.len();
        self.chunks.push_back(chunk);
    }

    pub fn pop(&mut self) -> Option<Bytes> {
        let chunk = self.chunks.pop_front();
        if let Some(c) = &chunk {
            self.bytes -= c.len();
        }
        chunk
    }

    pub fn buffered_bytes(&self) -> usize {
        self.bytes
    }

    pub fn segments(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

pub type SharedStash = Arc<Mutex<Stash>>;

/// Continuous-stream engine.
pub struct MpegTsEngine {
    source_url: String,
    settle_delay: Duration,
    capacity: usize,
    events: EngineEventSender,
    stash: SharedStash,
    playing: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl MpegTsEngine {
    pub fn new(spec: &EngineSpec, events: EngineEventSender) -> Self {
        Self {
            source_url: spec.source_url.clone(),
            settle_delay: Duration::from_millis(spec.config.settle_delay_ms),
            capacity: spec.config.stash_capacity_kib * 1024,
            events,
            stash: Arc::new(Mutex::new(Stash::default())),
            playing: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// The stash consumers demux from.
    pub fn stash(&self) -> SharedStash {
        Arc::clone(&self.stash)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }
}

impl Engine for MpegTsEngine {
    fn attach(&mut self, surface: &mut dyn PlaybackSurface) -> Result<(), EngineError> {
        if self.task.is_some() {
            return Ok(());
        }
        // The engine owns the media pipeline from here; any native source
        // would fight it for the surface.
        surface.clear_source();

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| EngineError::other(format!("failed to build fetch client: {e}")))?;

        let source_url = self.source_url.clone();
        let settle_delay = self.settle_delay;
        let capacity = self.capacity;
        let stash = Arc::clone(&self.stash);
        let events = self.events.clone();

        self.task = Some(tokio::spawn(async move {
            run_fetch(client, source_url, settle_delay, capacity, stash, events).await;
        }));
        Ok(())
    }

    fn play(&mut self) -> Result<(), EngineError> {
        self.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.playing.store(false, Ordering::Release);
        Ok(())
    }

    fn dispose(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for MpegTsEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// The fetch loop.
///
/// The relay surfaces upstream redirects as redirects into itself; the
/// default client policy follows them transparently.
async fn run_fetch(
    client: reqwest::Client,
    source_url: String,
    settle_delay: Duration,
    capacity: usize,
    stash: SharedStash,
    events: EngineEventSender,
) {
    let mut response = match client.get(&source_url).send().await {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            let _ = events.send(EngineEvent::Failed(EngineError::network(format!(
                "stream fetch returned {}",
                r.status()
            ))));
            return;
        }
        Err(e) => {
            let _ = events.send(EngineEvent::Failed(EngineError::network(format!(
                "stream fetch failed: {e}"
            ))));
            return;
        }
    };

    let settle_at = Instant::now() + settle_delay;
    let mut settled = false;
    let mut stalled = false;

    loop {
        match tokio::time::timeout(STALL_WINDOW, response.chunk()).await {
            Err(_) => {
                let has_data = !stash.lock().is_empty();
                if !settled {
                    if has_data && Instant::now() >= settle_at {
                        settled = true;
                        let _ = events.send(EngineEvent::Settled);
                    }
                } else if !stalled {
                    stalled = true;
                    let _ = events.send(EngineEvent::Stalled);
                }
            }
            Ok(Ok(Some(chunk))) => {
                if stalled {
                    stalled = false;
                    let _ = events.send(EngineEvent::Resumed);
                }
                push_chunk(&stash, capacity, chunk).await;
                if !settled && Instant::now() >= settle_at {
                    settled = true;
                    let _ = events.send(EngineEvent::Settled);
                }
            }
            Ok(Ok(None)) => {
                // A finite stream that fully buffered still counts as ready.
                if !settled && !stash.lock().is_empty() {
                    let _ = events.send(EngineEvent::Settled);
                }
                let _ = events.send(EngineEvent::Ended);
                return;
            }
            Ok(Err(e)) => {
                let _ = events.send(EngineEvent::Failed(EngineError::network(format!(
                    "stream read failed: {e}"
                ))));
                return;
            }
        }
    }
}

/// Park until the stash has room, then push.
///
/// A single chunk larger than the whole capacity is admitted into an empty
/// stash rather than wedging the reader.
async fn push_chunk(stash: &SharedStash, capacity: usize, chunk: Bytes) {
    loop {
        {
            let mut guard = stash.lock();
            if guard.bytes + chunk.len() <= capacity || guard.chunks.is_empty() {
                guard.push(chunk);
                return;
            }
        }
        tokio::time::sleep(BACKPRESSURE_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineKind;
    use tokio::sync::mpsc;
    use tvg_core::config::PlayerConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn spec_for(url: String) -> EngineSpec {
        let config = PlayerConfig {
            settle_delay_ms: 10,
            ..PlayerConfig::default()
        };
        EngineSpec {
            kind: EngineKind::MpegTs,
            source_url: url,
            config,
        }
    }

    struct NullSurface;

    impl PlaybackSurface for NullSurface {
        fn set_source(&mut self, _url: &str) {}
        fn clear_source(&mut self) {}
        fn set_muted(&mut self, _muted: bool) {}
        fn request_play(&mut self) {}
        fn request_pause(&mut self) {}
        fn request_fullscreen(&mut self) {}
        fn supports_native_hls(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn buffers_the_stream_and_settles() {
        let server = MockServer::start().await;
        let body: Vec<u8> = vec![0x47; 376];
        Mock::given(method("GET"))
            .and(path("/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = MpegTsEngine::new(&spec_for(format!("{}/stream", server.uri())), tx);
        let stash = engine.stash();
        engine.attach(&mut NullSurface).unwrap();
        engine.play().unwrap();

        let mut saw_settled = false;
        loop {
            match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
                Ok(Some(EngineEvent::Settled)) => saw_settled = true,
                Ok(Some(EngineEvent::Ended)) => break,
                Ok(Some(other)) => panic!("unexpected event: {other:?}"),
                Ok(None) | Err(_) => panic!("stream did not finish"),
            }
        }
        assert!(saw_settled);

        let mut collected = Vec::new();
        while let Some(chunk) = stash.lock().pop() {
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, body);

        engine.dispose();
    }

    #[tokio::test]
    async fn unreachable_source_fails_with_network_class() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = MpegTsEngine::new(&spec_for("http://127.0.0.1:1/stream".into()), tx);
        engine.attach(&mut NullSurface).unwrap();

        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(EngineEvent::Failed(err))) => {
                assert_eq!(err.class, crate::engine::ErrorClass::Network);
            }
            other => panic!("expected a network failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_success_status_fails_with_network_class() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stream"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = MpegTsEngine::new(&spec_for(format!("{}/stream", server.uri())), tx);
        engine.attach(&mut NullSurface).unwrap();

        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(EngineEvent::Failed(err))) => {
                assert_eq!(err.class, crate::engine::ErrorClass::Network);
                assert!(err.message.contains("502"));
            }
            other => panic!("expected a network failure, got {other:?}"),
        }
    }

    #[test]
    fn play_and_pause_drive_the_playing_flag() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut engine = MpegTsEngine::new(&spec_for("http://127.0.0.1:1/stream".into()), tx);
        assert!(!engine.is_playing());
        engine.play().unwrap();
        assert!(engine.is_playing());
        engine.pause().unwrap();
        assert!(!engine.is_playing());
    }

    #[test]
    fn stash_tracks_buffered_bytes() {
        let mut stash = Stash::default();
        stash.push(Bytes::from_static(b"abcd"));
        stash.push(Bytes::from_static(b"ef"));
        assert_eq!(stash.buffered_bytes(), 6);
        assert_eq!(stash.pop().unwrap(), Bytes::from_static(b"abcd"));
        assert_eq!(stash.buffered_bytes(), 2);
        assert!(!stash.is_empty());
        assert_eq!(stash.pop().unwrap(), Bytes::from_static(b"ef"));
        assert!(stash.is_empty());
    }
}
