//! Segmented HLS engine.
//!
//! Fetches the (relay-rewritten) playlist, picks the first variant of a
//! master playlist, then keeps a bounded forward buffer of segments topped
//! up. Live playlists are refreshed on the target-duration cadence;
//! low-latency mode halves it and is off by default.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tvg_core::config::PlayerConfig;
use url::Url;

use crate::engine::{Engine, EngineError, EngineEvent, EngineEventSender, EngineSpec};
use crate::engines::mpegts::{SharedStash, Stash};
use crate::surface::PlaybackSurface;

const BACKPRESSURE_POLL: Duration = Duration::from_millis(50);
const DEFAULT_TARGET_DURATION: Duration = Duration::from_secs(6);

/// Segmented-playlist engine.
pub struct HlsEngine {
    source_url: String,
    config: PlayerConfig,
    events: EngineEventSender,
    buffer: SharedStash,
    playing: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl HlsEngine {
    pub fn new(spec: &EngineSpec, events: EngineEventSender) -> Self {
        Self {
            source_url: spec.source_url.clone(),
            config: spec.config.clone(),
            events,
            buffer: Arc::new(Mutex::new(Stash::default())),
            playing: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// The segment buffer consumers demux from.
    pub fn buffer(&self) -> SharedStash {
        Arc::clone(&self.buffer)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }
}

impl Engine for HlsEngine {
    fn attach(&mut self, surface: &mut dyn PlaybackSurface) -> Result<(), EngineError> {
        if self.task.is_some() {
            return Ok(());
        }
        surface.clear_source();

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| EngineError::other(format!("failed to build fetch client: {e}")))?;

        let source_url = self.source_url.clone();
        let config = self.config.clone();
        let buffer = Arc::clone(&self.buffer);
        let events = self.events.clone();

        self.task = Some(tokio::spawn(async move {
            run_hls(client, source_url, config, buffer, events).await;
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

impl Drop for HlsEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn run_hls(
    client: reqwest::Client,
    source_url: String,
    config: PlayerConfig,
    buffer: SharedStash,
    events: EngineEventSender,
) {
    let manifest_url = match Url::parse(&source_url) {
        Ok(u) => u,
        Err(e) => {
            let _ = events.send(EngineEvent::Failed(EngineError::other(format!(
                "invalid source url '{source_url}': {e}"
            ))));
            return;
        }
    };

    let manifest_timeout = Duration::from_millis(config.manifest_timeout_ms);
    let level_timeout = Duration::from_millis(config.level_timeout_ms);
    let fragment_timeout = Duration::from_millis(config.fragment_timeout_ms);

    let body = match fetch_text(&client, manifest_url.clone(), manifest_timeout).await {
        Ok(b) => b,
        Err(err) => {
            let _ = events.send(EngineEvent::Failed(err));
            return;
        }
    };

    // A master playlist advertises variants; a media playlist is itself the
    // single level.
    let (media_url, mut playlist, levels) = match master_level_count(&body) {
        Some(levels) => {
            let Some(variant) = first_variant(&body) else {
                let _ = events.send(EngineEvent::Failed(EngineError::media(
                    "master playlist lists no variants",
                )));
                return;
            };
            let level_url = match manifest_url.join(&variant) {
                Ok(u) => u,
                Err(e) => {
                    let _ = events.send(EngineEvent::Failed(EngineError::media(format!(
                        "invalid variant reference '{variant}': {e}"
                    ))));
                    return;
                }
            };
            let media = match fetch_text(&client, level_url.clone(), level_timeout).await {
                Ok(b) => b,
                Err(err) => {
                    let _ = events.send(EngineEvent::Failed(err));
                    return;
                }
            };
            (level_url, media, levels)
        }
        None => (manifest_url.clone(), body, 1),
    };

    let _ = events.send(EngineEvent::ManifestParsed { levels });

    let mut last_fetched: Option<String> = None;
    loop {
        let target = target_duration(&playlist);
        let max_segments =
            (u64::from(config.max_buffer_secs) / target.as_secs().max(1)).max(1) as usize;

        for uri in new_segments(&playlist, last_fetched.as_deref()) {
            while buffer.lock().segments() >= max_segments {
                tokio::time::sleep(BACKPRESSURE_POLL).await;
            }
            let segment_url = match media_url.join(&uri) {
                Ok(u) => u,
                Err(e) => {
                    let _ = events.send(EngineEvent::Failed(EngineError::media(format!(
                        "invalid segment reference '{uri}': {e}"
                    ))));
                    return;
                }
            };
            let payload = match fetch_bytes(&client, segment_url, fragment_timeout).await {
                Ok(p) => p,
                Err(err) => {
                    let _ = events.send(EngineEvent::Failed(err));
                    return;
                }
            };
            if !looks_like_media(&payload) {
                let _ = events.send(EngineEvent::Failed(EngineError::media(format!(
                    "segment '{uri}' is not decodable media"
                ))));
                return;
            }
            buffer.lock().push(payload);
            last_fetched = Some(uri);
        }

        if playlist.contains("#EXT-X-ENDLIST") {
            let _ = events.send(EngineEvent::Ended);
            return;
        }

        let refresh = if config.low_latency { target / 2 } else { target };
        tokio::time::sleep(refresh).await;
        playlist = match fetch_text(&client, media_url.clone(), level_timeout).await {
            Ok(b) => b,
            Err(err) => {
                let _ = events.send(EngineEvent::Failed(err));
                return;
            }
        };
    }
}

async fn fetch_text(client: &reqwest::Client, url: Url, limit: Duration) -> Result<String, EngineError> {
    let bytes = fetch_bytes(client, url, limit).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn fetch_bytes(
    client: &reqwest::Client,
    url: Url,
    limit: Duration,
) -> Result<Bytes, EngineError> {
    let request = client.get(url.as_str()).send();
    let response = match tokio::time::timeout(limit, request).await {
        Err(_) => {
            return Err(EngineError::network(format!(
                "fetch of {url} timed out after {}ms",
                limit.as_millis()
            )))
        }
        Ok(Err(e)) => return Err(EngineError::network(format!("fetch of {url} failed: {e}"))),
        Ok(Ok(r)) => r,
    };
    if !response.status().is_success() {
        return Err(EngineError::network(format!(
            "fetch of {url} returned {}",
            response.status()
        )));
    }
    match tokio::time::timeout(limit, response.bytes()).await {
        Err(_) => Err(EngineError::network(format!(
            "body of {url} timed out after {}ms",
            limit.as_millis()
        ))),
        Ok(Err(e)) => Err(EngineError::network(format!("body of {url} failed: {e}"))),
        Ok(Ok(bytes)) => Ok(bytes),
    }
}

fn master_level_count(playlist: &str) -> Option<usize> {
    let count = playlist
        .lines()
        .filter(|l| l.trim_start().starts_with("#EXT-X-STREAM-INF"))
        .count();
    (count > 0).then_some(count)
}

fn first_variant(playlist: &str) -> Option<String> {
    let mut after_inf = false;
    for line in playlist.lines() {
        let line = line.trim();
        if line.starts_with("#EXT-X-STREAM-INF") {
            after_inf = true;
        } else if after_inf && !line.is_empty() && !line.starts_with('#') {
            return Some(line.to_string());
        }
    }
    None
}

fn target_duration(playlist: &str) -> Duration {
    playlist
        .lines()
        .find_map(|l| l.trim().strip_prefix("#EXT-X-TARGETDURATION:"))
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TARGET_DURATION)
}

/// Segment URIs not yet fetched.
///
/// Live windows slide, so everything after the last fetched URI is new; if
/// that URI has already left the window, the whole listing is new.
fn new_segments(playlist: &str, last_fetched: Option<&str>) -> Vec<String> {
    let uris: Vec<String> = playlist
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();
    match last_fetched {
        Some(last) => match uris.iter().rposition(|u| u == last) {
            Some(idx) => uris[idx + 1..].to_vec(),
            None => uris,
        },
        None => uris,
    }
}

/// MPEG-TS sync byte or an fMP4 box signature near the start.
fn looks_like_media(payload: &[u8]) -> bool {
    if payload.is_empty() {
        return false;
    }
    if payload[0] == 0x47 {
        return true;
    }
    let head = &payload[..payload.len().min(16)];
    head.windows(4).any(|w| w == b"ftyp")
}
