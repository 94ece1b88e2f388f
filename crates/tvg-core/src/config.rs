//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! server, upstream, and player sections plus the static channel catalog.
//! Every section defaults sensibly so a completely empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::channel::ChannelDescriptor;
use crate::error::Result;
use crate::Error;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub player: PlayerConfig,
    #[serde(default)]
    pub channels: Vec<ChannelDescriptor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            player: PlayerConfig::default(),
            channels: Vec::new(),
        }
    }
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    ///
    /// This is intentionally string-based so the caller can read the file
    /// however it sees fit (async, embedded, etc.).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.upstream.allowed_hosts.is_empty() {
            warnings.push(
                "upstream.allowed_hosts is empty; every relay request will be rejected".into(),
            );
        }

        if self.upstream.timeout_secs == 0 {
            warnings.push("upstream.timeout_secs is 0; upstream fetches will fail instantly".into());
        }

        if self.upstream.max_redirect_hops == 0 {
            warnings.push("upstream.max_redirect_hops is 0; upstream redirects will be rejected".into());
        }

        if self.player.media_recovery_limit == 0 {
            warnings.push(
                "player.media_recovery_limit is 0; the first media error will end playback".into(),
            );
        }

        if self.player.max_buffer_secs < self.player.back_buffer_secs {
            warnings.push(format!(
                "player.max_buffer_secs ({}) is smaller than player.back_buffer_secs ({})",
                self.player.max_buffer_secs, self.player.back_buffer_secs
            ));
        }

        let mut seen_ids: Vec<&str> = Vec::new();
        for (i, channel) in self.channels.iter().enumerate() {
            if channel.name.trim().is_empty() {
                warnings.push(format!("channels[{i}].name is empty"));
            }
            if seen_ids.contains(&channel.id.as_str()) {
                warnings.push(format!(
                    "channels[{i}].id '{}' duplicates an earlier channel",
                    channel.id
                ));
            } else {
                seen_ids.push(&channel.id);
            }
            if url::Url::parse(&channel.source_url).is_err() {
                warnings.push(format!(
                    "channels[{i}].source_url '{}' is not an absolute URL",
                    channel.source_url
                ));
            }
        }

        warnings
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8402,
            static_dir: None,
        }
    }
}

/// Upstream fetch settings for the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Hostnames the relay may contact; the sole SSRF guard.
    pub allowed_hosts: Vec<String>,
    /// Bound on the header phase of a fetch and on mid-stream idle time.
    pub timeout_secs: u64,
    /// Bound on the redirect-via-self hop counter.
    pub max_redirect_hops: u32,
    /// User-Agent presented to upstream origins.
    pub user_agent: String,
}

impl UpstreamConfig {
    /// The fetch timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            timeout_secs: 30,
            max_redirect_hops: 5,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/120.0 Safari/537.36"
                .into(),
        }
    }
}

/// Tuning knobs for the player engines and recovery policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Settling delay after attach before the first play attempt (continuous).
    pub settle_delay_ms: u64,
    /// Pre-roll stash buffer capacity for the continuous engine.
    pub stash_capacity_kib: usize,
    /// Delay before a scheduled segmented-HLS reload.
    pub retry_delay_ms: u64,
    /// Bound on consecutive media-error self-heals for the continuous engine.
    pub media_recovery_limit: u32,
    /// Seconds of already-played media the HLS engine may retain.
    pub back_buffer_secs: u32,
    /// Forward-buffer bound for the HLS engine.
    pub max_buffer_secs: u32,
    /// Low-latency live mode; disabled by default, stability preferred.
    pub low_latency: bool,
    /// Bound on a manifest fetch.
    pub manifest_timeout_ms: u64,
    /// Bound on a variant-playlist fetch.
    pub level_timeout_ms: u64,
    /// Bound on a single segment fetch.
    pub fragment_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1200,
            stash_capacity_kib: 2048,
            retry_delay_ms: 4000,
            media_recovery_limit: 3,
            back_buffer_secs: 30,
            max_buffer_secs: 60,
            low_latency: false,
            manifest_timeout_ms: 10_000,
            level_timeout_ms: 10_000,
            fragment_timeout_ms: 20_000,
        }
    }
}
