//! Upstream HTTP client.
//!
//! One shared `reqwest` client configured to never follow redirects, so the
//! relay logic can surface 3xx responses back to the caller. The header
//! phase of every fetch is bounded by the configured timeout; mid-stream
//! idle timeouts are applied by the relaying code per chunk.

use std::time::Duration;

use tvg_core::config::UpstreamConfig;
use tvg_core::{Error, Result};
use url::Url;

/// Shared upstream fetcher. Cheap to clone; handlers clone it per request.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl UpstreamClient {
    /// Build a client from the upstream config section.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::internal(format!("failed to build upstream client: {e}")))?;
        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }

    /// The configured fetch/idle timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue a GET and wait for response headers, bounded by the timeout.
    ///
    /// A timeout drops the pending request, aborting the upstream connection.
    pub async fn get(&self, target: &Url) -> Result<reqwest::Response> {
        let request = self
            .client
            .get(target.as_str())
            .header("Accept", "*/*")
            .send();
        match tokio::time::timeout(self.timeout, request).await {
            Err(_) => Err(Error::upstream_timeout(self.timeout)),
            Ok(Err(e)) if e.is_timeout() => Err(Error::upstream_timeout(self.timeout)),
            Ok(Err(e)) => Err(Error::upstream_connect(e)),
            Ok(Ok(response)) => Ok(response),
        }
    }
}
