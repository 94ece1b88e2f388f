//! Relay endpoint URL construction.

use tvg_core::Error;
use url::Url;

/// Builds URLs into the relay's `/stream` endpoint.
///
/// Engines never fetch upstream hosts themselves; everything goes through
/// the relay so the manifest rewriting and allow-list apply uniformly.
#[derive(Debug, Clone)]
pub struct RelayEndpoint {
    base: Url,
}

impl RelayEndpoint {
    /// Create an endpoint rooted at the relay's base URL, e.g.
    /// `http://127.0.0.1:8402`.
    pub fn new(base: &str) -> tvg_core::Result<Self> {
        let base = Url::parse(base)
            .map_err(|e| Error::validation(format!("invalid relay base '{base}': {e}")))?;
        Ok(Self { base })
    }

    /// Wrap an upstream URL so it is fetched through the relay.
    pub fn stream_url(&self, upstream: &str) -> String {
        format!(
            "{}/stream?url={}",
            self.base.as_str().trim_end_matches('/'),
            urlencoding::encode(upstream)
        )
    }
}
