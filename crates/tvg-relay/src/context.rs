//! Shared request context.
//!
//! [`RelayContext`] is the state handed to every route handler via Axum. It
//! holds only immutable shared pieces; the relay itself is stateless per
//! request.

use std::sync::Arc;

use tvg_core::{ChannelCatalog, Config, Result};

use crate::allow::AllowList;
use crate::upstream::UpstreamClient;

/// Application context shared across handlers.
#[derive(Clone)]
pub struct RelayContext {
    pub config: Arc<Config>,
    pub upstream: UpstreamClient,
    pub allow_list: Arc<AllowList>,
    pub catalog: Arc<ChannelCatalog>,
}

impl RelayContext {
    /// Build the context from a loaded configuration.
    pub fn new(config: Config) -> Result<Self> {
        let upstream = UpstreamClient::from_config(&config.upstream)?;
        let allow_list = Arc::new(AllowList::new(config.upstream.allowed_hosts.iter()));
        let catalog = Arc::new(ChannelCatalog::new(config.channels.clone()));
        Ok(Self {
            config: Arc::new(config),
            upstream,
            allow_list,
            catalog,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvg_core::ChannelDescriptor;

    #[test]
    fn builds_catalog_and_allow_list_from_config() {
        let mut config = Config::default();
        config.upstream.allowed_hosts = vec!["origin.example".into()];
        config.channels = vec![ChannelDescriptor {
            id: "one".into(),
            name: "One".into(),
            logo_url: None,
            category: None,
            source_url: "http://origin.example/live/one.ts".into(),
        }];

        let ctx = RelayContext::new(config).unwrap();
        assert!(ctx.allow_list.permits("origin.example"));
        assert_eq!(ctx.catalog.len(), 1);
        assert!(ctx.catalog.get("one").is_some());
    }
}
