//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which wraps a fully-constructed [`RelayContext`].
//! The [`with_server`] constructor starts Axum on a random port for
//! HTTP-level testing against a live socket.

use std::net::SocketAddr;

use tvg_core::{ChannelDescriptor, Config};
use tvg_relay::router::build_router;
use tvg_relay::RelayContext;

/// Test harness wrapping a fully-constructed [`RelayContext`].
pub struct TestHarness {
    pub ctx: RelayContext,
}

impl TestHarness {
    /// Create a new harness with a custom configuration.
    pub fn with_config(config: Config) -> Self {
        let ctx = RelayContext::new(config).expect("failed to build relay context");
        Self { ctx }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server(config: Config) -> (Self, SocketAddr) {
        let harness = Self::with_config(config);
        let app = build_router(harness.ctx.clone(), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }
}

/// A config allow-listing the given upstream hosts, with a short fetch
/// timeout so failure-path tests stay fast.
pub fn relay_config(allowed: &[&str], timeout_secs: u64) -> Config {
    let mut config = Config::default();
    config.upstream.allowed_hosts = allowed.iter().map(|h| h.to_string()).collect();
    config.upstream.timeout_secs = timeout_secs;
    config
}

#[allow(dead_code)]
pub fn channel(id: &str, name: &str, source_url: &str) -> ChannelDescriptor {
    ChannelDescriptor {
        id: id.into(),
        name: name.into(),
        logo_url: None,
        category: None,
        source_url: source_url.into(),
    }
}
