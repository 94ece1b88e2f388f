//! Unified error type for the tvgate workspace.
//!
//! All crates funnel their failures into [`Error`], which carries enough
//! context for the relay's HTTP handlers to derive a status code via
//! [`Error::http_status`].

use std::fmt;
use std::time::Duration;

/// Unified error type covering all failure modes in tvgate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "channel").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The target hostname is not on the upstream allow-list.
    #[error("Forbidden: host '{0}' is not on the allow-list")]
    Forbidden(String),

    /// The upstream connection could not be established or broke mid-transfer.
    #[error("Upstream connection failed: {0}")]
    UpstreamConnect(String),

    /// The upstream answered with a status the relay cannot republish.
    #[error("Upstream returned status {status}")]
    UpstreamStatus {
        /// The upstream HTTP status code.
        status: u16,
    },

    /// The upstream did not respond within the configured window.
    #[error("Upstream timed out after {seconds}s")]
    UpstreamTimeout {
        /// The window that elapsed, in whole seconds.
        seconds: u64,
    },

    /// The redirect-hop counter exceeded the configured bound.
    #[error("Too many upstream redirects ({hops} hops)")]
    TooManyRedirects {
        /// The hop count that tripped the bound.
        hops: u32,
    },

    /// Configuration could not be parsed or applied.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Forbidden(_) => 403,
            Error::UpstreamConnect(_) => 502,
            Error::UpstreamStatus { .. } => 502,
            Error::UpstreamTimeout { .. } => 504,
            Error::TooManyRedirects { .. } => 502,
            Error::Config(_) => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Convenience constructor for [`Error::Forbidden`].
    pub fn forbidden(host: impl Into<String>) -> Self {
        Error::Forbidden(host.into())
    }

    /// Convenience constructor for [`Error::UpstreamConnect`].
    pub fn upstream_connect(source: impl fmt::Display) -> Self {
        Error::UpstreamConnect(source.to_string())
    }

    /// Convenience constructor for [`Error::UpstreamStatus`].
    pub fn upstream_status(status: u16) -> Self {
        Error::UpstreamStatus { status }
    }

    /// Convenience constructor for [`Error::UpstreamTimeout`].
    pub fn upstream_timeout(window: Duration) -> Self {
        Error::UpstreamTimeout {
            seconds: window.as_secs(),
        }
    }

    /// Convenience constructor for [`Error::TooManyRedirects`].
    pub fn too_many_redirects(hops: u32) -> Self {
        Error::TooManyRedirects { hops }
    }

    /// Convenience constructor for [`Error::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
