//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`tvg_core::Error`] so route handlers can
//! return `Result<T, AppError>` and bubble failures with `?`. Every error
//! body is the relay's contractual JSON shape: `{"error": <message>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError(tvg_core::Error);

impl AppError {
    pub fn new(inner: tvg_core::Error) -> Self {
        Self(inner)
    }
}

impl From<tvg_core::Error> for AppError {
    fn from(e: tvg_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Relay request failed");
        } else {
            tracing::debug!(status = %status, error = %self.0, "Relay request rejected");
        }

        let body = json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_produces_400() {
        let err = AppError::new(tvg_core::Error::validation("missing url parameter"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn forbidden_produces_403() {
        let err = AppError::new(tvg_core::Error::forbidden("evil.example"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn upstream_timeout_produces_504() {
        let err = AppError::new(tvg_core::Error::upstream_timeout(
            std::time::Duration::from_secs(30),
        ));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn upstream_connect_produces_502() {
        let err = AppError::new(tvg_core::Error::upstream_connect("refused"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
