//! The relay endpoints: `/stream` and `/segment`.
//!
//! Both fetch one upstream resource on behalf of the caller. `/stream` sniffs
//! the body for an HLS manifest and rewrites it; anything else is streamed
//! through unmodified. `/segment` always streams byte-for-byte. Upstream
//! redirects are never followed server-side: the caller is redirected back
//! into the same endpoint with the new target, bounded by a hop counter.

use std::collections::HashMap;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::StreamExt;
use tokio::time::Instant;
use url::Url;

use tvg_core::{Error, Result};

use crate::context::RelayContext;
use crate::error::AppError;
use crate::rewrite::{is_manifest, rewrite_manifest};

pub const STREAM_ROUTE: &str = "/stream";
pub const SEGMENT_ROUTE: &str = "/segment";

const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const TS_CONTENT_TYPE: &str = "video/mp2t";
const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// Relay a playlist or stream, rewriting manifests to re-enter the relay.
pub async fn stream(
    State(ctx): State<RelayContext>,
    Query(params): Query<HashMap<String, String>>,
) -> std::result::Result<Response, AppError> {
    let (target, hop) = authorize(&ctx, &params)?;
    let window = ctx.upstream.timeout();
    let deadline = Instant::now() + window;

    let mut response = ctx.upstream.get(&target).await?;
    if let Some(location) = redirect_location(&response, &target)? {
        tracing::debug!(target = %target, location = %location, "Surfacing upstream redirect");
        return Ok(self_redirect(STREAM_ROUTE, &location, hop + 1)?);
    }
    ensure_success(&response)?;

    let content_type = upstream_content_type(&response);
    let first = next_chunk(&mut response, deadline, window).await?;

    match first {
        Some(chunk) if is_manifest(&chunk) => {
            let raw = read_remaining(response, chunk, deadline, window).await?;
            let text = String::from_utf8_lossy(&raw);
            let rewritten = rewrite_manifest(&text, &target);
            tracing::debug!(target = %target, bytes = raw.len(), "Rewrote manifest");
            Ok(manifest_response(rewritten)?)
        }
        first => {
            tracing::debug!(target = %target, "Relaying non-manifest body");
            Ok(passthrough_response(first, response, content_type, window)?)
        }
    }
}

/// Relay a binary segment byte-for-byte, without sniffing or buffering.
pub async fn segment(
    State(ctx): State<RelayContext>,
    Query(params): Query<HashMap<String, String>>,
) -> std::result::Result<Response, AppError> {
    let (target, hop) = authorize(&ctx, &params)?;
    let window = ctx.upstream.timeout();

    let response = ctx.upstream.get(&target).await?;
    if let Some(location) = redirect_location(&response, &target)? {
        tracing::debug!(target = %target, location = %location, "Surfacing upstream redirect");
        return Ok(self_redirect(SEGMENT_ROUTE, &location, hop + 1)?);
    }
    ensure_success(&response)?;

    let content_type =
        upstream_content_type(&response).unwrap_or_else(|| TS_CONTENT_TYPE.to_string());
    tracing::debug!(target = %target, content_type = %content_type, "Relaying segment");
    Ok(segment_response(response, content_type, window)?)
}

/// Validate the request parameters and return the authorized target.
///
/// Order matters: missing/malformed input is a 400, a disallowed host a 403,
/// and an exhausted hop counter a 502, all before any upstream I/O.
fn authorize(ctx: &RelayContext, params: &HashMap<String, String>) -> Result<(Url, u32)> {
    let raw = params
        .get("url")
        .map(String::as_str)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Error::validation("missing url parameter"))?;

    let target =
        Url::parse(raw).map_err(|e| Error::validation(format!("invalid url '{raw}': {e}")))?;
    if !matches!(target.scheme(), "http" | "https") {
        return Err(Error::validation(format!(
            "unsupported scheme '{}'",
            target.scheme()
        )));
    }
    let host = target
        .host_str()
        .ok_or_else(|| Error::validation("url has no host"))?;
    if !ctx.allow_list.permits(host) {
        return Err(Error::forbidden(host));
    }

    let hop = params
        .get("hop")
        .and_then(|h| h.parse::<u32>().ok())
        .unwrap_or(0);
    if hop > ctx.config.upstream.max_redirect_hops {
        return Err(Error::too_many_redirects(hop));
    }

    Ok((target, hop))
}

/// Extract and resolve the Location of an upstream redirect, if any.
fn redirect_location(response: &reqwest::Response, target: &Url) -> Result<Option<Url>> {
    if !response.status().is_redirection() {
        return Ok(None);
    }
    let Some(location) = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
    else {
        return Err(Error::upstream_status(response.status().as_u16()));
    };
    let resolved = target.join(location).map_err(|e| {
        Error::upstream_connect(format!("invalid redirect location '{location}': {e}"))
    })?;
    Ok(Some(resolved))
}

fn ensure_success(response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::upstream_status(status.as_u16()))
    }
}

fn upstream_content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Read the next body chunk under the request deadline.
async fn next_chunk(
    response: &mut reqwest::Response,
    deadline: Instant,
    window: Duration,
) -> Result<Option<Bytes>> {
    match tokio::time::timeout_at(deadline, response.chunk()).await {
        Err(_) => Err(Error::upstream_timeout(window)),
        Ok(Err(e)) => Err(Error::upstream_connect(e)),
        Ok(Ok(chunk)) => Ok(chunk),
    }
}

/// Buffer the rest of a manifest body under the request deadline.
async fn read_remaining(
    mut response: reqwest::Response,
    first: Bytes,
    deadline: Instant,
    window: Duration,
) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(first.len());
    buf.extend_from_slice(&first);
    while let Some(chunk) = next_chunk(&mut response, deadline, window).await? {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Build a streaming body that relays upstream chunks as they arrive.
///
/// Each read is bounded by the idle timeout; a stalled upstream errors the
/// stream and drops the response, aborting the connection.
fn relay_body(first: Option<Bytes>, response: reqwest::Response, idle: Duration) -> Body {
    let tail = futures::stream::try_unfold(response, move |mut response| async move {
        match tokio::time::timeout(idle, response.chunk()).await {
            Err(_) => Err(Error::upstream_timeout(idle)),
            Ok(Err(e)) => Err(Error::upstream_connect(e)),
            Ok(Ok(Some(chunk))) => Ok(Some((chunk, response))),
            Ok(Ok(None)) => Ok(None),
        }
    });
    match first {
        Some(chunk) => {
            Body::from_stream(futures::stream::iter([Ok::<_, Error>(chunk)]).chain(tail))
        }
        None => Body::from_stream(tail),
    }
}

fn manifest_response(body: String) -> Result<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, HLS_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS")
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, "*")
        .body(Body::from(body))
        .map_err(|e| Error::internal(format!("failed to build response: {e}")))
}

fn passthrough_response(
    first: Option<Bytes>,
    response: reqwest::Response,
    content_type: Option<String>,
    idle: Duration,
) -> Result<Response> {
    let content_type = content_type.unwrap_or_else(|| BINARY_CONTENT_TYPE.to_string());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS")
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, "*")
        .body(relay_body(first, response, idle))
        .map_err(|e| Error::internal(format!("failed to build response: {e}")))
}

fn segment_response(
    response: reqwest::Response,
    content_type: String,
    idle: Duration,
) -> Result<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(relay_body(None, response, idle))
        .map_err(|e| Error::internal(format!("failed to build response: {e}")))
}

fn self_redirect(route: &str, location: &Url, hop: u32) -> Result<Response> {
    let target = format!(
        "{route}?url={}&hop={hop}",
        urlencoding::encode(location.as_str())
    );
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, target)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(Body::empty())
        .map_err(|e| Error::internal(format!("failed to build response: {e}")))
}
