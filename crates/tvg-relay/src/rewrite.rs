//! HLS manifest rewriting.
//!
//! Rewrites every URI embedded in a fetched playlist to point back through
//! the relay's `/stream` endpoint, so each dependent fetch (sub-playlist,
//! segment, encryption key) also flows through the relay. The algorithm is
//! line-based: directive lines keep their tag text and only quoted
//! `URI="..."` attributes are rewritten; every other non-blank line is a
//! media reference.

use url::Url;

/// Prefix of a relay-wrapped reference inside a rewritten manifest.
pub const STREAM_PREFIX: &str = "/stream?url=";

/// Whether a body chunk looks like an HLS manifest.
pub fn is_manifest(data: &[u8]) -> bool {
    contains(data, b"#EXTM3U") || contains(data, b"#EXT-X-")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Rewrite a manifest fetched from `manifest_url`.
///
/// Relative references are resolved against the manifest's own URL before
/// wrapping. Already-wrapped references pass through unchanged, so the
/// rewrite is idempotent.
pub fn rewrite_manifest(body: &str, manifest_url: &Url) -> String {
    let rewritten: Vec<String> = body
        .split('\n')
        .map(|raw| {
            let line = raw.trim();
            if line.is_empty() {
                String::new()
            } else if line.starts_with('#') {
                rewrite_directive(line, manifest_url)
            } else {
                wrap_reference(line, manifest_url)
            }
        })
        .collect();
    rewritten.join("\n")
}

/// Rewrite the quoted `URI="..."` attribute of a directive line, if any.
///
/// The attribute value is the only part touched; `#EXT-X-KEY:METHOD=...` and
/// the rest of the tag text stay as-is.
fn rewrite_directive(line: &str, manifest_url: &Url) -> String {
    let Some(attr_start) = line.find("URI=\"") else {
        return line.to_string();
    };
    let value_start = attr_start + "URI=\"".len();
    let Some(value_len) = line[value_start..].find('"') else {
        return line.to_string();
    };
    let value = &line[value_start..value_start + value_len];
    let wrapped = wrap_reference(value, manifest_url);
    format!(
        "{}{}{}",
        &line[..value_start],
        wrapped,
        &line[value_start + value_len..]
    )
}

/// Wrap a single manifest reference as a relay `/stream` URL.
fn wrap_reference(reference: &str, manifest_url: &Url) -> String {
    if reference.starts_with(STREAM_PREFIX) {
        return reference.to_string();
    }
    match resolve(reference, manifest_url) {
        Some(absolute) => format!("{STREAM_PREFIX}{}", urlencoding::encode(&absolute)),
        None => reference.to_string(),
    }
}

/// Resolve a reference against the manifest URL, RFC 3986 style.
fn resolve(reference: &str, manifest_url: &Url) -> Option<String> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Some(reference.to_string());
    }
    manifest_url.join(reference).ok().map(|u| u.to_string())
}
