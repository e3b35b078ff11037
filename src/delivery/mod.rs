//! Response delivery subsystem.
//!
//! # Data Flow
//! ```text
//! Controller / dispatcher decides what to send
//!     → respond_content (in-memory body, charset, compression)
//!     → respond_file (ETag conditional GET, mime, compression, disposition)
//!     → respond_redirect (301/302)
//!     → one Outcome lands in the request's ResponseSlot
//! ```
//!
//! # Design Decisions
//! - Every path checks the ResponseSlot first and is a no-op after the first
//!   response (exactly-once is enforced here, not trusted to callers)
//! - A failed compression encode aborts the connection instead of emitting a
//!   malformed body
//! - ETags come from file metadata (length + mtime + configured version), so
//!   file delivery stays single-pass

pub mod content_type;
pub mod encoding;
pub mod static_files;

use std::path::Path;
use std::time::UNIX_EPOCH;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{
    HeaderValue, CONTENT_DISPOSITION, CONTENT_ENCODING, CONTENT_TYPE, ETAG, IF_NONE_MATCH,
    LOCATION,
};
use hyper::{HeaderMap, Response, StatusCode};

use crate::config::EngineConfig;
use crate::dispatch::context::{Outcome, ResponseSlot};

/// Deliver in-memory content. Appends a UTF-8 charset qualifier, negotiates
/// compression when `compress` is set, and writes status, headers, and body
/// in one shot.
pub fn respond_content(
    slot: &ResponseSlot,
    request_headers: &HeaderMap,
    status: StatusCode,
    body: String,
    content_type: &str,
    compress: bool,
    extra: Option<HeaderMap>,
) {
    if slot.is_sent() {
        return;
    }

    let content_type = format!("{content_type}; charset=utf-8");
    let mut bytes = Bytes::from(body);
    let mut chosen = None;

    if compress {
        if let Some(enc) = encoding::negotiate(request_headers) {
            match encoding::compress(&bytes, enc) {
                Ok(compressed) => {
                    bytes = Bytes::from(compressed);
                    chosen = Some(enc);
                }
                Err(err) => {
                    tracing::error!(error = %err, "Compression failed, destroying connection");
                    slot.send(Outcome::Abort);
                    return;
                }
            }
        }
    }

    let mut builder = Response::builder().status(status);
    if let Some(headers) = builder.headers_mut() {
        if let Some(extra) = extra {
            headers.extend(extra);
        }
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        if let Some(enc) = chosen {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(enc.name()));
        }
    }

    match builder.body(Full::new(bytes)) {
        Ok(response) => {
            slot.send(Outcome::Respond(response));
        }
        Err(err) => {
            tracing::error!(error = %err, "Response build failed, destroying connection");
            slot.send(Outcome::Abort);
        }
    }
}

/// Deliver a file from disk with conditional-GET and compression support.
pub async fn respond_file(
    slot: &ResponseSlot,
    request_headers: &HeaderMap,
    path: &Path,
    download_name: Option<&str>,
    config: &EngineConfig,
) {
    if slot.is_sent() {
        return;
    }

    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) if m.is_file() => m,
        _ => {
            respond_content(
                slot,
                request_headers,
                StatusCode::NOT_FOUND,
                "File not found (404).".to_string(),
                "text/plain",
                true,
                None,
            );
            return;
        }
    };

    let etag = file_etag(&metadata, &config.etag_version);

    if !config.debug && etag_matches(request_headers, &etag) {
        let response = Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .body(Full::new(Bytes::new()))
            .expect("static 304 response");
        slot.send(Outcome::Respond(response));
        return;
    }

    let contents = match tokio::fs::read(path).await {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "File read failed");
            respond_content(
                slot,
                request_headers,
                StatusCode::NOT_FOUND,
                "File not found (404).".to_string(),
                "text/plain",
                true,
                None,
            );
            return;
        }
    };

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let mime = content_type::from_extension(ext);

    let mut bytes = Bytes::from(contents);
    let mut chosen = None;
    if content_type::is_compressible(ext) {
        if let Some(enc) = encoding::negotiate(request_headers) {
            match encoding::compress(&bytes, enc) {
                Ok(compressed) => {
                    bytes = Bytes::from(compressed);
                    chosen = Some(enc);
                }
                Err(err) => {
                    tracing::error!(error = %err, "Compression failed, destroying connection");
                    slot.send(Outcome::Abort);
                    return;
                }
            }
        }
    }

    let mut builder = Response::builder().status(StatusCode::OK);
    if let Some(headers) = builder.headers_mut() {
        if let Ok(value) = HeaderValue::from_str(&etag) {
            headers.insert(ETAG, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(mime));
        if let Some(enc) = chosen {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(enc.name()));
        }
        if let Some(name) = download_name {
            if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename={name}")) {
                headers.insert(CONTENT_DISPOSITION, value);
            }
        }
    }

    match builder.body(Full::new(bytes)) {
        Ok(response) => {
            slot.send(Outcome::Respond(response));
        }
        Err(err) => {
            tracing::error!(error = %err, "Response build failed, destroying connection");
            slot.send(Outcome::Abort);
        }
    }
}

/// 301 (permanent) or 302 redirect.
pub fn respond_redirect(slot: &ResponseSlot, url: &str, permanent: bool) {
    if slot.is_sent() {
        return;
    }
    let status = if permanent {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::FOUND
    };
    let location = match HeaderValue::from_str(url) {
        Ok(v) => v,
        Err(err) => {
            tracing::error!(url, error = %err, "Invalid redirect target");
            slot.send(Outcome::Abort);
            return;
        }
    };
    let response = Response::builder()
        .status(status)
        .header(LOCATION, location)
        .body(Full::new(Bytes::new()))
        .expect("redirect response");
    slot.send(Outcome::Respond(response));
}

/// Content fingerprint from file metadata plus the configured version tag.
fn file_etag(metadata: &std::fs::Metadata, version: &str) -> String {
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{:x}-{:x}{}", metadata.len(), mtime, version)
}

fn etag_matches(request_headers: &HeaderMap, etag: &str) -> bool {
    request_headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == etag)
        .unwrap_or(false)
}
