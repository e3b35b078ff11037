//! Inbound request interpretation.
//!
//! # Responsibilities
//! - Split the path into segments the matcher understands
//! - Derive the request flag set (method, transport, ajax, upload, debug,
//!   method override)
//! - Parse the query string and urlencoded form bodies
//!
//! # Design Decisions
//! - Flags are derived once, before body intake; only the authorization
//!   hook adds to the set later
//! - `X-HTTP-Method-Override` adds a flag rather than rewriting the method,
//!   so the real method stays visible to handlers

use std::collections::HashMap;

use hyper::http::request::Parts;

use crate::config::EngineConfig;
use crate::dispatch::context::RequestContext;
use crate::routing::{split_path, Flag, FlagSet};

pub const AJAX_HEADER: &str = "x-requested-with";
pub const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";

/// Build the request context from the head of an inbound request.
///
/// `has_multipart` marks a `multipart/form-data` body; the upload pipeline
/// fills in form fields and files afterward.
pub fn build_context(parts: &Parts, config: &EngineConfig, has_multipart: bool) -> RequestContext {
    let segments = split_path(parts.uri.path());

    let is_ajax = parts
        .headers
        .get(AJAX_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
        .unwrap_or(false);

    let mut flags = FlagSet::new();
    if let Some(flag) = Flag::from_method(&parts.method) {
        flags.insert(flag);
    }
    flags.insert(if config.listener.secure {
        Flag::Https
    } else {
        Flag::Http
    });
    if is_ajax {
        flags.insert(Flag::Ajax);
    }
    if has_multipart {
        flags.insert(Flag::Upload);
    }
    if config.debug {
        flags.insert(Flag::Debug);
    }
    if let Some(value) = parts
        .headers
        .get(METHOD_OVERRIDE_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        flags.insert(Flag::parse(value.trim()));
    }

    let query = parts
        .uri
        .query()
        .map(|q| parse_form(q.as_bytes()))
        .unwrap_or_default();

    RequestContext {
        method: parts.method.clone(),
        uri: parts.uri.clone(),
        segments,
        flags,
        headers: parts.headers.clone(),
        query,
        form: HashMap::new(),
        json: None,
        files: Vec::new(),
        is_ajax,
    }
}

/// Decode an urlencoded key-value body (also used for query strings).
pub fn parse_form(raw: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(raw)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
