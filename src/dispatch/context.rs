//! Per-request state and the controller-facing exchange.
//!
//! # Responsibilities
//! - Hold everything derived from the inbound request (segments, flags,
//!   query/form/file accessors)
//! - Enforce the exactly-once response invariant via ResponseSlot
//! - Expose the respond/redirect operations controllers call
//!
//! # Design Decisions
//! - The context is owned by one request task; it is frozen into an Arc once
//!   body intake and authorization finish mutating it
//! - ResponseSlot uses a compare-and-swap so racing writers resolve to one
//!   winner and the rest become no-ops

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{HeaderMap, Method, Response, StatusCode, Uri};

use crate::delivery;
use crate::engine::Engine;
use crate::routing::FlagSet;
use crate::upload::UploadedFile;

/// Everything the engine derives from one inbound request. Created at accept,
/// mutated through body intake and authorization, then frozen for dispatch.
#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    /// Path split the same way route patterns are split.
    pub segments: Vec<String>,
    /// Derived tag set: method, protocol, ajax, upload, auth state, groups.
    pub flags: FlagSet,
    pub headers: HeaderMap,
    pub query: HashMap<String, String>,
    pub form: HashMap<String, String>,
    /// Parsed body for routes carrying the `json` flag.
    pub json: Option<serde_json::Value>,
    pub files: Vec<UploadedFile>,
    pub is_ajax: bool,
}

impl RequestContext {
    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

/// Terminal result of a request.
pub enum Outcome {
    /// Write this response to the client.
    Respond(Response<Full<Bytes>>),
    /// Destroy the connection without writing any bytes.
    Abort,
}

/// Exactly-once response guard.
///
/// The first successful [`ResponseSlot::send`] wins; every later attempt is a
/// silent no-op. Downstream code checks [`ResponseSlot::is_sent`] before
/// doing expensive work, but correctness only relies on the swap.
#[derive(Default)]
pub struct ResponseSlot {
    sent: AtomicBool,
    cell: Mutex<Option<Outcome>>,
}

impl ResponseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic: once true, stays true.
    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::Acquire)
    }

    /// Store the outcome if nothing was sent yet. Returns false when a
    /// response already won the race.
    pub fn send(&self, outcome: Outcome) -> bool {
        if self
            .sent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        *self.cell.lock().expect("response slot poisoned") = Some(outcome);
        true
    }

    /// Take the stored outcome for writing. Called once by the server.
    pub fn take(&self) -> Option<Outcome> {
        self.cell.lock().expect("response slot poisoned").take()
    }
}

/// The request/response context a controller handler receives.
#[derive(Clone)]
pub struct Exchange {
    engine: Arc<Engine>,
    ctx: Arc<RequestContext>,
    /// Placeholder values extracted from the path, in pattern order.
    params: Vec<String>,
    slot: Arc<ResponseSlot>,
}

impl Exchange {
    pub(crate) fn new(
        engine: Arc<Engine>,
        ctx: Arc<RequestContext>,
        params: Vec<String>,
        slot: Arc<ResponseSlot>,
    ) -> Self {
        Self {
            engine,
            ctx,
            params,
            slot,
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Placeholder parameter by position; empty string when out of range.
    pub fn param(&self, index: usize) -> &str {
        self.params.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.ctx.query.get(name).map(String::as_str)
    }

    pub fn form(&self, name: &str) -> Option<&str> {
        self.ctx.form.get(name).map(String::as_str)
    }

    pub fn json(&self) -> Option<&serde_json::Value> {
        self.ctx.json.as_ref()
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.ctx.files
    }

    pub fn is_ajax(&self) -> bool {
        self.ctx.is_ajax
    }

    /// True once a response has been sent; further respond calls no-op.
    pub fn is_sent(&self) -> bool {
        self.slot.is_sent()
    }

    /// Respond 200 with in-memory content, compressed when the client
    /// negotiates it.
    pub fn respond_content(&self, body: impl Into<String>, content_type: &str) {
        delivery::respond_content(
            &self.slot,
            &self.ctx.headers,
            StatusCode::OK,
            body.into(),
            content_type,
            true,
            None,
        );
    }

    /// Respond with an explicit status code.
    pub fn respond_status(&self, status: StatusCode, body: impl Into<String>, content_type: &str) {
        delivery::respond_content(
            &self.slot,
            &self.ctx.headers,
            status,
            body.into(),
            content_type,
            true,
            None,
        );
    }

    /// Serialize a value and respond as JSON.
    pub fn respond_json<T: serde::Serialize>(&self, value: &T) {
        match serde_json::to_string(value) {
            Ok(body) => self.respond_content(body, "application/json"),
            Err(err) => {
                self.engine
                    .report_error(&err.to_string(), "respond_json", self.ctx.path());
                self.respond_status(StatusCode::INTERNAL_SERVER_ERROR, "500", "text/plain");
            }
        }
    }

    /// Respond with a file from the public directory. An explicit download
    /// name forces a save-as disposition.
    pub async fn respond_file(&self, name: &str, download_name: Option<&str>) {
        let path = match delivery::static_files::resolve_public(
            &self.engine.config().directories.public,
            name,
        ) {
            Some(p) => p,
            None => {
                self.respond_status(StatusCode::NOT_FOUND, "404", "text/plain");
                return;
            }
        };
        delivery::respond_file(
            &self.slot,
            &self.ctx.headers,
            &path,
            download_name,
            self.engine.config(),
        )
        .await;
    }

    /// Redirect with 302, or 301 when permanent.
    pub fn redirect(&self, url: &str, permanent: bool) {
        delivery::respond_redirect(&self.slot, url, permanent);
    }

    pub(crate) fn slot(&self) -> &Arc<ResponseSlot> {
        &self.slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> Response<Full<Bytes>> {
        Response::new(Full::new(Bytes::from(body.to_string())))
    }

    #[test]
    fn test_slot_exactly_once() {
        let slot = ResponseSlot::new();
        assert!(!slot.is_sent());
        assert!(slot.send(Outcome::Respond(response("first"))));
        assert!(slot.is_sent());
        assert!(!slot.send(Outcome::Respond(response("second"))));

        // The stored outcome is the first write.
        match slot.take() {
            Some(Outcome::Respond(_)) => {}
            _ => panic!("expected stored response"),
        }
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_slot_abort_is_also_guarded() {
        let slot = ResponseSlot::new();
        assert!(slot.send(Outcome::Abort));
        assert!(!slot.send(Outcome::Respond(response("late"))));
        assert!(matches!(slot.take(), Some(Outcome::Abort)));
    }
}
