//! Per-request dispatch state machine.
//!
//! # Responsibilities
//! - Run the optional authorization hook and tag the request's auth state
//! - Scan the sorted route table for the first full match
//! - Invoke the matched handler and contain any fault it returns
//! - Drive the fallback chain: `#403`/`#404` on lookup failure, `#500` on
//!   handler fault, plain-text terminal response after one failed fallback
//!
//! # Design Decisions
//! - A flag conflict marks the request authorization-failed but the scan
//!   continues; a later route may still match plainly
//! - Exactly one fallback redirection per request, never a loop
//! - Faults are reported through the error hook and never escape this module

use std::sync::Arc;

use hyper::StatusCode;

use crate::dispatch::context::{Exchange, RequestContext, ResponseSlot};
use crate::engine::Engine;
use crate::routing::matcher::{extract_params, flags_match, segments_match, FlagMatch};
use crate::routing::table::{FALLBACK_FAULT, FALLBACK_FORBIDDEN, FALLBACK_NOT_FOUND};
use crate::routing::{Flag, FlagSet, Route};

/// Drives one request from lookup to the exactly-once response.
pub struct Dispatcher {
    engine: Arc<Engine>,
    slot: Arc<ResponseSlot>,
    /// Cleared when any route scan hits a flag conflict.
    authorized: bool,
    /// Set when the first fallback redirection is taken.
    fallback_taken: bool,
}

impl Dispatcher {
    pub fn new(engine: Arc<Engine>, slot: Arc<ResponseSlot>) -> Self {
        Self {
            engine,
            slot,
            authorized: true,
            fallback_taken: false,
        }
    }

    /// Run the state machine to completion. On return the slot holds a
    /// response unless the handler chose to leave the request unanswered.
    pub async fn run(mut self, mut ctx: RequestContext) {
        if let Some(authorize) = self.engine.hooks().authorize.clone() {
            let logged = authorize(&ctx).await;
            ctx.flags
                .insert(if logged { Flag::Logged } else { Flag::Unlogged });
        }

        let ctx = Arc::new(ctx);
        let mut segments = ctx.segments.clone();
        let mut flags = ctx.flags.clone();
        // Status for the plain-text terminal response when the fallback chain
        // itself comes up empty.
        let mut terminal = StatusCode::NOT_FOUND;

        loop {
            let matched = self.lookup(&segments, &flags, &ctx);

            let (route, params) = match matched {
                Some(found) => found,
                None => {
                    if self.fallback_taken {
                        self.plain(terminal, &ctx.headers);
                        return;
                    }
                    self.fallback_taken = true;
                    let name = if self.authorized {
                        FALLBACK_NOT_FOUND
                    } else {
                        FALLBACK_FORBIDDEN
                    };
                    tracing::debug!(
                        path = %ctx.path(),
                        fallback = name,
                        "No route matched, trying fallback"
                    );
                    segments = vec![name.to_string()];
                    flags = FlagSet::new();
                    continue;
                }
            };

            tracing::debug!(
                path = %ctx.path(),
                route = %route.pattern_display(),
                controller = %route.controller,
                "Route matched"
            );

            let exchange = Exchange::new(
                Arc::clone(&self.engine),
                Arc::clone(&ctx),
                params,
                Arc::clone(&self.slot),
            );

            match (route.handler)(exchange).await {
                Ok(()) => return,
                Err(err) => {
                    self.engine.report_error(
                        &err.to_string(),
                        &format!("{} -> {}", route.controller, route.pattern_display()),
                        ctx.path(),
                    );
                    if self.fallback_taken {
                        self.plain(StatusCode::INTERNAL_SERVER_ERROR, &ctx.headers);
                        return;
                    }
                    self.fallback_taken = true;
                    terminal = StatusCode::INTERNAL_SERVER_ERROR;
                    segments = vec![FALLBACK_FAULT.to_string()];
                    flags = FlagSet::new();
                }
            }
        }
    }

    /// First route in specificity order passing segment, flag, and validator
    /// checks. Conflicts clear the authorized bit but do not stop the scan.
    fn lookup(
        &mut self,
        segments: &[String],
        flags: &FlagSet,
        ctx: &RequestContext,
    ) -> Option<(Route, Vec<String>)> {
        for route in self.engine.table().routes() {
            if !segments_match(segments, &route.pattern) {
                continue;
            }
            if !route.flags.is_empty() {
                match flags_match(flags, &route.flags) {
                    FlagMatch::Conflict => {
                        self.authorized = false;
                        continue;
                    }
                    FlagMatch::Insufficient => continue,
                    FlagMatch::Ok => {}
                }
            }
            if let Some(validator) = &route.validator {
                if !validator(ctx) {
                    continue;
                }
            }
            let params = extract_params(segments, route);
            return Some((route.clone(), params));
        }
        None
    }

    /// Terse plain-text terminal response, e.g. body `404` for status 404.
    /// Compressed like any other content when the client negotiates it.
    fn plain(&self, status: StatusCode, request_headers: &hyper::HeaderMap) {
        crate::delivery::respond_content(
            &self.slot,
            request_headers,
            status,
            status.as_u16().to_string(),
            "text/plain",
            true,
            None,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::dispatch::{handler, Outcome};
    use crate::engine::EngineBuilder;
    use crate::routing::split_path;
    use http_body_util::BodyExt;
    use hyper::{HeaderMap, Method, Uri};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx_for(path: &str, flags: &[&str]) -> RequestContext {
        RequestContext {
            method: Method::GET,
            uri: path.parse::<Uri>().unwrap(),
            segments: split_path(path),
            flags: flags.iter().copied().collect(),
            headers: HeaderMap::new(),
            query: HashMap::new(),
            form: HashMap::new(),
            json: None,
            files: Vec::new(),
            is_ajax: false,
        }
    }

    async fn response_body(slot: &ResponseSlot) -> (StatusCode, String) {
        match slot.take() {
            Some(Outcome::Respond(resp)) => {
                let status = resp.status();
                let body = resp.into_body().collect().await.unwrap().to_bytes();
                (status, String::from_utf8_lossy(&body).into_owned())
            }
            Some(Outcome::Abort) => panic!("unexpected abort"),
            None => panic!("no response produced"),
        }
    }

    #[tokio::test]
    async fn test_primary_lookup_invokes_handler() {
        let engine = EngineBuilder::new(EngineConfig::default())
            .controller("home", |r| {
                r.route("/user/{id}").to(handler(|x| async move {
                    let body = format!("user:{}", x.param(0));
                    x.respond_content(body, "text/plain");
                    Ok(())
                }));
            })
            .build()
            .unwrap();

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(Arc::clone(&engine), Arc::clone(&slot))
            .run(ctx_for("/user/42", &["get", "http"]))
            .await;

        let (status, body) = response_body(&slot).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "user:42");
    }

    #[tokio::test]
    async fn test_specificity_ajax_route_preferred() {
        let engine = EngineBuilder::new(EngineConfig::default())
            .controller("home", |r| {
                r.route("/").to(handler(|x| async move {
                    x.respond_content("plain", "text/plain");
                    Ok(())
                }));
                r.route("/").flags(&["ajax"]).to(handler(|x| async move {
                    x.respond_content("ajax", "text/plain");
                    Ok(())
                }));
            })
            .build()
            .unwrap();

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(Arc::clone(&engine), Arc::clone(&slot))
            .run(ctx_for("/", &["get", "ajax"]))
            .await;
        assert_eq!(response_body(&slot).await.1, "ajax");

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(engine, Arc::clone(&slot))
            .run(ctx_for("/", &["get"]))
            .await;
        assert_eq!(response_body(&slot).await.1, "plain");
    }

    #[tokio::test]
    async fn test_json_marked_route_reachable_without_request_flag() {
        // `json` only steers body parsing; a request never carries it, so the
        // route must still win the lookup on its other flags.
        let engine = EngineBuilder::new(EngineConfig::default())
            .controller("api", |r| {
                r.route("/notes").flags(&["post", "json"]).to(handler(|x| async move {
                    x.respond_content("notes", "text/plain");
                    Ok(())
                }));
            })
            .build()
            .unwrap();

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(engine, Arc::clone(&slot))
            .run(ctx_for("/notes", &["post", "http"]))
            .await;

        let (status, body) = response_body(&slot).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "notes");
    }

    #[tokio::test]
    async fn test_terminal_response_negotiates_compression() {
        let engine = EngineBuilder::new(EngineConfig::default()).build().unwrap();

        let mut ctx = ctx_for("/missing", &["get"]);
        ctx.headers.insert(
            hyper::header::ACCEPT_ENCODING,
            hyper::header::HeaderValue::from_static("deflate"),
        );

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(engine, Arc::clone(&slot)).run(ctx).await;

        match slot.take() {
            Some(Outcome::Respond(resp)) => {
                assert_eq!(resp.status(), StatusCode::NOT_FOUND);
                assert_eq!(
                    resp.headers().get(hyper::header::CONTENT_ENCODING).unwrap(),
                    "deflate"
                );
            }
            _ => panic!("expected terminal response"),
        }
    }

    #[tokio::test]
    async fn test_not_found_uses_themed_fallback() {
        let engine = EngineBuilder::new(EngineConfig::default())
            .controller("errors", |r| {
                r.route("#404").to(handler(|x| async move {
                    x.respond_status(StatusCode::NOT_FOUND, "themed 404", "text/html");
                    Ok(())
                }));
            })
            .build()
            .unwrap();

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(engine, Arc::clone(&slot))
            .run(ctx_for("/missing", &["get"]))
            .await;

        let (status, body) = response_body(&slot).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "themed 404");
    }

    #[tokio::test]
    async fn test_fallback_single_retry_ends_plain() {
        // No routes at all: primary lookup fails, #404 lookup fails, and the
        // terminal response is plain-text 404 with no further attempts.
        let engine = EngineBuilder::new(EngineConfig::default()).build().unwrap();

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(engine, Arc::clone(&slot))
            .run(ctx_for("/missing", &["get"]))
            .await;

        let (status, body) = response_body(&slot).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "404");
    }

    #[tokio::test]
    async fn test_conflict_routes_to_forbidden_fallback() {
        let engine = EngineBuilder::new(EngineConfig::default())
            .controller("members", |r| {
                r.route("/account").flags(&["logged"]).to(handler(|x| async move {
                    x.respond_content("account", "text/plain");
                    Ok(())
                }));
                r.route("#403").to(handler(|x| async move {
                    x.respond_status(StatusCode::FORBIDDEN, "denied", "text/plain");
                    Ok(())
                }));
            })
            .build()
            .unwrap();

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(engine, Arc::clone(&slot))
            .run(ctx_for("/account", &["get", "unlogged"]))
            .await;

        let (status, body) = response_body(&slot).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "denied");
    }

    #[tokio::test]
    async fn test_insufficient_flags_route_to_not_found() {
        // Same route, but the request carries no auth flag at all: that is
        // insufficiency, not conflict, so the 404 chain is used.
        let engine = EngineBuilder::new(EngineConfig::default())
            .controller("members", |r| {
                r.route("/account").flags(&["logged"]).to(handler(|x| async move {
                    x.respond_content("account", "text/plain");
                    Ok(())
                }));
            })
            .build()
            .unwrap();

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(engine, Arc::clone(&slot))
            .run(ctx_for("/account", &["get"]))
            .await;

        let (status, body) = response_body(&slot).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "404");
    }

    #[tokio::test]
    async fn test_handler_fault_redirects_to_500_and_reports() {
        let reports = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&reports);
        let engine = EngineBuilder::new(EngineConfig::default())
            .controller("broken", |r| {
                r.route("/boom").to(handler(|_| async move {
                    Err("kaput".into())
                }));
                r.route("#500").to(handler(|x| async move {
                    x.respond_status(StatusCode::INTERNAL_SERVER_ERROR, "themed 500", "text/html");
                    Ok(())
                }));
            })
            .on_error(move |_err, _name, _uri| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(engine, Arc::clone(&slot))
            .run(ctx_for("/boom", &["get"]))
            .await;

        let (status, body) = response_body(&slot).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "themed 500");
        assert_eq!(reports.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fault_without_500_route_is_plain_500() {
        let engine = EngineBuilder::new(EngineConfig::default())
            .controller("broken", |r| {
                r.route("/boom").to(handler(|_| async move { Err("kaput".into()) }));
            })
            .build()
            .unwrap();

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(engine, Arc::clone(&slot))
            .run(ctx_for("/boom", &["get"]))
            .await;

        let (status, body) = response_body(&slot).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "500");
    }

    #[tokio::test]
    async fn test_exactly_once_second_write_ignored() {
        let engine = EngineBuilder::new(EngineConfig::default())
            .controller("eager", |r| {
                r.route("/twice").to(handler(|x| async move {
                    x.respond_content("first", "text/plain");
                    x.respond_content("second", "text/plain");
                    Ok(())
                }));
            })
            .build()
            .unwrap();

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(engine, Arc::clone(&slot))
            .run(ctx_for("/twice", &["get"]))
            .await;

        assert_eq!(response_body(&slot).await.1, "first");
    }

    #[tokio::test]
    async fn test_authorize_hook_tags_request() {
        let engine = EngineBuilder::new(EngineConfig::default())
            .controller("members", |r| {
                r.route("/account").flags(&["logged"]).to(handler(|x| async move {
                    x.respond_content("account", "text/plain");
                    Ok(())
                }));
            })
            .authorize(|_ctx| async { true })
            .build()
            .unwrap();

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(engine, Arc::clone(&slot))
            .run(ctx_for("/account", &["get"]))
            .await;

        assert_eq!(response_body(&slot).await.1, "account");
    }

    #[tokio::test]
    async fn test_validator_rejects_before_invocation() {
        let engine = EngineBuilder::new(EngineConfig::default())
            .controller("guarded", |r| {
                r.route("/only-query")
                    .validate(|ctx| ctx.query.contains_key("token"))
                    .to(handler(|x| async move {
                        x.respond_content("allowed", "text/plain");
                        Ok(())
                    }));
            })
            .build()
            .unwrap();

        let slot = Arc::new(ResponseSlot::new());
        Dispatcher::new(engine, Arc::clone(&slot))
            .run(ctx_for("/only-query", &["get"]))
            .await;

        // Validator refused; with no fallback registered this ends plain 404.
        assert_eq!(response_body(&slot).await.0, StatusCode::NOT_FOUND);
    }
}
