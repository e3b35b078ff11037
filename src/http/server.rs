//! HTTP server: accept loop and per-request pipeline.
//!
//! # Responsibilities
//! - Serve HTTP/1.1 connections from the bounded listener, one task each
//! - Fast-path static asset requests before any routing work
//! - Gate and stage multipart bodies, parse plain bodies under the route's
//!   size ceiling
//! - Hand the request to the dispatcher and write its single outcome
//! - Run the periodic cache recycle tick off the request path
//!
//! # Design Decisions
//! - Refused uploads (no gate route, oversized or broken body) end with the
//!   connection dropped before a status line is written; the service returns
//!   an error and hyper closes the socket
//! - Malformed urlencoded or JSON bodies are reported and dispatch proceeds
//!   with an empty parsed body
//! - Upload staging files are removed after the response on every path

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::sync::broadcast;

use crate::delivery::static_files;
use crate::dispatch::context::{Outcome, ResponseSlot};
use crate::dispatch::dispatcher::Dispatcher;
use crate::engine::Engine;
use crate::error::UploadError;
use crate::http::request;
use crate::net::Listener;
use crate::routing::Flag;
use crate::upload::{self, BodyWriter, UploadStaging};

const RECYCLE_PERIOD: Duration = Duration::from_secs(60);

/// Returned from the request service to make hyper drop the connection
/// without writing any bytes.
#[derive(Debug)]
pub struct ConnectionAbort;

impl std::fmt::Display for ConnectionAbort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("connection aborted")
    }
}

impl std::error::Error for ConnectionAbort {}

/// HTTP server for the dispatch engine.
pub struct HttpServer {
    engine: Arc<Engine>,
}

impl HttpServer {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Accept connections until the shutdown signal arrives.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()> {
        if let Err(err) = self.engine.clear_tmp().await {
            tracing::warn!(error = %err, "Tmp directory not cleared");
        }

        let recycle_task = self.engine.hooks().recycle.clone().map(|hook| {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(RECYCLE_PERIOD);
                interval.tick().await;
                let mut ticks: u64 = 0;
                loop {
                    interval.tick().await;
                    ticks += 1;
                    hook(ticks);
                }
            })
        });

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "HTTP server started");
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => {
                    let (stream, _addr, permit) = match accepted {
                        Ok(conn) => conn,
                        Err(err) => {
                            tracing::warn!(error = %err, "Accept failed");
                            continue;
                        }
                    };
                    let engine = Arc::clone(&self.engine);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| handle(Arc::clone(&engine), req));
                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                            tracing::debug!(error = %err, "Connection closed with error");
                        }
                        drop(permit);
                    });
                }
            }
        }

        if let Some(task) = recycle_task {
            task.abort();
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Drive one request through static serving, body intake, and dispatch.
async fn handle(
    engine: Arc<Engine>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, ConnectionAbort> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();

    // Extension-bearing paths never reach the route table.
    if static_files::is_static_path(&path) {
        let slot = ResponseSlot::new();
        static_files::serve(&engine, &parts.headers, &path, &slot).await;
        return match slot.take() {
            Some(Outcome::Respond(response)) => Ok(response),
            _ => Err(ConnectionAbort),
        };
    }

    let boundary = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(upload::boundary_from);

    let mut ctx = request::build_context(&parts, engine.config(), boundary.is_some());

    if let Some(prefix) = engine.hooks().prefix.clone() {
        if let Some(tag) = prefix(&ctx) {
            let tag = if tag.starts_with('#') {
                tag
            } else {
                format!("#{tag}")
            };
            ctx.flags.insert(Flag::Group(tag));
        }
    }

    let mut staging = UploadStaging::default();

    let has_body = matches!(
        ctx.method,
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    );
    if has_body {
        match &boundary {
            Some(boundary) => {
                // Upload gate: no upload-flagged route for the path means the
                // body is never read.
                let limit = match engine.table().find_upload(&ctx.segments) {
                    Some(route) => route.max_body_size,
                    None => {
                        tracing::warn!(path = %path, "Multipart request with no upload route");
                        return Err(ConnectionAbort);
                    }
                };

                let tmp = engine.config().directories.tmp.clone();
                if let Err(err) = tokio::fs::create_dir_all(&tmp).await {
                    engine.report_error(&err.to_string(), "upload staging", &path);
                    return Err(ConnectionAbort);
                }

                let staged = match receive_upload(body, &tmp, limit, &mut staging).await {
                    Ok(staged) => staged,
                    Err(err) => {
                        staging.cleanup().await;
                        match err {
                            UploadError::BodyTooLarge { limit } => {
                                tracing::warn!(path = %path, limit, "Upload body over limit");
                            }
                            other => engine.report_error(&other.to_string(), "upload intake", &path),
                        }
                        return Err(ConnectionAbort);
                    }
                };

                match upload::parse_staged(&staged, boundary, &tmp, &mut staging).await {
                    Ok((fields, files)) => {
                        ctx.form = fields;
                        ctx.files = files;
                    }
                    Err(err) => {
                        engine.report_error(&err.to_string(), "upload parse", &path);
                        staging.cleanup().await;
                        return Err(ConnectionAbort);
                    }
                }
            }
            None => {
                let (limit, wants_json) = match engine.table().peek(&ctx.segments, &ctx.flags) {
                    Some(route) => (route.max_body_size, route.flags.contains(&Flag::Json)),
                    None => (engine.config().limits.default_max_body, false),
                };

                match read_bounded(body, limit).await {
                    Ok(data) if data.is_empty() => {}
                    Ok(data) => {
                        if wants_json {
                            match serde_json::from_slice(&data) {
                                Ok(value) => ctx.json = Some(value),
                                Err(err) => {
                                    engine.report_error(&err.to_string(), "body parse", &path);
                                }
                            }
                        } else {
                            ctx.form = request::parse_form(&data);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(path = %path, error = %err, "Body intake failed");
                        return Err(ConnectionAbort);
                    }
                }
            }
        }
    }

    let slot = Arc::new(ResponseSlot::new());
    Dispatcher::new(Arc::clone(&engine), Arc::clone(&slot))
        .run(ctx)
        .await;
    staging.cleanup().await;

    match slot.take() {
        Some(Outcome::Respond(response)) => Ok(response),
        Some(Outcome::Abort) => Err(ConnectionAbort),
        // Handler finished without responding; a terse 404 beats hanging the
        // client.
        None => Ok(plain_response(StatusCode::NOT_FOUND)),
    }
}

/// Stream a multipart body into one staging file under the gate's ceiling.
async fn receive_upload(
    mut body: Incoming,
    tmp: &Path,
    limit: u64,
    staging: &mut UploadStaging,
) -> Result<PathBuf, UploadError> {
    let mut writer = BodyWriter::create(tmp, limit).await?;
    staging.track(writer.path().to_path_buf());
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| UploadError::Transfer(e.to_string()))?;
        if let Ok(chunk) = frame.into_data() {
            writer.write_chunk(&chunk).await?;
        }
    }
    writer.finish().await
}

/// Collect a plain body into memory, refusing anything over the limit.
async fn read_bounded(mut body: Incoming, limit: u64) -> Result<Vec<u8>, UploadError> {
    let mut data = Vec::new();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| UploadError::Transfer(e.to_string()))?;
        if let Ok(chunk) = frame.into_data() {
            if (data.len() + chunk.len()) as u64 > limit {
                return Err(UploadError::BodyTooLarge { limit });
            }
            data.extend_from_slice(&chunk);
        }
    }
    Ok(data)
}

fn plain_response(status: StatusCode) -> Response<Full<Bytes>> {
    let body = format!(
        "{} ({}).",
        status.canonical_reason().unwrap_or("Error"),
        status.as_u16()
    );
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_response_shape() {
        let response = plain_response(StatusCode::NOT_FOUND);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
