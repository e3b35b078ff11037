//! Fault taxonomy for the dispatch engine.
//!
//! Every fault is contained at the dispatcher boundary: a request either gets
//! a normal response, a themed fallback response, a terse plain-text status
//! response, or (malformed/oversized uploads only) a silently closed
//! connection. Nothing in here is allowed to crash the accept loop.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the engine core.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No route matched the request path and flags.
    #[error("no route matched {0}")]
    NotFound(String),

    /// A route existed for the path but flag matching produced a conflict.
    #[error("authorization conflict for {0}")]
    Unauthorized(String),

    /// A controller returned an error; reported and redirected to `#500`.
    #[error("handler fault in {route}: {source}")]
    HandlerFault {
        route: String,
        #[source]
        source: HandlerError,
    },

    /// Multipart request refused before or during body intake.
    #[error("upload rejected: {0}")]
    UploadRejected(#[from] UploadError),

    /// Malformed form-encoded or structured body; dispatch continues with an
    /// empty parsed body.
    #[error("body parse failed: {0}")]
    BodyParse(String),

    /// Route registration attempted after the table was compiled.
    #[error("route table is frozen; register routes before compile()")]
    TableFrozen,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type controllers return from their handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Rejections produced by the upload pipeline.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Multipart request with no upload-flagged route for the path.
    #[error("no upload-capable route for {0}")]
    NoUploadRoute(String),

    /// Body exceeded the matched route's size ceiling.
    #[error("body exceeded limit of {limit} bytes")]
    BodyTooLarge { limit: u64 },

    /// Multipart payload could not be parsed into parts.
    #[error("malformed multipart body: {0}")]
    Malformed(String),

    /// The transport failed while the body was arriving.
    #[error("body transfer failed: {0}")]
    Transfer(String),

    #[error("staging file {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
