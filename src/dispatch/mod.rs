//! Per-request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext (built by http::request)
//!     → dispatcher.rs state machine:
//!         Created → Authorizing (optional hook) → PrimaryLookup
//!                 → { Invoking | FallbackLookup } → Responded
//!     → controller handler runs with an Exchange (context.rs)
//!     → exactly one response lands in the ResponseSlot
//! ```
//!
//! # Design Decisions
//! - Handler faults are values, not panics: handlers return Result and the
//!   dispatcher redirects failures to the `#500` fallback
//! - One fallback redirection per request; a second failure terminates with a
//!   plain-text status body
//! - The ResponseSlot makes every write after the first a silent no-op

pub mod barrier;
pub mod context;
pub mod dispatcher;

use std::sync::Arc;

use futures_util::future::BoxFuture;

pub use barrier::JoinBarrier;
pub use context::{Exchange, Outcome, RequestContext, ResponseSlot};
pub use dispatcher::Dispatcher;

use crate::error::HandlerError;

/// What a controller handler resolves to.
pub type HandlerResult = Result<(), HandlerError>;

/// Boxed handler future; handlers may defer completion as long as they like.
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

/// A registered controller entry point.
pub type Handler = Arc<dyn Fn(Exchange) -> HandlerFuture + Send + Sync>;

/// Predicate run after flag matching, before invocation.
pub type Validator = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// Wrap an async closure into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Exchange) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |x| Box::pin(f(x)))
}

/// Handler that completes without responding. Useful as a placeholder in
/// tests and table plumbing.
pub fn noop_handler() -> Handler {
    handler(|_| async { Ok(()) })
}
