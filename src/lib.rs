//! Vestibule: an HTTP routing and dispatch engine.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                   ENGINE                      │
//!                        │                                               │
//!   Client Request       │  ┌─────────┐   ┌─────────┐   ┌────────────┐  │
//!   ─────────────────────┼─▶│   net   │──▶│  http   │──▶│  dispatch  │  │
//!                        │  │listener │   │ server  │   │ + routing  │  │
//!                        │  └─────────┘   └─────────┘   └─────┬──────┘  │
//!                        │       static paths │               │         │
//!                        │                    ▼               ▼         │
//!   Client Response      │              ┌──────────────────────────┐    │
//!   ◀────────────────────┼──────────────│         delivery         │    │
//!                        │              │ compression / caching /  │    │
//!                        │              │      static assets       │    │
//!                        │              └──────────────────────────┘    │
//!                        │                                               │
//!                        │  upload: gate → stage → parse → cleanup       │
//!                        │  cross-cutting: config, observability,        │
//!                        │                 lifecycle, error              │
//!                        └──────────────────────────────────────────────┘
//! ```
//!
//! Requests without a file extension go through the route table: routes are
//! sorted by specificity once at startup, matched by segments and flags, and
//! misses redirect once to a themed fallback (`#404`, `#403`, `#500`) before
//! a plain-text terminal response.

// Core subsystems
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod http;
pub mod net;
pub mod routing;

// Request body and response delivery
pub mod delivery;
pub mod upload;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::{load_config, EngineConfig};
pub use dispatch::{handler, Exchange, JoinBarrier};
pub use engine::{Engine, EngineBuilder};
pub use error::{EngineError, HandlerError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
