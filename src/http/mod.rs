//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net layer)
//!     → server.rs (hyper/1.1 connection task, per-request pipeline)
//!     → request.rs (segments, flags, query; form/JSON body parsing)
//!     → static fast path OR dispatcher (routing + fallback chain)
//!     → delivery (compression, caching headers)
//!     → Send to client, or drop the connection for refused uploads
//! ```

pub mod request;
pub mod server;

pub use server::{ConnectionAbort, HttpServer};
