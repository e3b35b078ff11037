//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via `tracing`, initialized once at startup
//! - Log level comes from config, overridable with `RUST_LOG`
//! - Faults reported through the engine's error hook also land here as
//!   structured events, so a deployment without a hook still gets a trail

pub mod logging;

pub use logging::init_logging;
