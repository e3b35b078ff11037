//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Derive the default filter from the configured log level
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the config level when set
//! - Plain fmt layer; log aggregation happens outside the process

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::EngineConfig;

/// Install the global tracing subscriber.
///
/// Safe to call only once per process; later calls are ignored by
/// `try_init`.
pub fn init_logging(config: &EngineConfig) {
    let default_filter = format!("vestibule={}", config.observability.log_level);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
