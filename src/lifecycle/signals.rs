//! OS signal handling.
//!
//! # Responsibilities
//! - Translate Ctrl+C / SIGINT into the internal shutdown signal
//!
//! # Design Decisions
//! - Uses Tokio's async-safe signal handling
//! - Runs as a detached task so the accept loop never blocks on it

use std::sync::Arc;

use crate::lifecycle::Shutdown;

/// Spawn a task that triggers shutdown on Ctrl+C.
pub fn spawn_interrupt_handler(shutdown: Arc<Shutdown>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            shutdown.trigger();
        }
    });
}
