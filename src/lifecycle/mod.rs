//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Build engine (routes compile) → Clear tmp
//!     → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → In-flight requests finish → Exit
//!
//! Signals (signals.rs):
//!     SIGINT/Ctrl+C → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - The route table freezes at startup; no runtime registration
//! - Shutdown stops the accept loop; spawned connection tasks drain naturally

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
