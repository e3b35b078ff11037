//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → Hand off to the HTTP layer (hyper, one task per connection)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - A connection permit is held for the whole connection lifetime and
//!   released on drop, even if the handler task panics

pub mod listener;

pub use listener::{ConnectionPermit, Listener, ListenerError};
