//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (path, flags)
//!     → table.rs (specificity-ordered scan)
//!     → matcher.rs (segment compare, flag scoring)
//!     → Return: matched Route + extracted params, or no match
//!
//! Route compilation (at startup):
//!     register(pattern, flags, handler)[]
//!     → cache placeholder indices
//!     → sort by specificity (flags first, then shorter paths)
//!     → freeze as immutable table
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins in specificity order; duplicate routes shadow silently

pub mod flags;
pub mod matcher;
pub mod table;

pub use flags::{Flag, FlagSet};
pub use matcher::{extract_params, flags_match, segments_match, FlagMatch};
pub use table::{split_path, Route, RouteTable};
