//! Route matching logic.
//!
//! # Responsibilities
//! - Compare request path segments against route patterns (placeholders wild)
//! - Score flag compatibility as ok / insufficient / conflict
//! - Extract placeholder parameter values in pattern order
//!
//! # Design Decisions
//! - Path matching is case-sensitive and requires equal segment counts
//! - A conflict is reserved for mutually exclusive pairs (auth states); it
//!   distinguishes "wrong credentials" from "wrong path" so the dispatcher can
//!   pick the 403 fallback over the 404 one
//! - Pure functions, no allocation on the match path

use crate::routing::flags::{Flag, FlagSet};
use crate::routing::table::Route;

/// Outcome of comparing a request's flags against a route's requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagMatch {
    /// Every required route flag is present in the request.
    Ok,
    /// Required flags missing, with no semantic contradiction.
    Insufficient,
    /// The request carries a flag that actively contradicts a requirement,
    /// e.g. an `unlogged` request against a route demanding `logged`.
    Conflict,
}

/// True when every non-placeholder route segment equals the request segment
/// verbatim and placeholders line up with non-empty request segments.
pub fn segments_match(request: &[String], route: &[String]) -> bool {
    if request.len() != route.len() {
        return false;
    }
    request.iter().zip(route.iter()).all(|(req, pat)| {
        if pat.starts_with('{') {
            !req.is_empty()
        } else {
            req == pat
        }
    })
}

/// Score the request's flags against the route's required flags.
///
/// Conflict takes precedence over insufficiency: if any required flag is
/// contradicted the result is [`FlagMatch::Conflict`] even when other flags
/// are merely absent. The `json` flag is a body-parse marker consulted at
/// intake time; requests never carry it, so it is skipped here.
pub fn flags_match(request: &FlagSet, route: &FlagSet) -> FlagMatch {
    let mut missing = false;
    for required in route.iter() {
        if matches!(required, Flag::Json) {
            continue;
        }
        if request.contains(required) {
            continue;
        }
        if let Some(opposite) = required.conflicts_with() {
            if request.contains(&opposite) {
                return FlagMatch::Conflict;
            }
        }
        missing = true;
    }
    if missing {
        FlagMatch::Insufficient
    } else {
        FlagMatch::Ok
    }
}

/// Pull the request segment values at the route's placeholder indices.
pub fn extract_params(request: &[String], route: &Route) -> Vec<String> {
    route
        .param_indices
        .iter()
        .filter_map(|&i| request.get(i).cloned())
        .collect()
}
