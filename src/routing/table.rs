//! Route registration and specificity ordering.
//!
//! # Responsibilities
//! - Split URL patterns into segments and cache placeholder positions
//! - Hold every registered route for the process lifetime
//! - Sort routes by specificity once, then freeze
//!
//! # Design Decisions
//! - Compiled at startup, immutable at runtime (shared via Arc, no locks)
//! - Flag-qualified routes are tried before generic catch-alls; among
//!   flagless routes the shorter pattern wins
//! - Registering two routes with identical pattern and flags is legal; the
//!   first one registered shadows the later one (stable sort)

use crate::dispatch::{Handler, Validator};
use crate::error::EngineError;
use crate::routing::flags::{Flag, FlagSet};
use crate::routing::matcher;

/// Placeholder marker: segments like `{id}` match any non-empty segment.
const PLACEHOLDER: char = '{';

/// Names of the themed fallback routes.
pub const FALLBACK_NOT_FOUND: &str = "#404";
pub const FALLBACK_FORBIDDEN: &str = "#403";
pub const FALLBACK_FAULT: &str = "#500";

/// A registered route. Born during startup registration, immutable afterward.
#[derive(Clone)]
pub struct Route {
    /// Name of the controller that registered this route, for error reports.
    pub controller: String,
    /// Path split into segments; placeholder segments start with `{`.
    pub pattern: Vec<String>,
    /// Positions of placeholder segments within `pattern`.
    pub param_indices: Vec<usize>,
    /// Flags the request must carry for this route to match.
    pub flags: FlagSet,
    /// Byte ceiling for request bodies.
    pub max_body_size: u64,
    pub handler: Handler,
    /// Optional predicate run after flag matching, before invocation.
    pub validator: Option<Validator>,
}

impl Route {
    /// Human-readable pattern for logs.
    pub fn pattern_display(&self) -> String {
        if self.pattern.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", self.pattern.join("/"))
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("controller", &self.controller)
            .field("pattern", &self.pattern)
            .field("flags", &self.flags)
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

/// Split a URL (or fallback name) into path segments.
///
/// Leading and trailing separators are dropped: `/` yields no segments,
/// `/user/{id}/` yields `["user", "{id}"]`, `#404` yields `["#404"]`.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// The route table. Write-only until [`RouteTable::compile`], read-only after.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    compiled: bool,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. No matching happens here; placeholder indices are
    /// derived and cached for the matcher.
    pub fn register(
        &mut self,
        controller: &str,
        pattern: &str,
        flags: FlagSet,
        max_body_size: u64,
        handler: Handler,
        validator: Option<Validator>,
    ) -> Result<(), EngineError> {
        if self.compiled {
            return Err(EngineError::TableFrozen);
        }

        let pattern = split_path(pattern);
        let param_indices = pattern
            .iter()
            .enumerate()
            .filter(|(_, s)| s.starts_with(PLACEHOLDER))
            .map(|(i, _)| i)
            .collect();

        self.routes.push(Route {
            controller: controller.to_string(),
            pattern,
            param_indices,
            flags,
            max_body_size,
            handler,
            validator,
        });
        Ok(())
    }

    /// Sort the table by specificity and freeze it. Idempotent.
    ///
    /// Ordering: if either route carries flags, the one with more flags sorts
    /// first; if both are flagless, the one with fewer segments sorts first.
    /// The sort is stable, so equal routes keep registration order.
    pub fn compile(&mut self) {
        if self.compiled {
            return;
        }
        self.routes.sort_by(|a, b| {
            if !a.flags.is_empty() || !b.flags.is_empty() {
                b.flags.len().cmp(&a.flags.len())
            } else {
                a.pattern.len().cmp(&b.pattern.len())
            }
        });
        self.compiled = true;
        tracing::debug!(routes = self.routes.len(), "Route table compiled");
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Routes in specificity order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// First route matching the path whose flags include `upload`.
    ///
    /// The upload gate: a multipart body is only accepted when this returns a
    /// route, and that route's size ceiling bounds the transfer.
    pub fn find_upload(&self, segments: &[String]) -> Option<&Route> {
        self.routes.iter().find(|r| {
            r.flags.contains(&Flag::Upload) && matcher::segments_match(segments, &r.pattern)
        })
    }

    /// First route matching path and flags, ignoring validators.
    ///
    /// Used before body intake to learn the size ceiling and whether the body
    /// should parse as JSON; the authoritative lookup happens in the
    /// dispatcher afterward.
    pub fn peek(&self, segments: &[String], flags: &FlagSet) -> Option<&Route> {
        self.routes.iter().find(|r| {
            matcher::segments_match(segments, &r.pattern)
                && matcher::flags_match(flags, &r.flags) == matcher::FlagMatch::Ok
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::noop_handler;

    fn table_with(entries: &[(&str, &[&str])]) -> RouteTable {
        let mut table = RouteTable::new();
        for (pattern, flags) in entries {
            table
                .register(
                    "test",
                    pattern,
                    flags.iter().copied().collect(),
                    5120,
                    noop_handler(),
                    None,
                )
                .unwrap();
        }
        table
    }

    #[test]
    fn test_split_path() {
        assert!(split_path("/").is_empty());
        assert_eq!(split_path("/user/{id}"), vec!["user", "{id}"]);
        assert_eq!(split_path("#404"), vec!["#404"]);
    }

    #[test]
    fn test_placeholder_indices_cached() {
        let table = table_with(&[("/user/{id}/photo/{num}", &[])]);
        assert_eq!(table.routes()[0].param_indices, vec![1, 3]);
    }

    #[test]
    fn test_sort_flagged_before_flagless() {
        let mut table = table_with(&[("/", &[]), ("/", &["ajax"])]);
        table.compile();
        assert_eq!(table.routes()[0].flags.len(), 1);
        assert!(table.routes()[1].flags.is_empty());
    }

    #[test]
    fn test_sort_more_flags_first() {
        let mut table = table_with(&[
            ("/a", &["ajax"]),
            ("/a", &["ajax", "logged", "post"]),
            ("/a", &["ajax", "post"]),
        ]);
        table.compile();
        let sizes: Vec<usize> = table.routes().iter().map(|r| r.flags.len()).collect();
        assert_eq!(sizes, vec![3, 2, 1]);
    }

    #[test]
    fn test_sort_flagless_shorter_first() {
        let mut table = table_with(&[("/a/b/c", &[]), ("/", &[]), ("/a/b", &[])]);
        table.compile();
        let lens: Vec<usize> = table.routes().iter().map(|r| r.pattern.len()).collect();
        assert_eq!(lens, vec![0, 2, 3]);
    }

    #[test]
    fn test_duplicate_registration_first_wins() {
        let mut table = table_with(&[("/dup", &["ajax"]), ("/dup", &["ajax"])]);
        table.routes.iter_mut().enumerate().for_each(|(i, r)| {
            r.controller = format!("c{i}");
        });
        table.compile();
        // Stable sort keeps the first registered route ahead.
        assert_eq!(table.routes()[0].controller, "c0");
    }

    #[test]
    fn test_register_after_compile_fails() {
        let mut table = table_with(&[("/", &[])]);
        table.compile();
        let err = table
            .register("test", "/late", FlagSet::new(), 5120, noop_handler(), None)
            .unwrap_err();
        assert!(matches!(err, EngineError::TableFrozen));
    }

    #[test]
    fn test_compile_idempotent() {
        let mut table = table_with(&[("/", &[])]);
        table.compile();
        table.compile();
        assert!(table.is_compiled());
    }

    #[test]
    fn test_find_upload_requires_upload_flag() {
        let mut table = table_with(&[("/files", &["post"]), ("/files", &["upload"])]);
        table.compile();
        let segments = split_path("/files");
        let route = table.find_upload(&segments).expect("upload route");
        assert!(route.flags.contains(&Flag::Upload));
        assert!(table.find_upload(&split_path("/other")).is_none());
    }
}
