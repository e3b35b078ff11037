//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the dispatch engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Directory layout (public assets, upload staging).
    pub directories: DirectoryConfig,

    /// Request body limits.
    pub limits: LimitConfig,

    /// Debug mode: disables conditional-GET caching and the asset transform
    /// cache, and tags every request with the `debug` flag.
    pub debug: bool,

    /// Version string appended to every file ETag; bump it to invalidate
    /// client caches wholesale.
    pub etag_version: String,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Whether the listener sits behind secure transport; drives the
    /// http/https request flag.
    pub secure: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
            secure: false,
        }
    }
}

/// Directory layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Static assets served for extension-bearing paths.
    pub public: PathBuf,

    /// Upload staging and compiled-asset cache. Cleared at startup.
    pub tmp: PathBuf,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            public: PathBuf::from("public"),
            tmp: PathBuf::from("tmp"),
        }
    }
}

/// Request body limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Default byte ceiling for request bodies when a route does not set its
    /// own.
    pub default_max_body: u64,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            default_max_body: 1024 * 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
