//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AcornConfig {
    /// Listener configuration (bind address, read size).
    pub listener: ListenerConfig,

    /// Dispatch and lifecycle settings.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Where static content is served from.
    pub static_files: StaticFilesConfig,

    /// Extra `GET` routes serving static content.
    pub mounts: Vec<MountConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest number of bytes delivered in one data event.
    pub read_buffer_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            read_buffer_size: 1460,
        }
    }
}

/// Server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Value of the `Server` header on every response.
    pub name: String,

    /// Seconds between pool status log lines. 0 disables them.
    pub status_interval_secs: u64,

    /// Seconds to wait for connections to drain on shutdown.
    pub shutdown_grace_secs: u64,

    /// Defer every request by this many milliseconds before routing. 0 disables.
    pub middleware_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "IncludeOS/Acorn".to_string(),
            status_interval_secs: 30,
            shutdown_grace_secs: 5,
            middleware_delay_ms: 0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Static content configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Directory all served files live under.
    pub root: PathBuf,

    /// File served for `GET /`, relative to `root`.
    pub index: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("public"),
            index: "index.html".to_string(),
        }
    }
}

/// A `GET` route serving static content.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MountConfig {
    /// Route pattern, matched against the whole path.
    pub pattern: String,

    /// File to serve, relative to the static root. When absent, the request
    /// path itself is resolved under the root.
    #[serde(default)]
    pub file: Option<String>,
}
