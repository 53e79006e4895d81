//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AcornConfig (validated, immutable)
//!     → service routes + middleware, dispatch settings
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new RouteTable built from it
//!     → HttpServer installs it (atomic swap)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Listener settings are read once; a reload swaps routes and middleware

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AcornConfig, ListenerConfig, MountConfig, ObservabilityConfig, ServerConfig,
    StaticFilesConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
