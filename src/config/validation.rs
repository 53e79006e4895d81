//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and formats (addresses, buffer sizes, log settings)
//! - Check that mount patterns compile and mount files stay under the static root
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AcornConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::path::{Component, Path};

use thiserror::Error;

use crate::config::schema::AcornConfig;
use crate::routing::matcher::PathPattern;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["pretty", "json"];

/// Largest per-connection read buffer accepted; each connection allocates one.
pub const MAX_READ_BUFFER_SIZE: usize = 64 * 1024;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    InvalidBindAddress(String),
    #[error("listener.read_buffer_size must be greater than zero")]
    ZeroReadBuffer,
    #[error("listener.read_buffer_size {size} exceeds the maximum of {max} bytes")]
    ReadBufferTooLarge { size: usize, max: usize },
    #[error("server.name must not be empty")]
    EmptyServerName,
    #[error("observability.log_level `{0}` is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
    #[error("observability.log_format `{0}` is not one of pretty, json")]
    UnknownLogFormat(String),
    #[error("mounts[{index}].pattern `{pattern}` does not compile: {reason}")]
    InvalidMountPattern {
        index: usize,
        pattern: String,
        reason: String,
    },
    #[error("mounts[{index}].file `{file}` escapes the static root")]
    MountOutsideRoot { index: usize, file: String },
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &AcornConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.read_buffer_size == 0 {
        errors.push(ValidationError::ZeroReadBuffer);
    } else if config.listener.read_buffer_size > MAX_READ_BUFFER_SIZE {
        errors.push(ValidationError::ReadBufferTooLarge {
            size: config.listener.read_buffer_size,
            max: MAX_READ_BUFFER_SIZE,
        });
    }
    if config.server.name.trim().is_empty() {
        errors.push(ValidationError::EmptyServerName);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }
    if !LOG_FORMATS.contains(&config.observability.log_format.as_str()) {
        errors.push(ValidationError::UnknownLogFormat(
            config.observability.log_format.clone(),
        ));
    }

    for (index, mount) in config.mounts.iter().enumerate() {
        if let Err(e) = PathPattern::new(&mount.pattern) {
            errors.push(ValidationError::InvalidMountPattern {
                index,
                pattern: mount.pattern.clone(),
                reason: e.to_string(),
            });
        }
        if let Some(file) = &mount.file {
            if !is_contained(Path::new(file)) {
                errors.push(ValidationError::MountOutsideRoot {
                    index,
                    file: file.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// True if `relative` names something below the directory it is joined to.
pub(crate) fn is_contained(relative: &Path) -> bool {
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
