//! # Error Taxonomy
//!
//! Errors are split by the phase in which they can occur:
//!
//! - **Startup** (`RegistryError`, `ConfigError`, `InitError`): always fatal.
//!   The binary prints the error followed by usage and exits non-zero.
//! - **In-run** (`WriteError`, `ReadError`): scoped to a single message. The
//!   schemes absorb them into their statistics and keep looping.
//! - **Termination** (`TimeoutError`, `ReadError::Closed`): the normal end of
//!   a reader run, not a failure.

use std::time::Duration;
use thiserror::Error;

use crate::registry::Category;

/// Registry lookups and registrations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown {category} type: '{name}'")]
    UnknownType { category: Category, name: String },

    #[error("{category} type '{name}' is already registered")]
    DuplicateType { category: Category, name: String },
}

/// Configuration construction and typed access.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Values must be of the form <key>=<value>, got '{0}'")]
    Format(String),

    #[error("Configuration key '{key}' is not a valid {expected}: {found}")]
    Type {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure to bring a scheme or transport into a runnable state.
#[derive(Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Transport setup failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to deliver a single message.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Transport not initialized")]
    NotInitialized,

    #[error("Message of {size} bytes exceeds the transport limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("Peer closed the transport")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to obtain a single message.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Transport not initialized")]
    NotInitialized,

    /// The peer is gone for good; no further message can arrive.
    #[error("Transport closed")]
    Closed,

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReadError {
    /// Whether this error ends the read loop rather than counting as a
    /// lost receive.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadError::Closed)
    }
}

/// No message arrived within the idle interval.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("No message received for {0:?}")]
pub struct TimeoutError(pub Duration);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::UnknownType {
            category: Category::Writer,
            name: "carrier-pigeon".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown writer type: 'carrier-pigeon'");

        let err = ConfigError::Format("a=b=c".to_string());
        assert_eq!(
            err.to_string(),
            "Values must be of the form <key>=<value>, got 'a=b=c'"
        );

        let err = TimeoutError(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn test_read_error_terminal() {
        assert!(ReadError::Closed.is_terminal());
        assert!(!ReadError::Malformed("short".to_string()).is_terminal());
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(!ReadError::from(io).is_terminal());
    }

    #[test]
    fn test_init_error_from_config() {
        let err: InitError = ConfigError::Format("oops".to_string()).into();
        assert!(matches!(err, InitError::Config(ConfigError::Format(_))));
    }
}
