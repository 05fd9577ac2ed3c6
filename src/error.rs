//! Error types for pgmanager
//!
//! This module defines the error hierarchy used throughout the crate.
//! We use `thiserror` for library-style errors with clear error chains.

use std::io;
use std::path::PathBuf;

/// Main error type for the pgmanager crate
#[derive(Debug, thiserror::Error)]
pub enum PgManagerError {
    /// Table manager errors
    #[error("Manager error: {0}")]
    Manager(#[from] ManagerError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised by the table manager and the type converter
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// Failed to establish the connection (fatal, never retried)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A field name that is not a visible property of the model
    #[error("{0} is not a valid field")]
    InvalidField(String),

    /// A query filter that is not of the form `"<field> <op>"`
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// No row matched a by-id lookup
    #[error("{class} object with id={id} does not exist")]
    ObjectNotFound { class: String, id: String },

    /// No row matched a by-field lookup
    #[error("Object not found")]
    NotFound,

    /// A by-field lookup matched more than one row
    #[error("Multiple Objects Found")]
    MultipleResults,

    /// A stored value could not be turned back into a domain value
    #[error("{message}")]
    Conversion {
        message: String,
        #[source]
        source: Option<Box<ManagerError>>,
    },

    /// Generic persistence failure (missing id, unexpected row count)
    #[error("{0}")]
    Persistence(String),

    /// The DDL file for a model could not be read
    #[error("Failed to read DDL file {}: {source}", path.display())]
    Ddl {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Driver-level failure, propagated unchanged
    #[error(transparent)]
    Sql(#[from] tokio_postgres::Error),
}

impl ManagerError {
    /// Build a conversion error without an underlying cause
    pub fn conversion(message: impl Into<String>) -> Self {
        ManagerError::Conversion {
            message: message.into(),
            source: None,
        }
    }

    /// True for both flavours of "no matching row"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ManagerError::NotFound | ManagerError::ObjectNotFound { .. }
        )
    }
}

/// Configuration loading/parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Home directory not found
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Config file not found or unreadable
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Connection profile not found
    #[error("Connection profile '{0}' not found")]
    ProfileNotFound(String),
}

/// Specialized Result type for pgmanager operations
pub type Result<T> = std::result::Result<T, PgManagerError>;

/// Specialized Result type for manager and converter operations
pub type ManagerResult<T> = std::result::Result<T, ManagerError>;

/// Specialized Result type for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
