//! Error types for the Colloquy engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the Colloquy crates.
///
/// This provides typed, structured error variants with constructor helpers,
/// so callers can match on the failure class instead of string contents.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ColloquyError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Instruction or document parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error (bad pipeline, unknown handler, invalid definition)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data access error (repository/storage layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Workflow or directive execution error
    #[error("Execution error: {0}")]
    Execution(String),

    /// Explicitly unsupported operation
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ColloquyError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates an Execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Creates an Unimplemented error
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::Unimplemented(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Convenience result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, ColloquyError>;
