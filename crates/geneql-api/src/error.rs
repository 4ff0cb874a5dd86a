//! Error types for the GeneQL facade.

use crate::logging::LogError;
use geneql_core::{CodecError, CompileError, EntityKind, SchemaError};
use geneql_engine::RuntimeError;
use thiserror::Error;

/// Failure loading configuration or a schema
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("config sets both an inline schema and schema_path")]
    ConflictingSchemaSources,

    #[error("schema declares no {0} entity")]
    MissingEntity(EntityKind),

    #[error(transparent)]
    Logging(#[from] LogError),
}

/// Any failure surfaced by [`GeneQL`](crate::GeneQL)
#[derive(Debug, Error)]
pub enum GeneQLError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl GeneQLError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            GeneQLError::Runtime(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// A specialized `Result` type for the facade.
pub type Result<T> = std::result::Result<T, GeneQLError>;
