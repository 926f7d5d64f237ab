//! Error taxonomy for a pipeline run
//!
//! Every variant aborts the run. Recovery is a rerun from the reset stage.

use std::path::PathBuf;
use thiserror::Error;

/// A required configuration key is missing, unreadable or malformed
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ini::ParseError,
    },

    #[error("missing required config key [{section}] {key}")]
    Missing { section: String, key: String },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error")]
    Config(#[from] ConfigError),

    /// The warehouse is unreachable or rejected the credentials
    #[error("failed to connect to warehouse at {endpoint}")]
    Connection {
        endpoint: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("DDL statement `{statement}` failed")]
    Ddl {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    /// Staging tables must be treated as invalid until the next reset and load
    #[error("bulk load `{statement}` failed")]
    Load {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    /// Storage preflight found nothing to load (or could not reach the bucket)
    #[error("object storage location {uri} is unavailable")]
    StorageUnavailable {
        uri: String,
        #[source]
        source: anyhow::Error,
    },

    /// Target tables may be partially populated
    #[error("transformation `{statement}` failed")]
    Transform {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("diagnostic query `{statement}` failed")]
    Verify {
        statement: String,
        #[source]
        source: sqlx::Error,
    },
}

impl PipelineError {
    /// Name of the statement that failed, when a statement failed
    pub fn statement(&self) -> Option<&str> {
        match self {
            PipelineError::Ddl { statement, .. }
            | PipelineError::Load { statement, .. }
            | PipelineError::Transform { statement, .. }
            | PipelineError::Verify { statement, .. } => Some(statement),
            _ => None,
        }
    }
}
