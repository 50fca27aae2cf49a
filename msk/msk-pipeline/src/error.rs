//! Error types for pipeline runs.

use std::path::PathBuf;

use msk_osim::OsimError;
use msk_table::TableError;
use msk_vectors::ExtractError;
use thiserror::Error;

/// Errors that abort a pipeline command.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Table could not be read or written.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Model descriptor could not be read.
    #[error(transparent)]
    Model(#[from] OsimError),

    /// Extraction failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The input needs a model and none was given.
    #[error("{} requires a model (.osim), pass one with --model", .input.display())]
    MissingModelDependency {
        /// The input that needs it.
        input: PathBuf,
    },

    /// No input file could be selected.
    #[error("no unique file matching `{needle}` in {}", .dir.display())]
    MissingInput {
        /// Directory searched.
        dir: PathBuf,
        /// Substring searched for.
        needle: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem error outside table I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type for pipeline commands.
pub type Result<T> = std::result::Result<T, PipelineError>;
