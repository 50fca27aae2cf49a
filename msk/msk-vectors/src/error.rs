//! Error types for force-vector extraction.

use std::path::PathBuf;

use msk_engine::EngineError;
use thiserror::Error;

/// Errors that abort an extraction run.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The engine rejected a call. The whole run is invalid.
    #[error("engine failure for {}{}: {source}", .model.display(), location(.element, .time_index))]
    Engine {
        /// Model the engine was driving.
        model: PathBuf,
        /// Force element being evaluated, if any.
        element: Option<String>,
        /// Row of the trajectory being replayed, if any.
        time_index: Option<usize>,
        /// The engine's error.
        #[source]
        source: EngineError,
    },

    /// A muscle path lost its terminal segment mid-run.
    #[error("muscle `{element}` has {points} path points at time index {time_index}, need at least 2")]
    PathTooShort {
        /// Muscle name.
        element: String,
        /// Number of points reported.
        points: usize,
        /// Row of the trajectory.
        time_index: usize,
    },

    /// A step was requested past the end of the table.
    #[error("time index {time_index} is out of range for a table of {rows} rows")]
    RowOutOfRange {
        /// Requested row.
        time_index: usize,
        /// Rows in the table.
        rows: usize,
    },

    /// Output file could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output record could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn location(element: &Option<String>, time_index: &Option<usize>) -> String {
    match (element, time_index) {
        (Some(e), Some(t)) => format!(" (element `{e}`, time index {t})"),
        (Some(e), None) => format!(" (element `{e}`)"),
        (None, Some(t)) => format!(" (time index {t})"),
        (None, None) => String::new(),
    }
}

impl ExtractError {
    /// Wrap an engine error with the run location.
    pub fn engine(
        model: impl Into<PathBuf>,
        element: Option<&str>,
        time_index: Option<usize>,
        source: EngineError,
    ) -> Self {
        Self::Engine {
            model: model.into(),
            element: element.map(str::to_string),
            time_index,
            source,
        }
    }
}

/// Result type for extraction.
pub type Result<T> = std::result::Result<T, ExtractError>;
