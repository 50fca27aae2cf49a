//! Error types for engine operations.

use msk_osim::OsimError;
use thiserror::Error;

/// Errors an engine reports when it rejects a request.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The model descriptor could not be loaded.
    #[error("failed to load model: {0}")]
    Model(#[from] OsimError),

    /// No movable coordinate with this name.
    #[error("unknown coordinate: {0}")]
    UnknownCoordinate(String),

    /// No recognized force element with this name.
    #[error("unknown force element: {0}")]
    UnknownElement(String),

    /// A frame reference does not resolve.
    #[error("unknown frame `{frame}` referenced by {owner}")]
    UnknownFrame {
        /// The unresolved reference.
        frame: String,
        /// Who referenced it.
        owner: String,
    },

    /// A body is not connected to ground through the joint tree.
    #[error("body `{0}` is not connected to ground")]
    UnreachableBody(String),

    /// A body is the child of more than one joint.
    #[error("kinematic loop detected: {0}")]
    KinematicLoop(String),

    /// Geometry was queried before being realized for the current values.
    #[error("geometry has not been realized for the current coordinate values")]
    NotRealized,

    /// A coordinate was assigned a NaN or infinite value.
    #[error("non-finite value {value} for coordinate {coordinate}")]
    NonFiniteValue {
        /// Coordinate name.
        coordinate: String,
        /// The rejected value.
        value: f64,
    },

    /// Any other rejection by an external engine.
    #[error("engine rejected request: {0}")]
    Rejected(String),
}

impl EngineError {
    /// Create an unknown frame error.
    pub fn unknown_frame(frame: impl Into<String>, owner: impl Into<String>) -> Self {
        Self::UnknownFrame {
            frame: frame.into(),
            owner: owner.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
