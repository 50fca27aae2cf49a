//! Non-fatal conditions recorded during extraction.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A recoverable condition met while replaying a trajectory.
///
/// Events are returned with the extracted series and also logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ExtractionEvent {
    /// A muscle's anchor moved relative to the previous row.
    OriginDrift {
        /// Muscle name.
        element: String,
        /// Row of the trajectory.
        time_index: usize,
        /// Time of the row.
        time: f64,
        /// Baseline anchor before this row.
        previous: [f64; 3],
        /// Anchor at this row. Becomes the new baseline.
        current: [f64; 3],
    },
    /// A terminal segment was too short to normalize.
    DegenerateGeometry {
        /// Muscle name.
        element: String,
        /// Row of the trajectory.
        time_index: usize,
        /// Time of the row.
        time: f64,
        /// Segment length.
        length: f64,
    },
}

impl ExtractionEvent {
    /// Muscle the event concerns.
    #[must_use]
    pub fn element(&self) -> &str {
        match self {
            Self::OriginDrift { element, .. } | Self::DegenerateGeometry { element, .. } => element,
        }
    }

    /// Trajectory row the event was raised at.
    #[must_use]
    pub fn time_index(&self) -> usize {
        match self {
            Self::OriginDrift { time_index, .. } | Self::DegenerateGeometry { time_index, .. } => {
                *time_index
            }
        }
    }

    /// Short name of the event kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OriginDrift { .. } => "OriginDrift",
            Self::DegenerateGeometry { .. } => "DegenerateGeometry",
        }
    }

    /// Whether this is an `OriginDrift` event.
    #[must_use]
    pub fn is_drift(&self) -> bool {
        matches!(self, Self::OriginDrift { .. })
    }

    pub(crate) fn log(&self) {
        match self {
            Self::OriginDrift {
                element,
                time_index,
                time,
                previous,
                current,
            } => warn!(
                element = %element,
                time_index,
                time,
                ?previous,
                ?current,
                "Force vector origin has shifted"
            ),
            Self::DegenerateGeometry {
                element,
                time_index,
                time,
                length,
            } => warn!(
                element = %element,
                time_index,
                time,
                length,
                "Degenerate terminal segment, direction replaced by zero vector"
            ),
        }
    }
}

impl fmt::Display for ExtractionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OriginDrift {
                element,
                time,
                previous,
                current,
                ..
            } => write!(
                f,
                "OriginDrift: `{element}` at t={time}: {previous:?} -> {current:?}"
            ),
            Self::DegenerateGeometry {
                element,
                time,
                length,
                ..
            } => write!(
                f,
                "DegenerateGeometry: `{element}` at t={time}: segment length {length:e}"
            ),
        }
    }
}
