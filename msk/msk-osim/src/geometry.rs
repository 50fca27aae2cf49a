//! Static line-of-action geometry of muscle paths.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{DEFAULT_MUSCLE_TAG, ModelDescriptor, PathPointDescriptor};

/// Segments shorter than this have no direction.
pub const DEGENERATE_LENGTH: f64 = 1e-10;

/// Direction of a line segment, or why it has none.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LineOfAction {
    /// Unit direction vector.
    Unit(Vector3<f64>),
    /// Segment too short to normalize.
    Degenerate {
        /// Segment length.
        length: f64,
    },
}

impl LineOfAction {
    /// Normalize `vector`, guarding against zero length.
    #[must_use]
    pub fn from_vector(vector: Vector3<f64>) -> Self {
        let length = vector.norm();
        if length.is_finite() && length > DEGENERATE_LENGTH {
            Self::Unit(vector / length)
        } else {
            Self::Degenerate { length }
        }
    }

    /// Direction from `from` towards `to`.
    #[must_use]
    pub fn between(from: &Vector3<f64>, to: &Vector3<f64>) -> Self {
        Self::from_vector(to - from)
    }

    /// The unit vector, if any.
    #[must_use]
    pub fn direction(&self) -> Option<Vector3<f64>> {
        match self {
            Self::Unit(v) => Some(*v),
            Self::Degenerate { .. } => None,
        }
    }

    /// Whether the segment was too short.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::Degenerate { .. })
    }

    /// Components of the unit vector, `[0, 0, 0]` when degenerate.
    #[must_use]
    pub fn to_array(&self) -> [f64; 3] {
        match self {
            Self::Unit(v) => [v.x, v.y, v.z],
            Self::Degenerate { .. } => [0.0; 3],
        }
    }
}

/// Terminal segment of one muscle path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceGeometry {
    /// Muscle name.
    pub name: String,
    /// Second-to-last path point.
    pub second_to_last: PathPointDescriptor,
    /// Last path point.
    pub terminal: PathPointDescriptor,
    /// `normalize(terminal - second_to_last)` on the local locations.
    pub line_of_action: LineOfAction,
}

/// Terminal-segment geometry of every muscle with at least two path points.
#[must_use]
pub fn enumerate_force_geometry(model: &ModelDescriptor) -> Vec<ForceGeometry> {
    enumerate_force_geometry_with(model, DEFAULT_MUSCLE_TAG)
}

/// Like [`enumerate_force_geometry`] with a custom muscle tag.
///
/// Locations are compared as written in the descriptor, without resolving
/// their frames. Muscles with fewer than two points are left out.
#[must_use]
pub fn enumerate_force_geometry_with(model: &ModelDescriptor, muscle_tag: &str) -> Vec<ForceGeometry> {
    model
        .muscles(muscle_tag)
        .filter_map(|muscle| {
            let (previous, terminal) = muscle.terminal_segment()?;
            let line_of_action = LineOfAction::between(&previous.location, &terminal.location);
            if let LineOfAction::Degenerate { length } = line_of_action {
                warn!(muscle = %muscle.name, length, "Degenerate terminal segment");
            }
            Some(ForceGeometry {
                name: muscle.name.clone(),
                second_to_last: previous.clone(),
                terminal: terminal.clone(),
                line_of_action,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::ForceElement;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn muscle(name: &str, points: &[[f64; 3]]) -> ForceElement {
        points.iter().enumerate().fold(
            ForceElement::new(name, "DeGrooteFregly2016Muscle"),
            |force, (i, p)| {
                force.with_path_point(PathPointDescriptor::new(
                    format!("{name}-P{}", i + 1),
                    "/bodyset/b",
                    Vector3::new(p[0], p[1], p[2]),
                ))
            },
        )
    }

    #[test]
    fn uses_last_two_points() {
        let model = ModelDescriptor::new("m").with_force(muscle(
            "m1",
            &[[9.0, 9.0, 9.0], [0.0, 0.0, 0.0], [0.0, 2.0, 0.0]],
        ));
        let geometry = enumerate_force_geometry(&model);
        assert_eq!(geometry.len(), 1);
        assert_eq!(geometry[0].second_to_last.name, "m1-P2");
        assert_eq!(geometry[0].terminal.name, "m1-P3");
        let dir = geometry[0].line_of_action.direction().unwrap();
        assert_relative_eq!(dir, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn single_point_muscle_is_excluded() {
        let model = ModelDescriptor::new("m")
            .with_force(muscle("lonely", &[[1.0, 0.0, 0.0]]))
            .with_force(muscle("pair", &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]));
        let names: Vec<String> = enumerate_force_geometry(&model)
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["pair".to_string()]);
    }

    #[test]
    fn coincident_points_are_degenerate() {
        let model =
            ModelDescriptor::new("m").with_force(muscle("m1", &[[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]]));
        let geometry = enumerate_force_geometry(&model);
        assert!(geometry[0].line_of_action.is_degenerate());
        assert_eq!(geometry[0].line_of_action.to_array(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn non_finite_vector_is_degenerate() {
        let loa = LineOfAction::from_vector(Vector3::new(f64::NAN, 0.0, 0.0));
        assert!(loa.is_degenerate());
    }

    // ========================================================================
    // Property-based tests
    // ========================================================================

    proptest! {
        #[test]
        fn non_degenerate_direction_has_unit_norm(
            x in -1e3f64..1e3,
            y in -1e3f64..1e3,
            z in -1e3f64..1e3,
        ) {
            let v = Vector3::new(x, y, z);
            prop_assume!(v.norm() > 1e-6);
            let dir = LineOfAction::from_vector(v).direction().unwrap();
            prop_assert!((dir.norm() - 1.0).abs() < 1e-9);
        }
    }
}
