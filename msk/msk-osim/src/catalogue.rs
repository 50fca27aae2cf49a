//! Canonical state-name enumeration.
//!
//! The engine lays out its state vector by category, not by element, so the
//! catalogue repeats the joint and muscle traversals once per category:
//!
//! 1. `/jointset/<joint>/<coord>/value` for every coordinate of every movable joint
//! 2. `/jointset/<joint>/<coord>/speed`, same traversal
//! 3. `/forceset/<m>/activation` and `/forceset/<m>/normalized_tendon_force` per muscle
//! 4. `/forceset/<m>` per muscle
//! 5. `/jointset/<joint>/<coord>/accel`, same joint traversal
//! 6. `/forceset/<m>/implicitderiv_normalized_tendon_force` per muscle
//!
//! Welded joints contribute nothing. Document order is kept everywhere.

use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_MUSCLE_TAG, ModelDescriptor};

/// Per-coordinate state category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateState {
    /// Generalized position.
    Value,
    /// Generalized speed.
    Speed,
    /// Generalized acceleration.
    Accel,
}

impl CoordinateState {
    /// Path suffix of the category.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Speed => "speed",
            Self::Accel => "accel",
        }
    }
}

/// State path of a joint coordinate.
#[must_use]
pub fn coordinate_state_path(joint: &str, coordinate: &str, state: CoordinateState) -> String {
    format!("/jointset/{joint}/{coordinate}/{}", state.suffix())
}

/// State path of a force element, optionally with a state suffix.
#[must_use]
pub fn force_state_path(force: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("/forceset/{force}/{suffix}"),
        None => format!("/forceset/{force}"),
    }
}

/// Ordered state names of a model, excluding `time`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateNameCatalogue {
    names: Vec<String>,
}

impl StateNameCatalogue {
    /// State names in canonical order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the model has no states.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over state names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Whether `name` is a state of the model.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Column names of a state table for this model: `time`, then every state.
    #[must_use]
    pub fn table_columns(&self) -> Vec<String> {
        std::iter::once("time".to_string())
            .chain(self.names.iter().cloned())
            .collect()
    }
}

/// Enumerate state names, recognizing muscles by the default tag.
#[must_use]
pub fn enumerate_states(model: &ModelDescriptor) -> StateNameCatalogue {
    enumerate_states_with(model, DEFAULT_MUSCLE_TAG)
}

/// Enumerate state names, recognizing muscles whose tag contains `muscle_tag`.
#[must_use]
pub fn enumerate_states_with(model: &ModelDescriptor, muscle_tag: &str) -> StateNameCatalogue {
    let mut names = Vec::new();

    let coordinate_pass = |names: &mut Vec<String>, state: CoordinateState| {
        names.extend(
            model
                .coordinates()
                .map(|(joint, coord)| coordinate_state_path(&joint.name, &coord.name, state)),
        );
    };

    coordinate_pass(&mut names, CoordinateState::Value);
    coordinate_pass(&mut names, CoordinateState::Speed);

    for muscle in model.muscles(muscle_tag) {
        names.push(force_state_path(&muscle.name, Some("activation")));
        names.push(force_state_path(&muscle.name, Some("normalized_tendon_force")));
    }
    names.extend(model.muscles(muscle_tag).map(|m| force_state_path(&m.name, None)));

    coordinate_pass(&mut names, CoordinateState::Accel);

    names.extend(
        model
            .muscles(muscle_tag)
            .map(|m| force_state_path(&m.name, Some("implicitderiv_normalized_tendon_force"))),
    );

    StateNameCatalogue { names }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{CoordinateDescriptor, ForceElement, JointDescriptor, JointKind};

    fn model() -> ModelDescriptor {
        ModelDescriptor::new("leg")
            .with_joint(
                JointDescriptor::new("hip", JointKind::Pin, "/ground", "femur")
                    .with_coordinate(CoordinateDescriptor::new("hip_flexion")),
            )
            .with_joint(JointDescriptor::new("weld", JointKind::Weld, "femur", "patella"))
            .with_joint(
                JointDescriptor::new("knee", JointKind::Pin, "femur", "tibia")
                    .with_coordinate(CoordinateDescriptor::new("knee_flexion")),
            )
            .with_force(ForceElement::new("vasti", "DeGrooteFregly2016Muscle"))
            .with_force(ForceElement::new("reserve", "CoordinateActuator"))
            .with_force(ForceElement::new("gastroc", "DeGrooteFregly2016Muscle"))
    }

    #[test]
    fn follows_category_order() {
        let catalogue = enumerate_states(&model());
        assert_eq!(
            catalogue.names(),
            &[
                "/jointset/hip/hip_flexion/value",
                "/jointset/knee/knee_flexion/value",
                "/jointset/hip/hip_flexion/speed",
                "/jointset/knee/knee_flexion/speed",
                "/forceset/vasti/activation",
                "/forceset/vasti/normalized_tendon_force",
                "/forceset/gastroc/activation",
                "/forceset/gastroc/normalized_tendon_force",
                "/forceset/vasti",
                "/forceset/gastroc",
                "/jointset/hip/hip_flexion/accel",
                "/jointset/knee/knee_flexion/accel",
                "/forceset/vasti/implicitderiv_normalized_tendon_force",
                "/forceset/gastroc/implicitderiv_normalized_tendon_force",
            ]
        );
    }

    #[test]
    fn is_deterministic() {
        let model = model();
        assert_eq!(enumerate_states(&model), enumerate_states(&model));
    }

    #[test]
    fn welded_joint_coordinates_are_excluded() {
        let model = ModelDescriptor::new("m").with_joint(
            JointDescriptor::new("weld", JointKind::Weld, "/ground", "b")
                .with_coordinate(CoordinateDescriptor::new("ghost")),
        );
        assert!(enumerate_states(&model).is_empty());
    }

    #[test]
    fn custom_muscle_tag() {
        let catalogue = enumerate_states_with(&model(), "CoordinateActuator");
        assert!(catalogue.contains("/forceset/reserve"));
        assert!(!catalogue.contains("/forceset/vasti"));
    }

    #[test]
    fn table_columns_start_with_time() {
        let columns = enumerate_states(&model()).table_columns();
        assert_eq!(columns[0], "time");
        assert_eq!(columns.len(), 15);
    }
}
