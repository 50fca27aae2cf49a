//! Intermediate representation of a musculoskeletal model document.
//!
//! These types mirror the `OpenSimDocument/Model` schema closely enough to
//! enumerate state names, compute static force geometry and drive the
//! reference kinematic engine. Everything else in the document is skipped.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Force elements whose type tag contains this substring are muscles.
pub const DEFAULT_MUSCLE_TAG: &str = "DeGroote";

/// Frame path of the inertial ground frame.
pub const GROUND_FRAME: &str = "/ground";

// ============================================================================
// Model
// ============================================================================

/// A parsed model descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model name.
    pub name: String,
    /// Rigid bodies in document order. Ground is implicit.
    pub bodies: Vec<BodyDescriptor>,
    /// Joints in document order.
    pub joints: Vec<JointDescriptor>,
    /// Force elements in document order.
    pub forces: Vec<ForceElement>,
}

impl ModelDescriptor {
    /// Create an empty descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a body.
    #[must_use]
    pub fn with_body(mut self, body: BodyDescriptor) -> Self {
        self.bodies.push(body);
        self
    }

    /// Add a joint.
    #[must_use]
    pub fn with_joint(mut self, joint: JointDescriptor) -> Self {
        self.joints.push(joint);
        self
    }

    /// Add a force element.
    #[must_use]
    pub fn with_force(mut self, force: ForceElement) -> Self {
        self.forces.push(force);
        self
    }

    /// Look up a body by name.
    #[must_use]
    pub fn body(&self, name: &str) -> Option<&BodyDescriptor> {
        self.bodies.iter().find(|b| b.name == name)
    }

    /// Look up a joint by name.
    #[must_use]
    pub fn joint(&self, name: &str) -> Option<&JointDescriptor> {
        self.joints.iter().find(|j| j.name == name)
    }

    /// Look up a force element by name.
    #[must_use]
    pub fn force(&self, name: &str) -> Option<&ForceElement> {
        self.forces.iter().find(|f| f.name == name)
    }

    /// Joints with at least one degree of freedom, in document order.
    pub fn movable_joints(&self) -> impl Iterator<Item = &JointDescriptor> {
        self.joints.iter().filter(|j| !j.kind.is_welded())
    }

    /// `(joint, coordinate)` pairs of every movable joint, in document order.
    pub fn coordinates(&self) -> impl Iterator<Item = (&JointDescriptor, &CoordinateDescriptor)> {
        self.movable_joints()
            .flat_map(|j| j.coordinates.iter().map(move |c| (j, c)))
    }

    /// Look up a coordinate of a movable joint by name.
    #[must_use]
    pub fn coordinate(&self, name: &str) -> Option<&CoordinateDescriptor> {
        self.coordinates().map(|(_, c)| c).find(|c| c.name == name)
    }

    /// Force elements whose type tag contains `muscle_tag`, in document order.
    pub fn muscles<'a>(&'a self, muscle_tag: &'a str) -> impl Iterator<Item = &'a ForceElement> {
        self.forces.iter().filter(move |f| f.is_muscle(muscle_tag))
    }
}

// ============================================================================
// Bodies and frames
// ============================================================================

/// A rigid body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDescriptor {
    /// Body name.
    pub name: String,
    /// Mass in kilograms.
    pub mass: f64,
}

impl BodyDescriptor {
    /// Create a body.
    pub fn new(name: impl Into<String>, mass: f64) -> Self {
        Self {
            name: name.into(),
            mass,
        }
    }
}

/// A frame rigidly offset from a parent frame.
///
/// `orientation` holds body-fixed X-Y-Z rotation angles in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetFrame {
    /// Frame name, unique within its joint.
    pub name: String,
    /// Parent frame path (`/bodyset/<body>`, `/ground`, ...).
    pub parent: String,
    /// Translation of the frame origin in the parent frame.
    pub translation: Vector3<f64>,
    /// Body-fixed X-Y-Z rotation angles.
    pub orientation: Vector3<f64>,
}

impl OffsetFrame {
    /// Create an offset frame with identity transform.
    pub fn new(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: parent.into(),
            translation: Vector3::zeros(),
            orientation: Vector3::zeros(),
        }
    }

    /// Set the translation.
    #[must_use]
    pub fn with_translation(mut self, translation: Vector3<f64>) -> Self {
        self.translation = translation;
        self
    }

    /// Set the orientation.
    #[must_use]
    pub fn with_orientation(mut self, orientation: Vector3<f64>) -> Self {
        self.orientation = orientation;
        self
    }
}

// ============================================================================
// Joints
// ============================================================================

/// Kind of joint, from its element tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JointKind {
    /// Rotation about the joint frame Z axis.
    Pin,
    /// Translation along the joint frame X axis.
    Slider,
    /// Rigid connection, zero degrees of freedom.
    Weld,
    /// Up to three rotations and three translations.
    Custom,
    /// Any other joint tag. Coordinates are enumerated but not driven.
    Other(String),
}

impl JointKind {
    /// Classify an element tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "PinJoint" => Self::Pin,
            "SliderJoint" => Self::Slider,
            "WeldJoint" => Self::Weld,
            "CustomJoint" => Self::Custom,
            other => Self::Other(other.to_string()),
        }
    }

    /// The element tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Pin => "PinJoint",
            Self::Slider => "SliderJoint",
            Self::Weld => "WeldJoint",
            Self::Custom => "CustomJoint",
            Self::Other(tag) => tag,
        }
    }

    /// Whether the joint is rigidly welded.
    #[must_use]
    pub fn is_welded(&self) -> bool {
        matches!(self, Self::Weld)
    }
}

/// Physical quantity a coordinate represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionType {
    /// Angle.
    Rotational,
    /// Length.
    Translational,
    /// Drives both rotations and translations.
    Coupled,
}

/// A generalized coordinate of a joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateDescriptor {
    /// Coordinate name.
    pub name: String,
    /// Rotational or translational.
    pub motion_type: MotionType,
    /// Initial value.
    pub default_value: f64,
}

impl CoordinateDescriptor {
    /// Create a rotational coordinate with zero default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            motion_type: MotionType::Rotational,
            default_value: 0.0,
        }
    }

    /// Set the motion type.
    #[must_use]
    pub fn with_motion_type(mut self, motion_type: MotionType) -> Self {
        self.motion_type = motion_type;
        self
    }

    /// Set the default value.
    #[must_use]
    pub fn with_default(mut self, value: f64) -> Self {
        self.default_value = value;
        self
    }
}

/// Function mapping coordinate values onto a transform axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AxisFunction {
    /// `slope * q + intercept`.
    Linear {
        /// Slope.
        slope: f64,
        /// Intercept.
        intercept: f64,
    },
    /// Fixed value regardless of coordinates.
    Constant(f64),
    /// Any other function tag; evaluated as identity.
    Unsupported(String),
}

impl AxisFunction {
    /// Identity function.
    #[must_use]
    pub fn identity() -> Self {
        Self::Linear {
            slope: 1.0,
            intercept: 0.0,
        }
    }
}

/// One of the six axes of a custom joint's spatial transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformAxis {
    /// `rotation1`..`rotation3` or `translation1`..`translation3`.
    pub name: String,
    /// Coordinates driving the axis.
    pub coordinates: Vec<String>,
    /// Axis direction in the joint parent frame.
    pub axis: Vector3<f64>,
    /// Coordinate-to-axis function.
    pub function: AxisFunction,
}

impl TransformAxis {
    /// Whether this is a rotation axis.
    #[must_use]
    pub fn is_rotation(&self) -> bool {
        self.name.starts_with("rotation")
    }
}

/// A joint connecting a parent frame to a child frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDescriptor {
    /// Joint name.
    pub name: String,
    /// Joint kind.
    pub kind: JointKind,
    /// Parent frame reference.
    pub parent_frame: String,
    /// Child frame reference.
    pub child_frame: String,
    /// Coordinates in document order.
    pub coordinates: Vec<CoordinateDescriptor>,
    /// Offset frames owned by the joint.
    pub frames: Vec<OffsetFrame>,
    /// Spatial transform axes of a custom joint.
    pub transform_axes: Vec<TransformAxis>,
}

impl JointDescriptor {
    /// Create a joint without coordinates or frames.
    pub fn new(
        name: impl Into<String>,
        kind: JointKind,
        parent_frame: impl Into<String>,
        child_frame: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            parent_frame: parent_frame.into(),
            child_frame: child_frame.into(),
            coordinates: Vec::new(),
            frames: Vec::new(),
            transform_axes: Vec::new(),
        }
    }

    /// Add a coordinate.
    #[must_use]
    pub fn with_coordinate(mut self, coordinate: CoordinateDescriptor) -> Self {
        self.coordinates.push(coordinate);
        self
    }

    /// Add an offset frame.
    #[must_use]
    pub fn with_frame(mut self, frame: OffsetFrame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Add a spatial transform axis.
    #[must_use]
    pub fn with_transform_axis(mut self, axis: TransformAxis) -> Self {
        self.transform_axes.push(axis);
        self
    }

    /// Look up an owned offset frame.
    #[must_use]
    pub fn frame(&self, name: &str) -> Option<&OffsetFrame> {
        self.frames.iter().find(|f| f.name == name)
    }
}

// ============================================================================
// Forces
// ============================================================================

/// A point along a force element's routed path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPointDescriptor {
    /// Point name.
    pub name: String,
    /// Frame the location is expressed in.
    pub frame: String,
    /// Location in that frame.
    pub location: Vector3<f64>,
}

impl PathPointDescriptor {
    /// Create a path point.
    pub fn new(name: impl Into<String>, frame: impl Into<String>, location: Vector3<f64>) -> Self {
        Self {
            name: name.into(),
            frame: frame.into(),
            location,
        }
    }
}

/// A force-producing element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceElement {
    /// Element name.
    pub name: String,
    /// Element tag, e.g. `DeGrooteFregly2016Muscle`.
    pub tag: String,
    /// Path points in routing order.
    pub path_points: Vec<PathPointDescriptor>,
}

impl ForceElement {
    /// Create a force element without a path.
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            path_points: Vec::new(),
        }
    }

    /// Append a path point.
    #[must_use]
    pub fn with_path_point(mut self, point: PathPointDescriptor) -> Self {
        self.path_points.push(point);
        self
    }

    /// Whether the tag contains `muscle_tag`.
    #[must_use]
    pub fn is_muscle(&self, muscle_tag: &str) -> bool {
        self.tag.contains(muscle_tag)
    }

    /// The second-to-last and last path points.
    #[must_use]
    pub fn terminal_segment(&self) -> Option<(&PathPointDescriptor, &PathPointDescriptor)> {
        match self.path_points.as_slice() {
            [.., previous, terminal] => Some((previous, terminal)),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn joint_kind_round_trips_tags() {
        for tag in ["PinJoint", "SliderJoint", "WeldJoint", "CustomJoint", "BallJoint"] {
            assert_eq!(JointKind::from_tag(tag).tag(), tag);
        }
        assert!(JointKind::from_tag("WeldJoint").is_welded());
        assert!(!JointKind::from_tag("BallJoint").is_welded());
    }

    #[test]
    fn coordinates_skip_welded_joints() {
        let model = ModelDescriptor::new("m")
            .with_joint(
                JointDescriptor::new("fixed", JointKind::Weld, "/ground", "pelvis")
                    .with_coordinate(CoordinateDescriptor::new("ghost")),
            )
            .with_joint(
                JointDescriptor::new("knee", JointKind::Pin, "femur", "tibia")
                    .with_coordinate(CoordinateDescriptor::new("knee_flexion")),
            );
        let names: Vec<&str> = model.coordinates().map(|(_, c)| c.name.as_str()).collect();
        assert_eq!(names, vec!["knee_flexion"]);
        assert!(model.coordinate("ghost").is_none());
    }

    #[test]
    fn terminal_segment_needs_two_points() {
        let single = ForceElement::new("m", "DeGrooteFregly2016Muscle").with_path_point(
            PathPointDescriptor::new("p1", "/bodyset/femur", Vector3::zeros()),
        );
        assert!(single.terminal_segment().is_none());

        let pair = single.with_path_point(PathPointDescriptor::new(
            "p2",
            "/bodyset/tibia",
            Vector3::x(),
        ));
        let (previous, terminal) = pair.terminal_segment().unwrap();
        assert_eq!(previous.name, "p1");
        assert_eq!(terminal.name, "p2");
    }

    #[test]
    fn muscle_tag_is_substring_match() {
        let model = ModelDescriptor::new("m")
            .with_force(ForceElement::new("a", "DeGrooteFregly2016Muscle"))
            .with_force(ForceElement::new("b", "Millard2012EquilibriumMuscle"))
            .with_force(ForceElement::new("c", "DeGrooteFregly2016Muscle"));
        let names: Vec<&str> = model
            .muscles(DEFAULT_MUSCLE_TAG)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }
}
