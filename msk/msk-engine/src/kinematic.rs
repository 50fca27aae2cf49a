//! Reference engine: forward kinematics over the model descriptor.
//!
//! Bodies are posed by walking the joint tree from ground:
//!
//! ```text
//! X_ground_child = X_ground_parentframe * J(q) * X_child_childframe^-1
//! ```
//!
//! where `J(q)` is the joint transform for the current coordinate values:
//!
//! | Joint         | `J(q)`                                              |
//! |---------------|-----------------------------------------------------|
//! | `PinJoint`    | rotation by `q` about Z                             |
//! | `SliderJoint` | translation by `q` along X                          |
//! | `WeldJoint`   | identity                                            |
//! | `CustomJoint` | translation of the summed translation axes, then rotations 1, 2, 3 |
//! | other         | identity                                            |
//!
//! Coordinate values are stored internally in radians and meters.

use std::path::Path;

use msk_osim::{
    AxisFunction, DEFAULT_MUSCLE_TAG, GROUND_FRAME, JointDescriptor, JointKind, ModelDescriptor,
    MotionType, load_osim_file,
};
use msk_table::AngleUnit;
use nalgebra::{Point3, Vector3};
use tracing::{debug, warn};

use crate::engine::{Engine, PathPointRef};
use crate::error::{EngineError, Result};
use crate::pose::Pose;

/// Offset frames may reference other offset frames up to this depth.
const MAX_FRAME_DEPTH: usize = 16;

/// A frame resolved to a body (or ground) plus a fixed offset.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRef {
    name: String,
    body: Option<usize>,
    offset: Pose,
}

impl FrameRef {
    /// The frame reference as written in the model.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the frame is fixed to ground.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.body.is_none()
    }

    /// Pose of the frame relative to its body.
    #[must_use]
    pub fn offset(&self) -> &Pose {
        &self.offset
    }
}

#[derive(Debug, Clone)]
struct CoordinateSlot {
    name: String,
    motion: MotionType,
    default_value: f64,
}

#[derive(Debug, Clone)]
struct AxisSlot {
    rotation: bool,
    axis: Vector3<f64>,
    coordinate: Option<usize>,
    function: AxisFunction,
}

impl AxisSlot {
    fn evaluate(&self, values: &[f64]) -> f64 {
        let q = self.coordinate.and_then(|i| values.get(i)).copied().unwrap_or(0.0);
        match &self.function {
            AxisFunction::Linear { slope, intercept } => slope * q + intercept,
            AxisFunction::Constant(value) => *value,
            AxisFunction::Unsupported(_) => q,
        }
    }
}

#[derive(Debug, Clone)]
struct JointSlot {
    name: String,
    kind: JointKind,
    parent: FrameRef,
    child: FrameRef,
    child_body: usize,
    coordinates: Vec<usize>,
    axes: Vec<AxisSlot>,
}

#[derive(Debug, Clone)]
struct MuscleSlot {
    name: String,
    points: Vec<PathPointRef<FrameRef>>,
}

/// A descriptor prepared for forward kinematics.
#[derive(Debug, Clone)]
pub struct KinematicModel {
    descriptor: ModelDescriptor,
    coordinates: Vec<CoordinateSlot>,
    joints: Vec<JointSlot>,
    muscles: Vec<MuscleSlot>,
}

impl KinematicModel {
    /// Prepare a descriptor, resolving every frame reference.
    ///
    /// # Errors
    ///
    /// Returns an error if a frame does not resolve, a transform axis names an
    /// unknown coordinate or a body has more than one parent joint.
    pub fn new(descriptor: ModelDescriptor, muscle_tag: &str) -> Result<Self> {
        let coordinates: Vec<CoordinateSlot> = descriptor
            .coordinates()
            .map(|(_, c)| CoordinateSlot {
                name: c.name.clone(),
                motion: c.motion_type,
                default_value: c.default_value,
            })
            .collect();
        let coordinate_index = |name: &str| coordinates.iter().position(|c| c.name == name);

        let mut slots = Vec::new();
        for joint in &descriptor.joints {
            let owner = format!("joint '{}'", joint.name);
            let parent = resolve_frame(&descriptor, &joint.parent_frame, Some(joint), &owner, 0)?;
            let child = resolve_frame(&descriptor, &joint.child_frame, Some(joint), &owner, 0)?;
            let child_body = child.body.ok_or_else(|| {
                EngineError::Rejected(format!("{owner} has ground as its child frame"))
            })?;

            let joint_coordinates = if joint.kind.is_welded() {
                Vec::new()
            } else {
                joint
                    .coordinates
                    .iter()
                    .filter_map(|c| coordinate_index(&c.name))
                    .collect()
            };

            let mut axes = Vec::new();
            for axis in &joint.transform_axes {
                let coordinate = match axis.coordinates.first() {
                    Some(name) => Some(
                        coordinate_index(name)
                            .ok_or_else(|| EngineError::UnknownCoordinate(name.clone()))?,
                    ),
                    None => None,
                };
                axes.push(AxisSlot {
                    rotation: axis.is_rotation(),
                    axis: axis.axis,
                    coordinate,
                    function: axis.function.clone(),
                });
            }

            slots.push(JointSlot {
                name: joint.name.clone(),
                kind: joint.kind.clone(),
                parent,
                child,
                child_body,
                coordinates: joint_coordinates,
                axes,
            });
        }
        let joints = order_from_ground(&descriptor, slots)?;

        let mut muscles = Vec::new();
        for force in descriptor.muscles(muscle_tag) {
            let mut points = Vec::with_capacity(force.path_points.len());
            for point in &force.path_points {
                let owner = format!("path point '{}' of '{}'", point.name, force.name);
                points.push(PathPointRef {
                    name: point.name.clone(),
                    frame: resolve_frame(&descriptor, &point.frame, None, &owner, 0)?,
                    location: Point3::from(point.location),
                });
            }
            muscles.push(MuscleSlot {
                name: force.name.clone(),
                points,
            });
        }

        debug!(
            model = %descriptor.name,
            coordinates = coordinates.len(),
            joints = joints.len(),
            muscles = muscles.len(),
            "Prepared kinematic model"
        );

        Ok(Self {
            descriptor,
            coordinates,
            joints,
            muscles,
        })
    }

    /// The underlying descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn coordinate_index(&self, name: &str) -> Option<usize> {
        self.coordinates.iter().position(|c| c.name == name)
    }

    fn joint_transform(&self, joint: &JointSlot, values: &[f64]) -> Pose {
        let first = joint
            .coordinates
            .first()
            .and_then(|i| values.get(*i))
            .copied()
            .unwrap_or(0.0);
        match joint.kind {
            JointKind::Pin => Pose::from_axis_angle(&Vector3::z(), first),
            JointKind::Slider => Pose::from_translation(Vector3::x() * first),
            JointKind::Custom => {
                let mut translation = Vector3::zeros();
                let mut rotation = Pose::identity();
                for axis in &joint.axes {
                    let value = axis.evaluate(values);
                    if axis.rotation {
                        rotation = rotation.compose(&Pose::from_axis_angle(&axis.axis, value));
                    } else {
                        translation += axis.axis * value;
                    }
                }
                Pose::from_translation(translation).compose(&rotation)
            }
            JointKind::Weld | JointKind::Other(_) => Pose::identity(),
        }
    }

    fn frame_pose(&self, frame: &FrameRef, state: &KinematicState) -> Result<Pose> {
        match frame.body {
            None => Ok(frame.offset),
            Some(body) => state
                .poses
                .get(body)
                .copied()
                .flatten()
                .map(|pose| pose.compose(&frame.offset))
                .ok_or_else(|| {
                    EngineError::UnreachableBody(
                        self.descriptor
                            .bodies
                            .get(body)
                            .map(|b| b.name.clone())
                            .unwrap_or_default(),
                    )
                }),
        }
    }

    /// Ground pose of a body in a realized state.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is unknown, unreachable or geometry is stale.
    pub fn body_pose(&self, state: &KinematicState, body: &str) -> Result<Pose> {
        if !state.realized {
            return Err(EngineError::NotRealized);
        }
        let index = self
            .descriptor
            .bodies
            .iter()
            .position(|b| b.name == body)
            .ok_or_else(|| EngineError::unknown_frame(body, "body pose query"))?;
        state
            .poses
            .get(index)
            .copied()
            .flatten()
            .ok_or_else(|| EngineError::UnreachableBody(body.to_string()))
    }
}

/// Resolve a frame reference to a body plus offset.
fn resolve_frame(
    model: &ModelDescriptor,
    frame: &str,
    owner_joint: Option<&JointDescriptor>,
    owner: &str,
    depth: usize,
) -> Result<FrameRef> {
    if depth > MAX_FRAME_DEPTH {
        return Err(EngineError::unknown_frame(frame, owner));
    }
    if frame == GROUND_FRAME || frame == "ground" {
        return Ok(FrameRef {
            name: frame.to_string(),
            body: None,
            offset: Pose::identity(),
        });
    }

    let body_index = |name: &str| model.bodies.iter().position(|b| b.name == name);
    let on_body = |index: usize| FrameRef {
        name: frame.to_string(),
        body: Some(index),
        offset: Pose::identity(),
    };

    if let Some(body) = frame.strip_prefix("/bodyset/") {
        return body_index(body)
            .map(on_body)
            .ok_or_else(|| EngineError::unknown_frame(frame, owner));
    }

    let offset = if let Some(rest) = frame.strip_prefix("/jointset/") {
        rest.split_once('/').and_then(|(joint, name)| {
            model.joint(joint).and_then(|j| j.frame(name).map(|f| (j, f)))
        })
    } else if let Some(index) = body_index(frame) {
        return Ok(on_body(index));
    } else {
        owner_joint
            .and_then(|j| j.frame(frame).map(|f| (j, f)))
            .or_else(|| {
                model
                    .joints
                    .iter()
                    .find_map(|j| j.frame(frame).map(|f| (j, f)))
            })
    };

    let (joint, offset) = offset.ok_or_else(|| EngineError::unknown_frame(frame, owner))?;
    let parent = resolve_frame(model, &offset.parent, Some(joint), owner, depth + 1)?;
    Ok(FrameRef {
        name: frame.to_string(),
        body: parent.body,
        offset: parent
            .offset
            .compose(&Pose::from_offset(offset.translation, offset.orientation)),
    })
}

/// Order joints so every parent frame is posed before its children.
fn order_from_ground(model: &ModelDescriptor, mut pending: Vec<JointSlot>) -> Result<Vec<JointSlot>> {
    let mut placed = vec![false; model.bodies.len()];
    let mut ordered = Vec::with_capacity(pending.len());

    loop {
        let before = pending.len();
        let mut rest = Vec::new();
        for slot in pending {
            if slot.parent.body.map_or(true, |b| placed[b]) {
                if placed[slot.child_body] {
                    return Err(EngineError::KinematicLoop(format!(
                        "body '{}' is the child of more than one joint (last: '{}')",
                        model.bodies[slot.child_body].name, slot.name
                    )));
                }
                placed[slot.child_body] = true;
                ordered.push(slot);
            } else {
                rest.push(slot);
            }
        }
        pending = rest;
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    for slot in &pending {
        warn!(joint = %slot.name, "Joint is not connected to ground, its child body cannot be posed");
    }
    Ok(ordered)
}

/// Mutable state of a [`KinematicModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicState {
    values: Vec<f64>,
    poses: Vec<Option<Pose>>,
    realized: bool,
}

impl KinematicState {
    /// Whether poses match the current coordinate values.
    #[must_use]
    pub fn is_realized(&self) -> bool {
        self.realized
    }

    /// Coordinate values in radians and meters, in model order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// The reference engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinematicEngine {
    angle_unit: AngleUnit,
    muscle_tag: String,
}

impl Default for KinematicEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl KinematicEngine {
    /// Engine taking radians and recognizing the default muscle tag.
    #[must_use]
    pub fn new() -> Self {
        Self {
            angle_unit: AngleUnit::Radians,
            muscle_tag: DEFAULT_MUSCLE_TAG.to_string(),
        }
    }

    /// Declare the unit rotational values are assigned in.
    #[must_use]
    pub fn with_angle_unit(mut self, unit: AngleUnit) -> Self {
        self.angle_unit = unit;
        self
    }

    /// Recognize muscles whose tag contains `tag`.
    #[must_use]
    pub fn with_muscle_tag(mut self, tag: impl Into<String>) -> Self {
        self.muscle_tag = tag.into();
        self
    }

    /// Prepare an already parsed descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor cannot be posed.
    pub fn prepare(&self, descriptor: ModelDescriptor) -> Result<KinematicModel> {
        KinematicModel::new(descriptor, &self.muscle_tag)
    }

    fn require_realized(state: &KinematicState) -> Result<()> {
        if state.realized {
            Ok(())
        } else {
            Err(EngineError::NotRealized)
        }
    }
}

impl Engine for KinematicEngine {
    type Model = KinematicModel;
    type State = KinematicState;
    type Frame = FrameRef;

    fn load_model(&self, path: &Path) -> Result<KinematicModel> {
        self.prepare(load_osim_file(path)?)
    }

    fn init_state(&self, model: &KinematicModel) -> Result<KinematicState> {
        Ok(KinematicState {
            values: model.coordinates.iter().map(|c| c.default_value).collect(),
            poses: vec![None; model.descriptor.bodies.len()],
            realized: false,
        })
    }

    fn angle_unit(&self) -> AngleUnit {
        self.angle_unit
    }

    fn coordinate_names(&self, model: &KinematicModel) -> Vec<String> {
        model.coordinates.iter().map(|c| c.name.clone()).collect()
    }

    fn coordinate_motion(&self, model: &KinematicModel, coordinate: &str) -> Option<MotionType> {
        model
            .coordinate_index(coordinate)
            .map(|i| model.coordinates[i].motion)
    }

    fn muscle_names(&self, model: &KinematicModel) -> Vec<String> {
        model.muscles.iter().map(|m| m.name.clone()).collect()
    }

    fn set_coordinate_value(
        &self,
        model: &KinematicModel,
        state: &mut KinematicState,
        coordinate: &str,
        value: f64,
    ) -> Result<()> {
        let index = model
            .coordinate_index(coordinate)
            .ok_or_else(|| EngineError::UnknownCoordinate(coordinate.to_string()))?;
        if !value.is_finite() {
            return Err(EngineError::NonFiniteValue {
                coordinate: coordinate.to_string(),
                value,
            });
        }
        let internal = match model.coordinates[index].motion {
            MotionType::Rotational => self.angle_unit.convert(value, AngleUnit::Radians),
            MotionType::Translational | MotionType::Coupled => value,
        };
        state.values[index] = internal;
        state.realized = false;
        Ok(())
    }

    fn realize_geometry(&self, model: &KinematicModel, state: &mut KinematicState) -> Result<()> {
        let mut poses: Vec<Option<Pose>> = vec![None; model.descriptor.bodies.len()];
        state.realized = false;

        for joint in &model.joints {
            let parent = match joint.parent.body {
                None => joint.parent.offset,
                Some(body) => poses[body]
                    .ok_or_else(|| EngineError::UnreachableBody(joint.parent.name.clone()))?
                    .compose(&joint.parent.offset),
            };
            let pose = parent
                .compose(&model.joint_transform(joint, &state.values))
                .compose(&joint.child.offset.inverse());
            poses[joint.child_body] = Some(pose);
        }

        state.poses = poses;
        state.realized = true;
        Ok(())
    }

    fn path_points(
        &self,
        model: &KinematicModel,
        state: &KinematicState,
        element: &str,
    ) -> Result<Vec<PathPointRef<FrameRef>>> {
        Self::require_realized(state)?;
        model
            .muscles
            .iter()
            .find(|m| m.name == element)
            .map(|m| m.points.clone())
            .ok_or_else(|| EngineError::UnknownElement(element.to_string()))
    }

    fn point_in_ground(
        &self,
        model: &KinematicModel,
        state: &KinematicState,
        frame: &FrameRef,
        point: &Point3<f64>,
    ) -> Result<Point3<f64>> {
        Self::require_realized(state)?;
        Ok(model.frame_pose(frame, state)?.transform_point(point))
    }

    fn point_in_frame(
        &self,
        model: &KinematicModel,
        state: &KinematicState,
        from: &FrameRef,
        point: &Point3<f64>,
        to: &FrameRef,
    ) -> Result<Point3<f64>> {
        Self::require_realized(state)?;
        let ground = model.frame_pose(from, state)?.transform_point(point);
        Ok(model.frame_pose(to, state)?.inverse_transform_point(&ground))
    }
}
