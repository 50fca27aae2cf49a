//! Structural validation of model descriptors.
//!
//! Problems are collected rather than returned on first sight so that a
//! single pass reports everything wrong with a document.

use std::collections::HashSet;
use std::fmt;

use crate::types::{GROUND_FRAME, ModelDescriptor};

/// One structural problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// Two bodies share a name.
    DuplicateBody(String),
    /// Two joints share a name.
    DuplicateJoint(String),
    /// Two force elements share a name.
    DuplicateForce(String),
    /// Two coordinates share a name.
    DuplicateCoordinate(String),
    /// A frame reference does not resolve.
    UnknownFrame {
        /// Joint, frame or path point holding the reference.
        owner: String,
        /// The unresolved reference.
        frame: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateBody(name) => write!(f, "duplicate body name: {name}"),
            Self::DuplicateJoint(name) => write!(f, "duplicate joint name: {name}"),
            Self::DuplicateForce(name) => write!(f, "duplicate force name: {name}"),
            Self::DuplicateCoordinate(name) => write!(f, "duplicate coordinate name: {name}"),
            Self::UnknownFrame { owner, frame } => {
                write!(f, "{owner} references unknown frame `{frame}`")
            }
        }
    }
}

/// Result of [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Problems in document order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Whether no problem was found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Whether `frame` names ground, a body or a joint offset frame.
///
/// Accepted spellings: `/ground`, `ground`, `/bodyset/<body>`, `<body>`,
/// `<offset>` and `/jointset/<joint>/<offset>`.
#[must_use]
pub fn frame_exists(model: &ModelDescriptor, frame: &str) -> bool {
    if frame == GROUND_FRAME || frame == "ground" {
        return true;
    }
    if let Some(body) = frame.strip_prefix("/bodyset/") {
        return model.body(body).is_some();
    }
    if let Some(rest) = frame.strip_prefix("/jointset/") {
        return rest
            .split_once('/')
            .and_then(|(joint, offset)| model.joint(joint)?.frame(offset))
            .is_some();
    }
    model.body(frame).is_some() || model.joints.iter().any(|j| j.frame(frame).is_some())
}

/// Check a descriptor for duplicate names and unresolved frame references.
#[must_use]
pub fn validate(model: &ModelDescriptor) -> ValidationReport {
    let mut issues = Vec::new();

    let mut seen = HashSet::new();
    for body in &model.bodies {
        if !seen.insert(body.name.as_str()) {
            issues.push(ValidationIssue::DuplicateBody(body.name.clone()));
        }
    }
    let mut seen = HashSet::new();
    for joint in &model.joints {
        if !seen.insert(joint.name.as_str()) {
            issues.push(ValidationIssue::DuplicateJoint(joint.name.clone()));
        }
    }
    let mut seen = HashSet::new();
    for (_, coordinate) in model.coordinates() {
        if !seen.insert(coordinate.name.as_str()) {
            issues.push(ValidationIssue::DuplicateCoordinate(coordinate.name.clone()));
        }
    }
    let mut seen = HashSet::new();
    for force in &model.forces {
        if !seen.insert(force.name.as_str()) {
            issues.push(ValidationIssue::DuplicateForce(force.name.clone()));
        }
    }

    let mut check = |owner: String, frame: &str| {
        if !frame_exists(model, frame) {
            issues.push(ValidationIssue::UnknownFrame {
                owner,
                frame: frame.to_string(),
            });
        }
    };
    for joint in &model.joints {
        check(format!("joint '{}'", joint.name), &joint.parent_frame);
        check(format!("joint '{}'", joint.name), &joint.child_frame);
        for frame in &joint.frames {
            check(format!("frame '{}'", frame.name), &frame.parent);
        }
    }
    for force in &model.forces {
        for point in &force.path_points {
            check(format!("path point '{}' of '{}'", point.name, force.name), &point.frame);
        }
    }

    ValidationReport { issues }
}
