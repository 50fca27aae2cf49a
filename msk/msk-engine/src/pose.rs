//! Rigid transforms between frames.

use nalgebra::{Isometry3, Point3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Position and orientation of a frame relative to another.
///
/// `transform_point` maps coordinates expressed in this frame into the
/// reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Frame origin in the reference frame.
    pub position: Point3<f64>,
    /// Frame orientation in the reference frame.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Identity pose.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Pure translation.
    #[must_use]
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            position: Point3::from(translation),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Pure rotation of `angle` radians about `axis`.
    ///
    /// A zero axis yields the identity.
    #[must_use]
    pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64) -> Self {
        let rotation = Unit::try_new(*axis, f64::EPSILON)
            .map_or_else(UnitQuaternion::identity, |axis| {
                UnitQuaternion::from_axis_angle(&axis, angle)
            });
        Self {
            position: Point3::origin(),
            rotation,
        }
    }

    /// Offset frame from a translation and body-fixed X-Y-Z angles.
    #[must_use]
    pub fn from_offset(translation: Vector3<f64>, xyz: Vector3<f64>) -> Self {
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), xyz.x)
            * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), xyz.y)
            * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), xyz.z);
        Self {
            position: Point3::from(translation),
            rotation,
        }
    }

    /// Convert to an isometry.
    #[must_use]
    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(self.position.coords.into(), self.rotation)
    }

    /// Create a pose from an isometry.
    #[must_use]
    pub fn from_isometry(iso: Isometry3<f64>) -> Self {
        Self {
            position: Point3::from(iso.translation.vector),
            rotation: iso.rotation,
        }
    }

    /// `self * child`: the pose of `child`'s frame in `self`'s reference.
    #[must_use]
    pub fn compose(&self, child: &Self) -> Self {
        Self::from_isometry(self.to_isometry() * child.to_isometry())
    }

    /// Inverse transform.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self::from_isometry(self.to_isometry().inverse())
    }

    /// Transform a point from local to reference coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Transform a point from reference to local coordinates.
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation.inverse() * (world - self.position))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn axis_angle_rotates_point() {
        let pose = Pose::from_axis_angle(&Vector3::z(), FRAC_PI_2);
        let p = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn zero_axis_is_identity() {
        let pose = Pose::from_axis_angle(&Vector3::zeros(), 1.0);
        assert_eq!(pose, Pose::identity());
    }

    #[test]
    fn offset_applies_x_then_y_then_z_body_fixed() {
        let pose = Pose::from_offset(Vector3::zeros(), Vector3::new(FRAC_PI_2, 0.0, FRAC_PI_2));
        // Rx(90) * Rz(90) maps local +X to +Z.
        let p = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn compose_then_inverse_round_trips() {
        let a = Pose::from_offset(Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.1, 0.2, 0.3));
        let b = Pose::from_offset(Vector3::new(-0.5, 0.0, 0.25), Vector3::new(0.0, 0.4, 0.0));
        let local = Point3::new(0.3, -0.2, 0.9);
        let world = a.compose(&b).transform_point(&local);
        assert_relative_eq!(
            world,
            a.transform_point(&b.transform_point(&local)),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            a.compose(&b).inverse().transform_point(&world),
            local,
            epsilon = 1e-12
        );
        assert_relative_eq!(a.inverse_transform_point(&a.transform_point(&local)), local, epsilon = 1e-12);
    }
}
