//! Forward kinematics of a model loaded from disk.
//!
//! To run: cargo test -p msk-engine --test leg_kinematics

#![allow(clippy::unwrap_used, clippy::expect_used)]

use approx::assert_relative_eq;
use msk_engine::{AngleUnit, Engine, EngineError, KinematicEngine};
use nalgebra::Point3;
use proptest::prelude::*;
use tempfile::tempdir;

const LEG: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<OpenSimDocument Version="40000">
  <Model name="leg">
    <BodySet name="bodyset">
      <objects>
        <Body name="femur"><mass>0.3</mass></Body>
        <Body name="tibia"><mass>0.2</mass></Body>
      </objects>
    </BodySet>
    <JointSet name="jointset">
      <objects>
        <PinJoint name="hip">
          <socket_parent_frame>/ground</socket_parent_frame>
          <socket_child_frame>/bodyset/femur</socket_child_frame>
          <coordinates><Coordinate name="hip_flexion"><default_value>0</default_value></Coordinate></coordinates>
        </PinJoint>
        <PinJoint name="knee">
          <socket_parent_frame>femur_offset</socket_parent_frame>
          <socket_child_frame>/bodyset/tibia</socket_child_frame>
          <coordinates><Coordinate name="knee_flexion"/></coordinates>
          <frames>
            <PhysicalOffsetFrame name="femur_offset">
              <socket_parent>/bodyset/femur</socket_parent>
              <translation>0 -0.4 0</translation>
            </PhysicalOffsetFrame>
          </frames>
        </PinJoint>
      </objects>
    </JointSet>
    <ForceSet name="forceset">
      <objects>
        <DeGrooteFregly2016Muscle name="vasti">
          <GeometryPath><PathPointSet><objects>
            <PathPoint name="vasti-P1"><socket_parent_frame>/bodyset/femur</socket_parent_frame><location>0.03 -0.2 0</location></PathPoint>
            <PathPoint name="vasti-P2"><socket_parent_frame>/bodyset/femur</socket_parent_frame><location>0.04 -0.38 0</location></PathPoint>
            <PathPoint name="vasti-P3"><socket_parent_frame>/bodyset/tibia</socket_parent_frame><location>0.04 -0.05 0</location></PathPoint>
          </objects></PathPointSet></GeometryPath>
        </DeGrooteFregly2016Muscle>
      </objects>
    </ForceSet>
  </Model>
</OpenSimDocument>
"#;

fn engine_with_leg(unit: AngleUnit) -> (KinematicEngine, msk_engine::KinematicModel) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("leg.osim");
    std::fs::write(&path, LEG).unwrap();
    let engine = KinematicEngine::new().with_angle_unit(unit);
    let model = engine.load_model(&path).unwrap();
    (engine, model)
}

#[test]
fn loads_coordinates_and_muscles() {
    let (engine, model) = engine_with_leg(AngleUnit::Radians);
    assert_eq!(engine.coordinate_names(&model), vec!["hip_flexion", "knee_flexion"]);
    assert_eq!(engine.muscle_names(&model), vec!["vasti"]);
}

#[test]
fn missing_file_is_a_model_error() {
    let engine = KinematicEngine::new();
    let err = engine
        .load_model(std::path::Path::new("/nonexistent/leg.osim"))
        .unwrap_err();
    assert!(matches!(err, EngineError::Model(_)));
}

#[test]
fn knee_flexion_moves_only_the_tibia_point() {
    let (engine, model) = engine_with_leg(AngleUnit::Degrees);
    let mut state = engine.init_state(&model).unwrap();
    engine.realize_geometry(&model, &mut state).unwrap();
    let points = engine.path_points(&model, &state, "vasti").unwrap();
    let straight: Vec<Point3<f64>> = points
        .iter()
        .map(|p| engine.point_in_ground(&model, &state, &p.frame, &p.location).unwrap())
        .collect();

    engine
        .set_coordinate_value(&model, &mut state, "knee_flexion", 90.0)
        .unwrap();
    engine.realize_geometry(&model, &mut state).unwrap();
    let bent: Vec<Point3<f64>> = points
        .iter()
        .map(|p| engine.point_in_ground(&model, &state, &p.frame, &p.location).unwrap())
        .collect();

    assert_relative_eq!(straight[0], bent[0], epsilon = 1e-12);
    assert_relative_eq!(straight[1], bent[1], epsilon = 1e-12);
    // Knee at (0, -0.4); (0.04, -0.05) rotated 90 degrees is (0.05, 0.04).
    assert_relative_eq!(bent[2], Point3::new(0.05, -0.36, 0.0), epsilon = 1e-12);
}

proptest! {
    #[test]
    fn points_on_one_body_keep_their_distance(hip in -3.0f64..3.0, knee in -3.0f64..3.0) {
        let (engine, model) = engine_with_leg(AngleUnit::Radians);
        let mut state = engine.init_state(&model).unwrap();
        engine.set_coordinate_value(&model, &mut state, "hip_flexion", hip).unwrap();
        engine.set_coordinate_value(&model, &mut state, "knee_flexion", knee).unwrap();
        engine.realize_geometry(&model, &mut state).unwrap();

        let points = engine.path_points(&model, &state, "vasti").unwrap();
        let a = engine.point_in_ground(&model, &state, &points[0].frame, &points[0].location).unwrap();
        let b = engine.point_in_ground(&model, &state, &points[1].frame, &points[1].location).unwrap();
        let local = (points[1].location - points[0].location).norm();
        prop_assert!(((b - a).norm() - local).abs() < 1e-12);
    }
}
