//! Kinematic engines for musculoskeletal models.
//!
//! The force-vector extractor drives an engine through the [`Engine`]
//! trait: assign coordinate values, realize geometry, then query path points
//! and re-express them across frames. [`KinematicEngine`] is the reference
//! implementation, posing a [`msk_osim::ModelDescriptor`] by forward
//! kinematics over its joint tree.
//!
//! # Example
//!
//! ```no_run
//! use msk_engine::{Engine, KinematicEngine};
//! use std::path::Path;
//!
//! let engine = KinematicEngine::new();
//! let model = engine.load_model(Path::new("leg.osim")).unwrap();
//! let mut state = engine.init_state(&model).unwrap();
//! engine.set_coordinate_value(&model, &mut state, "knee_flexion", 0.4).unwrap();
//! engine.realize_geometry(&model, &mut state).unwrap();
//! for name in engine.muscle_names(&model) {
//!     let points = engine.path_points(&model, &state, &name).unwrap();
//!     println!("{name}: {} points", points.len());
//! }
//! ```
//!
//! # Angle Units
//!
//! An engine declares the unit it expects rotational values in through
//! [`Engine::angle_unit`]. Callers convert before assigning.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod engine;
mod error;
mod kinematic;
mod pose;

pub use engine::{Engine, PathPointRef};
pub use error::{EngineError, Result};
pub use kinematic::{FrameRef, KinematicEngine, KinematicModel, KinematicState};
pub use msk_table::AngleUnit;
pub use pose::Pose;
