//! The capability interface an extraction run drives.

use std::fmt;
use std::path::Path;

use msk_osim::MotionType;
use msk_table::AngleUnit;
use nalgebra::Point3;

use crate::error::Result;

/// One point along a force element's path in the current configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPointRef<F> {
    /// Point name.
    pub name: String,
    /// Frame the point is attached to.
    pub frame: F,
    /// Location in that frame.
    pub location: Point3<f64>,
}

/// A multibody engine able to pose a model and resolve points across frames.
///
/// Engines own no run state: the model and the mutable state are separate
/// values passed into every call. Values given to
/// [`set_coordinate_value`](Self::set_coordinate_value) for rotational
/// coordinates are in [`angle_unit`](Self::angle_unit).
///
/// Every geometric query requires [`realize_geometry`](Self::realize_geometry)
/// to have run since the last coordinate change.
pub trait Engine {
    /// Loaded model.
    type Model;
    /// Mutable simulation state.
    type State;
    /// Frame handle returned with path points.
    type Frame: Clone + fmt::Debug;

    /// Load a model from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the model is invalid.
    fn load_model(&self, path: &Path) -> Result<Self::Model>;

    /// Create a state at the model's default coordinate values.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot initialize the model.
    fn init_state(&self, model: &Self::Model) -> Result<Self::State>;

    /// Unit of rotational coordinate values.
    fn angle_unit(&self) -> AngleUnit;

    /// Names of the model's movable coordinates.
    fn coordinate_names(&self, model: &Self::Model) -> Vec<String>;

    /// Motion type of a coordinate, if it exists.
    fn coordinate_motion(&self, model: &Self::Model, coordinate: &str) -> Option<MotionType>;

    /// Names of the recognized muscles, in model order.
    fn muscle_names(&self, model: &Self::Model) -> Vec<String>;

    /// Assign a coordinate value.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinate is unknown or the value rejected.
    fn set_coordinate_value(
        &self,
        model: &Self::Model,
        state: &mut Self::State,
        coordinate: &str,
        value: f64,
    ) -> Result<()>;

    /// Recompute frame poses for the current coordinate values.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be posed.
    fn realize_geometry(&self, model: &Self::Model, state: &mut Self::State) -> Result<()>;

    /// Ordered path points of a muscle in the current configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is unknown or geometry is stale.
    fn path_points(
        &self,
        model: &Self::Model,
        state: &Self::State,
        element: &str,
    ) -> Result<Vec<PathPointRef<Self::Frame>>>;

    /// Express a point given in `frame` in the ground frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be posed.
    fn point_in_ground(
        &self,
        model: &Self::Model,
        state: &Self::State,
        frame: &Self::Frame,
        point: &Point3<f64>,
    ) -> Result<Point3<f64>>;

    /// Express a point given in `from` in the frame `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if either frame cannot be posed.
    fn point_in_frame(
        &self,
        model: &Self::Model,
        state: &Self::State,
        from: &Self::Frame,
        point: &Point3<f64>,
        to: &Self::Frame,
    ) -> Result<Point3<f64>>;
}
