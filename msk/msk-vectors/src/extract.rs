//! Replay of a state trajectory against a model.
//!
//! Each row of the trajectory is applied to one long-lived
//! [`SimulationContext`] through [`step`], in ascending time order:
//!
//! 1. assign every `/value` column to the coordinate named by its
//!    second-to-last path segment, converting rotational values to the
//!    engine's angle unit
//! 2. realize geometry
//! 3. for each muscle, resolve its last two path points in ground
//! 4. direction = `normalize(previous - terminal)`, anchor = terminal point
//!    expressed in the previous point's frame
//! 5. compare the anchor against the element's baseline
//!
//! A rejected engine call aborts the run.

use std::path::{Path, PathBuf};

use msk_engine::{Engine, EngineError};
use msk_osim::{LineOfAction, MotionType};
use msk_table::{AngleUnit, Header, StateTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, Result};
use crate::events::ExtractionEvent;
use crate::series::ForceVectorSeries;

/// One muscle at one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSample {
    /// Muscle name.
    pub element: String,
    /// Terminal point in the frame of the previous path point.
    pub anchor: [f64; 3],
    /// Direction from the terminal point towards the previous one, in ground.
    pub line_of_action: LineOfAction,
}

/// Everything produced by one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSample {
    /// Row index.
    pub time_index: usize,
    /// Row time.
    pub time: f64,
    /// Muscles in model order.
    pub elements: Vec<ElementSample>,
    /// Events raised at this row.
    pub events: Vec<ExtractionEvent>,
}

#[derive(Debug, Clone)]
struct CoordinateBinding {
    column: usize,
    coordinate: String,
    rotational: bool,
}

/// The mutable engine state threaded through a run.
///
/// Created once per run and bound to the columns of one table. Never cloned
/// or shared between steps.
pub struct SimulationContext<'e, E: Engine> {
    engine: &'e E,
    model: E::Model,
    state: E::State,
    model_path: PathBuf,
    bindings: Vec<CoordinateBinding>,
    table_unit: AngleUnit,
    muscles: Vec<String>,
    baselines: Vec<Option<[f64; 3]>>,
    drift_tolerance: f64,
}

impl<'e, E: Engine> SimulationContext<'e, E> {
    /// Initialize a state for `model` and bind it to the columns of `table`.
    ///
    /// Muscles with fewer than two path points in the default configuration
    /// are left out of the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot initialize or pose the model.
    pub fn new(
        engine: &'e E,
        model: E::Model,
        model_path: impl Into<PathBuf>,
        table: &StateTable,
        header: &Header,
        config: &ExtractionConfig,
    ) -> Result<Self> {
        let model_path = model_path.into();
        let fail = |source: EngineError| ExtractError::engine(&model_path, None, None, source);

        let mut state = engine.init_state(&model).map_err(fail)?;
        let bindings = bind_coordinates(engine, &model, table);

        engine.realize_geometry(&model, &mut state).map_err(fail)?;
        let mut muscles = Vec::new();
        for name in engine.muscle_names(&model) {
            let points = engine
                .path_points(&model, &state, &name)
                .map_err(|e| ExtractError::engine(&model_path, Some(&name), None, e))?;
            if points.len() < 2 {
                warn!(element = %name, points = points.len(), "Muscle has no terminal segment, skipping");
                continue;
            }
            muscles.push(name);
        }

        let table_unit = config.table_unit(header);
        info!(
            model = %model_path.display(),
            coordinates = bindings.len(),
            muscles = muscles.len(),
            table_unit = %table_unit,
            engine_unit = %engine.angle_unit(),
            "Bound trajectory to model"
        );

        Ok(Self {
            engine,
            model,
            state,
            model_path,
            bindings,
            table_unit,
            baselines: vec![None; muscles.len()],
            muscles,
            drift_tolerance: config.drift_tolerance,
        })
    }

    /// Muscles evaluated at every step, in model order.
    #[must_use]
    pub fn muscles(&self) -> &[String] {
        &self.muscles
    }

    /// Coordinates assigned from the table, in column order.
    pub fn bound_coordinates(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.coordinate.as_str())
    }

    /// Current anchor baseline of a muscle.
    #[must_use]
    pub fn baseline(&self, element: &str) -> Option<[f64; 3]> {
        let i = self.muscles.iter().position(|m| m == element)?;
        self.baselines[i]
    }

    /// Model path used in error reports.
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn engine_error(&self, element: Option<&str>, time_index: usize, source: EngineError) -> ExtractError {
        ExtractError::engine(&self.model_path, element, Some(time_index), source)
    }
}

fn bind_coordinates<E: Engine>(engine: &E, model: &E::Model, table: &StateTable) -> Vec<CoordinateBinding> {
    let coordinates = engine.coordinate_names(model);
    let mut bindings = Vec::new();
    for (column, name) in table.column_names().iter().enumerate() {
        if !name.contains("/value") {
            continue;
        }
        let Some(coordinate) = name.split('/').rev().nth(1) else {
            continue;
        };
        if !coordinates.iter().any(|c| c == coordinate) {
            debug!(column = %name, "No model coordinate for column");
            continue;
        }
        bindings.push(CoordinateBinding {
            column,
            coordinate: coordinate.to_string(),
            rotational: engine.coordinate_motion(model, coordinate) == Some(MotionType::Rotational),
        });
    }
    bindings
}

fn exceeds(previous: &[f64; 3], current: &[f64; 3], tolerance: f64) -> bool {
    previous
        .iter()
        .zip(current)
        .any(|(a, b)| (a - b).abs() > tolerance)
}

/// Apply row `time_index` of `table` to the context and sample every muscle.
///
/// Mutates the context (coordinate values, realized geometry and anchor
/// baselines) and returns the row's sample. `table` must be the table the
/// context was bound to.
///
/// # Errors
///
/// Returns an error if the row does not exist, the engine rejects any call
/// or a muscle path is too short.
pub fn step<E: Engine>(
    context: &mut SimulationContext<'_, E>,
    table: &StateTable,
    time_index: usize,
) -> Result<StepSample> {
    let time = *table
        .time()
        .get(time_index)
        .ok_or(ExtractError::RowOutOfRange {
            time_index,
            rows: table.row_count(),
        })?;
    let engine = context.engine;
    let engine_unit = engine.angle_unit();

    for binding in &context.bindings {
        let Some(&value) = table
            .column_at(binding.column)
            .and_then(|c| c.get(time_index))
        else {
            continue;
        };
        let value = if binding.rotational {
            context.table_unit.convert(value, engine_unit)
        } else {
            value
        };
        engine
            .set_coordinate_value(&context.model, &mut context.state, &binding.coordinate, value)
            .map_err(|e| ExtractError::engine(&context.model_path, None, Some(time_index), e))?;
    }
    engine
        .realize_geometry(&context.model, &mut context.state)
        .map_err(|e| context.engine_error(None, time_index, e))?;

    let mut elements = Vec::with_capacity(context.muscles.len());
    let mut events = Vec::new();
    for (i, name) in context.muscles.iter().enumerate() {
        let fail = |e| ExtractError::engine(&context.model_path, Some(name), Some(time_index), e);
        let points = engine
            .path_points(&context.model, &context.state, name)
            .map_err(fail)?;
        let [.., previous, terminal] = points.as_slice() else {
            return Err(ExtractError::PathTooShort {
                element: name.clone(),
                points: points.len(),
                time_index,
            });
        };

        let terminal_ground = engine
            .point_in_ground(&context.model, &context.state, &terminal.frame, &terminal.location)
            .map_err(fail)?;
        let previous_ground = engine
            .point_in_ground(&context.model, &context.state, &previous.frame, &previous.location)
            .map_err(fail)?;
        let line_of_action = LineOfAction::between(&terminal_ground.coords, &previous_ground.coords);
        if let LineOfAction::Degenerate { length } = line_of_action {
            events.push(ExtractionEvent::DegenerateGeometry {
                element: name.clone(),
                time_index,
                time,
                length,
            });
        }

        let anchor = engine
            .point_in_frame(
                &context.model,
                &context.state,
                &terminal.frame,
                &terminal.location,
                &previous.frame,
            )
            .map_err(fail)?;
        let anchor = [anchor.x, anchor.y, anchor.z];
        match context.baselines[i] {
            None => context.baselines[i] = Some(anchor),
            Some(previous) if exceeds(&previous, &anchor, context.drift_tolerance) => {
                events.push(ExtractionEvent::OriginDrift {
                    element: name.clone(),
                    time_index,
                    time,
                    previous,
                    current: anchor,
                });
                context.baselines[i] = Some(anchor);
            }
            Some(_) => {}
        }

        elements.push(ElementSample {
            element: name.clone(),
            anchor,
            line_of_action,
        });
    }

    for event in &events {
        event.log();
    }
    debug!(time_index, time, elements = elements.len(), "Extracted step");

    Ok(StepSample {
        time_index,
        time,
        elements,
        events,
    })
}

/// Replay every row of `table` in order.
///
/// # Errors
///
/// Returns the first error raised by [`step`].
pub fn run<E: Engine>(context: &mut SimulationContext<'_, E>, table: &StateTable) -> Result<ForceVectorSeries> {
    let mut series = ForceVectorSeries::new(context.muscles.clone());
    for time_index in 0..table.row_count() {
        series.push(step(context, table, time_index)?);
    }
    info!(
        rows = series.len(),
        muscles = series.element_names().len(),
        events = series.events().len(),
        "Extraction complete"
    );
    Ok(series)
}

/// Load the model at `model_path` and extract anchor and direction series
/// for every muscle over the whole trajectory.
///
/// # Errors
///
/// Returns an error if the model cannot be loaded or any step fails.
pub fn extract_force_vectors<E: Engine>(
    engine: &E,
    model_path: &Path,
    table: &StateTable,
    header: &Header,
    config: &ExtractionConfig,
) -> Result<ForceVectorSeries> {
    info!(model = %model_path.display(), rows = table.row_count(), "Extracting force vectors");
    let model = engine
        .load_model(model_path)
        .map_err(|e| ExtractError::engine(model_path, None, None, e))?;
    let mut context = SimulationContext::new(engine, model, model_path, table, header, config)?;
    run(&mut context, table)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use msk_engine::KinematicEngine;
    use msk_osim::{
        BodyDescriptor, CoordinateDescriptor, ForceElement, JointDescriptor, JointKind,
        ModelDescriptor, OffsetFrame, PathPointDescriptor,
    };
    use nalgebra::Vector3;
    use std::f64::consts::FRAC_PI_2;

    const MUSCLE: &str = "DeGrooteFregly2016Muscle";

    fn point(name: &str, body: &str, x: f64, y: f64) -> PathPointDescriptor {
        PathPointDescriptor::new(name, format!("/bodyset/{body}"), Vector3::new(x, y, 0.0))
    }

    /// Thigh hinged at ground, shank hinged 1 m below. `vasti` spans the
    /// knee, `rf` stays on the thigh, `flat` has coincident points.
    fn two_link() -> ModelDescriptor {
        ModelDescriptor::new("two_link")
            .with_body(BodyDescriptor::new("thigh", 1.0))
            .with_body(BodyDescriptor::new("shank", 1.0))
            .with_joint(
                JointDescriptor::new("hip", JointKind::Pin, "/ground", "/bodyset/thigh")
                    .with_coordinate(CoordinateDescriptor::new("hip_flexion")),
            )
            .with_joint(
                JointDescriptor::new("knee", JointKind::Pin, "thigh_offset", "/bodyset/shank")
                    .with_frame(
                        OffsetFrame::new("thigh_offset", "/bodyset/thigh")
                            .with_translation(Vector3::new(0.0, -1.0, 0.0)),
                    )
                    .with_coordinate(CoordinateDescriptor::new("knee_flexion")),
            )
            .with_force(
                ForceElement::new("vasti", MUSCLE)
                    .with_path_point(point("v1", "thigh", 0.1, -0.5))
                    .with_path_point(point("v2", "shank", 0.1, -0.2)),
            )
            .with_force(
                ForceElement::new("rf", MUSCLE)
                    .with_path_point(point("r1", "thigh", 0.0, -0.1))
                    .with_path_point(point("r2", "thigh", 0.0, -0.9)),
            )
            .with_force(
                ForceElement::new("flat", MUSCLE)
                    .with_path_point(point("f1", "thigh", 0.2, -0.3))
                    .with_path_point(point("f2", "thigh", 0.2, -0.3)),
            )
            .with_force(ForceElement::new("stub", MUSCLE).with_path_point(point("s1", "thigh", 0.0, 0.0)))
    }

    fn knee_table(knee: Vec<f64>) -> StateTable {
        let n = knee.len();
        #[allow(clippy::cast_precision_loss)]
        let mut table = StateTable::new((0..n).map(|i| i as f64 * 0.01).collect());
        table
            .push_column("/jointset/hip/hip_flexion/value", vec![0.0; n])
            .unwrap();
        table
            .push_column("/jointset/knee/knee_flexion/value", knee)
            .unwrap();
        table
            .push_column("/jointset/knee/knee_flexion/speed", vec![9.0; n])
            .unwrap();
        table
    }

    fn extract(engine: &KinematicEngine, table: &StateTable, header: &Header) -> Result<ForceVectorSeries> {
        let model = engine.prepare(two_link()).unwrap();
        let mut context =
            SimulationContext::new(engine, model, "two_link.osim", table, header, &ExtractionConfig::default())?;
        run(&mut context, table)
    }

    #[test]
    fn binds_value_columns_and_skips_stub_muscles() {
        let engine = KinematicEngine::new();
        let table = knee_table(vec![0.0]);
        let model = engine.prepare(two_link()).unwrap();
        let context = SimulationContext::new(
            &engine,
            model,
            "two_link.osim",
            &table,
            &Header::default(),
            &ExtractionConfig::default(),
        )
        .unwrap();
        assert_eq!(
            context.bound_coordinates().collect::<Vec<_>>(),
            vec!["hip_flexion", "knee_flexion"]
        );
        assert_eq!(context.muscles(), ["vasti", "rf", "flat"]);
    }

    #[test]
    fn direction_points_from_terminal_to_previous() {
        let engine = KinematicEngine::new();
        let series = extract(&engine, &knee_table(vec![0.0, FRAC_PI_2]), &Header::default()).unwrap();

        let directions = series.directions("vasti").unwrap();
        assert_relative_eq!(directions[0][1], 1.0, epsilon = 1e-12);
        let expected = Vector3::new(-0.1, 0.4, 0.0).normalize();
        assert_relative_eq!(Vector3::from(directions[1]), expected, epsilon = 1e-12);

        let anchors = series.anchors("vasti").unwrap();
        assert_relative_eq!(Vector3::from(anchors[0]), Vector3::new(0.1, -1.2, 0.0), epsilon = 1e-12);
        assert_relative_eq!(Vector3::from(anchors[1]), Vector3::new(0.2, -0.9, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn knee_motion_drifts_only_the_spanning_muscle() {
        let engine = KinematicEngine::new();
        let series = extract(&engine, &knee_table(vec![0.0, 0.3, 0.3, 0.6]), &Header::default()).unwrap();
        let drift: Vec<(&str, usize)> = series
            .events()
            .iter()
            .filter(|e| e.is_drift())
            .map(|e| (e.element(), e.time_index()))
            .collect();
        assert_eq!(drift, vec![("vasti", 1), ("vasti", 3)]);
    }

    #[test]
    fn coincident_points_yield_sentinel_and_event() {
        let engine = KinematicEngine::new();
        let series = extract(&engine, &knee_table(vec![0.0, 0.1]), &Header::default()).unwrap();
        assert!(series.directions("flat").unwrap().iter().all(|d| *d == [0.0; 3]));
        let degenerate = series
            .events()
            .iter()
            .filter(|e| matches!(e, ExtractionEvent::DegenerateGeometry { .. }))
            .count();
        assert_eq!(degenerate, 2);
        assert!(series.directions("rf").unwrap().iter().all(|d| d[1] > 0.99));
    }

    #[test]
    fn degree_tables_match_radian_tables() {
        let engine = KinematicEngine::new();
        let radians = extract(&engine, &knee_table(vec![0.0, 0.4]), &Header::default()).unwrap();
        let header = Header::new(["inDegrees=yes"]);
        let degrees = extract(&engine, &knee_table(vec![0.0, 0.4_f64.to_degrees()]), &header).unwrap();
        for (a, b) in radians
            .directions("vasti")
            .unwrap()
            .iter()
            .zip(degrees.directions("vasti").unwrap())
        {
            assert_relative_eq!(Vector3::from(*a), Vector3::from(*b), epsilon = 1e-12);
        }
    }

    #[test]
    fn degree_engine_receives_degrees() {
        let radian_engine = KinematicEngine::new();
        let degree_engine = KinematicEngine::new().with_angle_unit(AngleUnit::Degrees);
        let table = knee_table(vec![0.0, 0.4]);
        let a = extract(&radian_engine, &table, &Header::default()).unwrap();
        let b = extract(&degree_engine, &table, &Header::default()).unwrap();
        assert_eq!(a.anchors("vasti").unwrap().len(), 2);
        for (x, y) in a.anchors("vasti").unwrap().iter().zip(b.anchors("vasti").unwrap()) {
            assert_relative_eq!(Vector3::from(*x), Vector3::from(*y), epsilon = 1e-12);
        }
    }

    #[test]
    fn engine_rejection_aborts_with_row() {
        let engine = KinematicEngine::new();
        let table = knee_table(vec![0.0, f64::NAN, 0.2]);
        let err = extract(&engine, &table, &Header::default()).unwrap_err();
        match err {
            ExtractError::Engine {
                time_index, source, ..
            } => {
                assert_eq!(time_index, Some(1));
                assert!(matches!(source, EngineError::NonFiniteValue { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn step_mutates_context_baseline() {
        let engine = KinematicEngine::new();
        let table = knee_table(vec![0.0, 0.5]);
        let model = engine.prepare(two_link()).unwrap();
        let mut context = SimulationContext::new(
            &engine,
            model,
            "two_link.osim",
            &table,
            &Header::default(),
            &ExtractionConfig::default().with_drift_tolerance(10.0),
        )
        .unwrap();
        assert_eq!(context.baseline("vasti"), None);
        let first = step(&mut context, &table, 0).unwrap();
        assert_eq!(context.baseline("vasti"), Some(first.elements[0].anchor));
        let second = step(&mut context, &table, 1).unwrap();
        assert!(second.events.iter().all(|e| !e.is_drift()));
        assert_eq!(context.baseline("vasti"), Some(first.elements[0].anchor));
        assert!(matches!(
            step(&mut context, &table, 2),
            Err(ExtractError::RowOutOfRange { rows: 2, .. })
        ));
    }
}
