//! Force-vector extraction from a generated or solved trajectory.

use std::path::{Path, PathBuf};

use msk_table::read_table_with;
use msk_vectors::{ForceVectorSeries, extract_force_vectors, write_samples};
use tracing::info;

use crate::config::PipelineConfig;
use crate::discovery::find_file_in_dir;
use crate::error::{PipelineError, Result};

/// File name fragment of a solved trajectory when the input is a directory.
pub const TRAJECTORY_NEEDLE: &str = "success.sto";

/// Result of a successful extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// Trajectory that was replayed.
    pub trajectory: PathBuf,
    /// Extracted series, events included.
    pub series: ForceVectorSeries,
    /// Anchors file.
    pub origins: PathBuf,
    /// Directions file.
    pub vectors: PathBuf,
}

/// The trajectory file `input` designates.
///
/// A directory is searched for a single file containing
/// [`TRAJECTORY_NEEDLE`].
///
/// # Errors
///
/// Returns [`PipelineError::MissingInput`] if a directory holds no unique
/// trajectory.
pub fn resolve_trajectory(input: &Path) -> Result<PathBuf> {
    if !input.is_dir() {
        return Ok(input.to_path_buf());
    }
    find_file_in_dir(input, TRAJECTORY_NEEDLE).ok_or_else(|| PipelineError::MissingInput {
        dir: input.to_path_buf(),
        needle: TRAJECTORY_NEEDLE.to_string(),
    })
}

/// Replay the trajectory against the model and write both sample files to
/// the output directory.
///
/// # Errors
///
/// Returns [`PipelineError::MissingModelDependency`] without a model, and any
/// read, engine or write failure. A failed run leaves no valid output.
pub fn run_extraction(config: &PipelineConfig) -> Result<ExtractionOutcome> {
    config.validate()?;
    let model = config
        .model
        .as_deref()
        .ok_or_else(|| PipelineError::MissingModelDependency {
            input: config.input.clone(),
        })?;
    let trajectory = resolve_trajectory(&config.input)?;
    info!(
        trajectory = %trajectory.display(),
        model = %model.display(),
        "Starting extraction"
    );

    let (table, header) = read_table_with(&trajectory, &config.mapping)?;
    let series = extract_force_vectors(
        &config.engine(),
        model,
        &table,
        &header,
        &config.extraction_config(),
    )?;

    let basename = trajectory
        .file_stem()
        .map_or_else(|| "trajectory".into(), |s| s.to_string_lossy());
    let (origins, vectors) = write_samples(&series, &basename, &config.output_dir)?;

    Ok(ExtractionOutcome {
        trajectory,
        series,
        origins,
        vectors,
    })
}
