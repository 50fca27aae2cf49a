//! Run configuration, built once and passed to every command.

use std::path::{Path, PathBuf};

use msk_engine::KinematicEngine;
use msk_osim::DEFAULT_MUSCLE_TAG;
use msk_table::{AngleUnit, FilterSpec, SourceMapping};
use msk_vectors::{DEFAULT_DRIFT_TOLERANCE, ExtractionConfig};

use crate::error::{PipelineError, Result};

/// Suffix of generated state tables.
pub const GENERATED_SUFFIX: &str = "_moco_track_states.sto";

/// Everything a pipeline command needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Input table (`.sto` or `.mat`), or a directory to search.
    pub input: PathBuf,
    /// Model descriptor.
    pub model: Option<PathBuf>,
    /// Explicit output table path.
    pub output: Option<PathBuf>,
    /// Directory for derived outputs.
    pub output_dir: PathBuf,
    /// Columns to zero.
    pub filter: FilterSpec,
    /// Log column summaries after generating.
    pub visualize: bool,
    /// Markdown run log to prepend to.
    pub run_log: Option<PathBuf>,
    /// Substring identifying muscle force elements.
    pub muscle_tag: String,
    /// Anchor drift tolerance.
    pub drift_tolerance: f64,
    /// Override of the table's declared angle unit.
    pub table_angle_unit: Option<AngleUnit>,
    /// Unit the engine takes rotational values in.
    pub engine_angle_unit: AngleUnit,
    /// Column mapping for `.mat` sources.
    pub mapping: SourceMapping,
}

impl PipelineConfig {
    /// Configuration for `input` with defaults everywhere else.
    #[must_use]
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            model: None,
            output: None,
            output_dir: PathBuf::from("."),
            filter: FilterSpec::default(),
            visualize: false,
            run_log: None,
            muscle_tag: DEFAULT_MUSCLE_TAG.to_string(),
            drift_tolerance: DEFAULT_DRIFT_TOLERANCE,
            table_angle_unit: None,
            engine_angle_unit: AngleUnit::Radians,
            mapping: SourceMapping::default(),
        }
    }

    /// Set the model descriptor.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<PathBuf>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the output table path.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the state filter.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }

    /// Enable column summaries.
    #[must_use]
    pub fn with_visualize(mut self, visualize: bool) -> Self {
        self.visualize = visualize;
        self
    }

    /// Set the run log file.
    #[must_use]
    pub fn with_run_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.run_log = Some(path.into());
        self
    }

    /// Set the muscle tag.
    #[must_use]
    pub fn with_muscle_tag(mut self, tag: impl Into<String>) -> Self {
        self.muscle_tag = tag.into();
        self
    }

    /// Set the drift tolerance.
    #[must_use]
    pub fn with_drift_tolerance(mut self, tolerance: f64) -> Self {
        self.drift_tolerance = tolerance;
        self
    }

    /// Override the table angle unit.
    #[must_use]
    pub fn with_table_angle_unit(mut self, unit: AngleUnit) -> Self {
        self.table_angle_unit = Some(unit);
        self
    }

    /// Set the engine angle unit.
    #[must_use]
    pub fn with_engine_angle_unit(mut self, unit: AngleUnit) -> Self {
        self.engine_angle_unit = unit;
        self
    }

    /// Set the `.mat` column mapping.
    #[must_use]
    pub fn with_mapping(mut self, mapping: SourceMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Check values that cannot be caught by the type system.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] on the first bad value.
    pub fn validate(&self) -> Result<()> {
        if !self.drift_tolerance.is_finite() || self.drift_tolerance < 0.0 {
            return Err(PipelineError::invalid_config(format!(
                "drift tolerance must be a non-negative number, got {}",
                self.drift_tolerance
            )));
        }
        if self.muscle_tag.trim().is_empty() {
            return Err(PipelineError::invalid_config("muscle tag is empty"));
        }
        if let Some(model) = &self.model {
            if !has_extension(model, "osim") {
                return Err(PipelineError::invalid_config(format!(
                    "model must be an .osim file: {}",
                    model.display()
                )));
            }
        }
        if let Some(output) = &self.output {
            if !has_extension(output, "sto") {
                return Err(PipelineError::invalid_config(format!(
                    "output must be an .sto file: {}",
                    output.display()
                )));
            }
        }
        Ok(())
    }

    /// Where `generate` writes its table.
    ///
    /// An explicit output wins; otherwise `<model stem>_moco_track_states.sto`
    /// (or the input stem without a model) inside the output directory.
    #[must_use]
    pub fn generated_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }
        let source = self.model.as_deref().unwrap_or(&self.input);
        let stem = source
            .file_stem()
            .map_or_else(|| "states".into(), |s| s.to_string_lossy());
        self.output_dir.join(format!("{stem}{GENERATED_SUFFIX}"))
    }

    /// Extraction settings derived from this configuration.
    #[must_use]
    pub fn extraction_config(&self) -> ExtractionConfig {
        let config = ExtractionConfig::default().with_drift_tolerance(self.drift_tolerance);
        match self.table_angle_unit {
            Some(unit) => config.with_table_angle_unit(unit),
            None => config,
        }
    }

    /// The reference engine configured for this run.
    #[must_use]
    pub fn engine(&self) -> KinematicEngine {
        KinematicEngine::new()
            .with_angle_unit(self.engine_angle_unit)
            .with_muscle_tag(&self.muscle_tag)
    }

    /// `(name, value)` pairs recorded in the run log.
    #[must_use]
    pub fn parameters(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("input", self.input.display().to_string())];
        if let Some(model) = &self.model {
            params.push(("model", model.display().to_string()));
        }
        if let Some(output) = &self.output {
            params.push(("output", output.display().to_string()));
        }
        params.push(("output_dir", self.output_dir.display().to_string()));
        if !self.filter.is_empty() {
            params.push(("filter", self.filter.substrings().join(", ")));
            params.push(("invert_filter", self.filter.is_inverted().to_string()));
        }
        params.push(("visualize", self.visualize.to_string()));
        params
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
