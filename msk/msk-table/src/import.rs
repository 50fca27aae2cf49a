//! Import of motion-capture tables onto canonical joint-state names.
//!
//! Motion-capture exports name their columns ad hoc (`kneeAng`,
//! `kneeAngvel`, ...). A [`SourceMapping`] declares how those names map onto
//! `/jointset/<joint>/<coordinate>/{value,speed,accel}` paths and which unit
//! conversion applies. Columns the mapping does not mention pass through
//! unchanged.
//!
//! The mapping is plain data and can be loaded from JSON:
//!
//! ```json
//! {
//!   "variable": "WeightedToes",
//!   "time_field": "FrameNumber",
//!   "columns": [
//!     { "source": "kneeAng", "target": "/jointset/knee/knee_flexion/value" }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TableError};
use crate::mat::{MatFile, load_mat, struct_columns};
use crate::table::{Header, StateTable, TIME_COLUMN};

/// Unit conversion applied to a remapped column.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitConversion {
    /// Values are copied as-is.
    #[default]
    Identity,
    /// Degrees to radians.
    DegreesToRadians,
    /// Radians to degrees.
    RadiansToDegrees,
    /// Multiply by a constant factor.
    Scale(f64),
}

impl UnitConversion {
    /// Apply the conversion to one value.
    #[must_use]
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Identity => value,
            Self::DegreesToRadians => value.to_radians(),
            Self::RadiansToDegrees => value.to_degrees(),
            Self::Scale(factor) => value * factor,
        }
    }
}

/// One remapped column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Column name in the source container.
    pub source: String,
    /// Canonical state path.
    pub target: String,
    /// Conversion applied while copying.
    #[serde(default)]
    pub conversion: UnitConversion,
}

impl ColumnMapping {
    /// Create an identity mapping.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            conversion: UnitConversion::Identity,
        }
    }

    /// Set the unit conversion.
    #[must_use]
    pub fn with_conversion(mut self, conversion: UnitConversion) -> Self {
        self.conversion = conversion;
        self
    }
}

/// Declarative description of an external source layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMapping {
    /// Struct variable holding the table.
    #[serde(default = "default_variable")]
    pub variable: String,
    /// Field used as the time axis; renamed to `time`.
    #[serde(default = "default_time_field")]
    pub time_field: String,
    /// Remapped columns.
    #[serde(default)]
    pub columns: Vec<ColumnMapping>,
    /// Header lines written in front of the imported table.
    #[serde(default = "default_header")]
    pub header: Vec<String>,
}

fn default_variable() -> String {
    "WeightedToes".to_string()
}

fn default_time_field() -> String {
    "FrameNumber".to_string()
}

fn default_header() -> Vec<String> {
    [
        "inDegrees=no",
        "num_controls=2",
        "num_derivatives=0",
        "num_input_controls=0",
        "num_multipliers=0",
        "num_parameters=0",
        "num_slacks=0",
        "num_states=12",
        "DataType=double",
        "version=3",
        "OpenSimVersion=4.5-2024-07-10-f38669b70",
        "endheader",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

impl Default for SourceMapping {
    /// The knee/ankle layout of the bundled motion-capture exports.
    fn default() -> Self {
        let joint = |source: &str, joint: &str, coord: &str, kind: &str| {
            ColumnMapping::new(source, format!("/jointset/{joint}/{coord}/{kind}"))
        };
        Self {
            variable: default_variable(),
            time_field: default_time_field(),
            columns: vec![
                joint("kneeAng", "knee", "knee_flexion", "value"),
                joint("kneeAngvel", "knee", "knee_flexion", "speed"),
                joint("kneeAngacc", "knee", "knee_flexion", "accel"),
                joint("ankleAng", "ankle", "ankle_flexion", "value"),
                joint("ankleAngvel", "ankle", "ankle_flexion", "speed"),
                joint("ankleAngacc", "ankle", "ankle_flexion", "accel"),
            ],
            header: default_header(),
        }
    }
}

impl SourceMapping {
    /// Load a mapping from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| TableError::from_open(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Find the mapping for a source column.
    #[must_use]
    pub fn lookup(&self, source: &str) -> Option<&ColumnMapping> {
        self.columns.iter().find(|c| c.source == source)
    }
}

/// Import named source columns into a canonical state table.
///
/// The time field moves to the front as `time`; mapped columns are renamed
/// and converted; every other column passes through unchanged.
///
/// # Errors
///
/// Returns an error if the time field is missing or columns differ in length.
pub fn import_columns(
    columns: Vec<(String, Vec<f64>)>,
    mapping: &SourceMapping,
) -> Result<(StateTable, Header)> {
    let time_index = columns
        .iter()
        .position(|(name, _)| *name == mapping.time_field)
        .ok_or_else(|| TableError::MissingTimeField(mapping.time_field.clone()))?;

    let mut columns = columns;
    let (_, time) = columns.remove(time_index);
    let mut table = StateTable::new(time);

    for (name, values) in columns {
        match mapping.lookup(&name) {
            Some(column) => {
                debug!(source = %name, target = %column.target, "Remapping source column");
                let values = values.into_iter().map(|v| column.conversion.apply(v)).collect();
                table.push_column(column.target.clone(), values)?;
            }
            None if name == TIME_COLUMN => {
                return Err(TableError::DuplicateColumn(name));
            }
            None => table.push_column(name, values)?,
        }
    }

    table.validate()?;
    Ok((table, Header::new(mapping.header.clone())))
}

/// Import the mapped struct variable of a decoded MAT file.
///
/// # Errors
///
/// Returns an error if the variable is missing or cannot be flattened.
pub fn import_mat(file: &MatFile, mapping: &SourceMapping) -> Result<(StateTable, Header)> {
    let value = file
        .get(&mapping.variable)
        .ok_or_else(|| TableError::MissingVariable {
            name: mapping.variable.clone(),
            available: file.names(),
        })?;
    import_columns(struct_columns(value)?, mapping)
}

/// Load a MAT file and import it with the given mapping.
///
/// # Errors
///
/// Returns an error if loading or importing fails.
pub fn import_source<P: AsRef<Path>>(
    path: P,
    mapping: &SourceMapping,
) -> Result<(StateTable, Header)> {
    let path = path.as_ref();
    let file = load_mat(path)?;
    let imported = import_mat(&file, mapping)?;
    info!(
        path = %path.display(),
        variable = %mapping.variable,
        rows = imported.0.row_count(),
        columns = imported.0.column_count(),
        "Imported external source"
    );
    Ok(imported)
}
