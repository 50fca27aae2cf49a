//! JSON-lines output of extracted series.
//!
//! Two parallel files are written per trajectory:
//!
//! - `<basename>_muscle_origins.json` - anchors
//! - `<basename>_muscle_vectors.json` - directions
//!
//! Each line is one row: `{"time": t, "<muscle>": [x, y, z], ...}` with
//! muscles in model order.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::info;

use crate::error::Result;
use crate::series::ForceVectorSeries;

/// Suffix of the anchors file.
pub const ORIGINS_SUFFIX: &str = "_muscle_origins.json";
/// Suffix of the directions file.
pub const VECTORS_SUFFIX: &str = "_muscle_vectors.json";

struct Record<'a> {
    time: f64,
    index: usize,
    names: &'a [String],
    columns: &'a [Vec<[f64; 3]>],
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.names.len() + 1))?;
        map.serialize_entry("time", &self.time)?;
        for (name, column) in self.names.iter().zip(self.columns) {
            if let Some(value) = column.get(self.index) {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}

/// Output paths for a trajectory basename. A trailing `.sto` is dropped.
#[must_use]
pub fn sample_paths(sto_basename: &str, output_dir: &Path) -> (PathBuf, PathBuf) {
    let base = sto_basename.strip_suffix(".sto").unwrap_or(sto_basename);
    (
        output_dir.join(format!("{base}{ORIGINS_SUFFIX}")),
        output_dir.join(format!("{base}{VECTORS_SUFFIX}")),
    )
}

fn write_lines(path: &Path, series: &ForceVectorSeries, columns: &[Vec<[f64; 3]>]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (index, &time) in series.time().iter().enumerate() {
        let record = Record {
            time,
            index,
            names: series.element_names(),
            columns,
        };
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Write anchors and directions, overwriting both files.
///
/// Returns `(anchors_path, vectors_path)`.
///
/// # Errors
///
/// Returns an error if the directory or either file cannot be written.
pub fn write_samples(
    series: &ForceVectorSeries,
    sto_basename: &str,
    output_dir: &Path,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(output_dir)?;
    let (origins, vectors) = sample_paths(sto_basename, output_dir);
    write_lines(&origins, series, series.anchor_columns())?;
    write_lines(&vectors, series, series.direction_columns())?;
    info!(
        origins = %origins.display(),
        vectors = %vectors.display(),
        rows = series.len(),
        "Wrote force vector samples"
    );
    Ok((origins, vectors))
}
