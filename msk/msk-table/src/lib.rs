//! Time-series state tables for musculoskeletal trajectories.
//!
//! This crate reads, writes and transforms the tabular state trajectories
//! consumed by the force-vector extractor:
//!
//! - **STO** - tab-separated storage files with a metadata header
//! - **MAT** - MATLAB level-5 containers (read only), imported through a
//!   declarative [`SourceMapping`]
//!
//! # Example
//!
//! ```no_run
//! use msk_table::{read_table, write_table, FilterSpec};
//!
//! let (table, header) = read_table("trial_success.sto").unwrap();
//! let masked = msk_table::filter::apply(&table, &FilterSpec::new(["forceset"]));
//! write_table("trial_masked.sto", &masked, &header).unwrap();
//! ```
//!
//! # Format Detection
//!
//! [`read_table`] dispatches on the file extension. Anything other than
//! `.sto` or `.mat` is rejected with [`TableError::UnsupportedFormat`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
pub mod filter;
pub mod import;
pub mod mat;
mod project;
pub mod sto;
mod table;
mod units;

pub use error::{Result, TableError};
pub use filter::{FilterSpec, select_for_view};
pub use import::{ColumnMapping, SourceMapping, UnitConversion, import_source};
pub use project::project_onto_catalogue;
pub use sto::{load_sto, save_sto};
pub use table::{END_HEADER, Header, StateTable, TIME_COLUMN};
pub use units::AngleUnit;

use std::path::Path;

/// Supported table file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFormat {
    /// Tab-separated storage file. Read and write.
    Sto,
    /// MATLAB level-5 container. Read only.
    Mat,
}

impl TableFormat {
    /// Detect format from file extension, ignoring case.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "sto" => Some(Self::Sto),
            "mat" => Some(Self::Mat),
            _ => None,
        }
    }

    /// Canonical file extension.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Sto => "sto",
            Self::Mat => "mat",
        }
    }

    /// Detect the format or fail with [`TableError::UnsupportedFormat`].
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not recognized.
    pub fn detect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::from_path(path).ok_or_else(|| TableError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("(none)")
                .to_string(),
        })
    }
}

/// Read a table, detecting the format from the extension.
///
/// MAT files are imported with the default [`SourceMapping`]; use
/// [`read_table_with`] to supply another.
///
/// # Errors
///
/// Returns an error if the format is unsupported or the file is invalid.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<(StateTable, Header)> {
    read_table_with(path, &SourceMapping::default())
}

/// Read a table, importing MAT files through `mapping`.
///
/// # Errors
///
/// Returns an error if the format is unsupported or the file is invalid.
pub fn read_table_with<P: AsRef<Path>>(
    path: P,
    mapping: &SourceMapping,
) -> Result<(StateTable, Header)> {
    let path = path.as_ref();
    match TableFormat::detect(path)? {
        TableFormat::Sto => load_sto(path),
        TableFormat::Mat => import_source(path, mapping),
    }
}

/// Write a table with its header. Only `.sto` output is supported.
///
/// # Errors
///
/// Returns an error if the extension is not `.sto` or writing fails.
pub fn write_table<P: AsRef<Path>>(path: P, table: &StateTable, header: &Header) -> Result<()> {
    let path = path.as_ref();
    match TableFormat::detect(path)? {
        TableFormat::Sto => save_sto(path, table, header),
        TableFormat::Mat => Err(TableError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: TableFormat::Mat.extension().to_string(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn format_from_path() {
        assert_eq!(TableFormat::from_path("a/b/run.sto"), Some(TableFormat::Sto));
        assert_eq!(TableFormat::from_path("RUN.MAT"), Some(TableFormat::Mat));
        assert_eq!(TableFormat::from_path("run.csv"), None);
        assert_eq!(TableFormat::from_path("run"), None);
    }

    #[test]
    fn read_rejects_unknown_extension() {
        let err = read_table("trial.csv").unwrap_err();
        match err {
            TableError::UnsupportedFormat { path, extension } => {
                assert_eq!(path, Path::new("trial.csv"));
                assert_eq!(extension, "csv");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn write_rejects_mat_output() {
        let table = StateTable::new(vec![0.0]);
        let err = write_table("out.mat", &table, &Header::default()).unwrap_err();
        assert!(matches!(err, TableError::UnsupportedFormat { .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_table("/nonexistent/dir/run.sto").unwrap_err();
        assert!(matches!(err, TableError::FileNotFound { .. }));
    }
}
