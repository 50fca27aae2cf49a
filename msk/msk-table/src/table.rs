//! In-memory state tables and their metadata header.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TableError};
use crate::units::AngleUnit;

/// Name of the independent column every table starts with.
pub const TIME_COLUMN: &str = "time";

/// Sentinel line terminating a header.
pub const END_HEADER: &str = "endheader";

/// Header keys that describe the table shape and are regenerated on write.
const ROW_COUNT_KEY: &str = "nRows";
const COLUMN_COUNT_KEY: &str = "nColumns";

/// A time-indexed table of named state columns.
///
/// The first column is always `time`. Data is stored column-major and every
/// column holds exactly [`row_count`](Self::row_count) values.
///
/// # Example
///
/// ```
/// use msk_table::StateTable;
///
/// let mut table = StateTable::new(vec![0.0, 0.1, 0.2]);
/// table.push_column("/jointset/knee/knee_flexion/value", vec![0.0, 0.5, 1.0]).unwrap();
///
/// assert_eq!(table.column_count(), 2);
/// assert_eq!(table.row_count(), 3);
/// assert_eq!(table.column("/jointset/knee/knee_flexion/value"), Some(&[0.0, 0.5, 1.0][..]));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTable {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl StateTable {
    /// Create a table holding only the time column.
    #[must_use]
    pub fn new(time: Vec<f64>) -> Self {
        Self {
            names: vec![TIME_COLUMN.to_string()],
            columns: vec![time],
        }
    }

    /// Build a table from parallel name and column vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if the first name is not `time`, names repeat or
    /// column lengths differ.
    pub fn from_columns(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        let mut iter = names.into_iter().zip(columns);
        let (first, time) = iter.next().ok_or_else(|| TableError::MissingTimeColumn {
            found: String::new(),
        })?;
        if first != TIME_COLUMN {
            return Err(TableError::MissingTimeColumn { found: first });
        }

        let mut table = Self::new(time);
        for (name, column) in iter {
            table.push_column(name, column)?;
        }
        Ok(table)
    }

    /// Append a column.
    ///
    /// # Errors
    ///
    /// Returns an error if the name already exists or the length differs from
    /// the time column.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if self.names.iter().any(|n| *n == name) {
            return Err(TableError::DuplicateColumn(name));
        }
        if values.len() != self.row_count() {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: self.row_count(),
                found: values.len(),
            });
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Number of rows (samples).
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Number of columns, including `time`.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.names.len()
    }

    /// Column names in order, `time` first.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// The time axis.
    #[must_use]
    pub fn time(&self) -> &[f64] {
        self.columns.first().map_or(&[], Vec::as_slice)
    }

    /// Index of a column by exact name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Values of a column by exact name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.column_index(name).map(|i| self.columns[i].as_slice())
    }

    /// Values of a column by index.
    #[must_use]
    pub fn column_at(&self, index: usize) -> Option<&[f64]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    /// Copy of the table keeping `time` and every column whose name satisfies
    /// `keep`, in their original order.
    #[must_use]
    pub fn retain_columns(&self, mut keep: impl FnMut(&str) -> bool) -> Self {
        let (names, columns) = self
            .names
            .iter()
            .zip(&self.columns)
            .enumerate()
            .filter(|(index, (name, _))| *index == 0 || keep(name))
            .map(|(_, (name, column))| (name.clone(), column.clone()))
            .unzip();
        Self { names, columns }
    }

    /// Set every value of a column to zero. `time` is left untouched.
    ///
    /// Returns `false` when the column does not exist or is `time`.
    pub fn zero_column(&mut self, index: usize) -> bool {
        if index == 0 {
            return false;
        }
        match self.columns.get_mut(index) {
            Some(column) => {
                column.iter_mut().for_each(|v| *v = 0.0);
                true
            }
            None => false,
        }
    }

    /// Rename a column in place, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if `to` already names another column.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<bool> {
        if from == to {
            return Ok(self.column_index(from).is_some());
        }
        if self.column_index(to).is_some() {
            return Err(TableError::DuplicateColumn(to.to_string()));
        }
        match self.column_index(from) {
            Some(i) => {
                self.names[i] = to.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Iterate over the values of one row, in column order.
    pub fn row(&self, index: usize) -> impl Iterator<Item = f64> + '_ {
        self.columns.iter().filter_map(move |c| c.get(index).copied())
    }

    /// Check the table invariants: equal column lengths, unique names and a
    /// non-decreasing time axis.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        let rows = self.row_count();
        let mut seen = HashSet::new();
        for (name, column) in self.names.iter().zip(&self.columns) {
            if !seen.insert(name.as_str()) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
            if column.len() != rows {
                return Err(TableError::LengthMismatch {
                    column: name.clone(),
                    expected: rows,
                    found: column.len(),
                });
            }
        }

        for (row, pair) in self.time().windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(TableError::NonMonotonicTime {
                    row: row + 1,
                    previous: pair[0],
                    current: pair[1],
                });
            }
        }
        Ok(())
    }
}

/// Ordered metadata lines preceding the column line of a `.sto` file.
///
/// Lines are stored without their newline. The last line is always the
/// `endheader` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Header {
    lines: Vec<String>,
}

impl Header {
    /// Create a header from lines, appending `endheader` if missing.
    #[must_use]
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        if lines.last().map(|l| l.trim()) != Some(END_HEADER) {
            lines.push(END_HEADER.to_string());
        }
        Self { lines }
    }

    /// A header for a table written from scratch.
    #[must_use]
    pub fn minimal(name: &str, in_degrees: bool) -> Self {
        Self::new([
            name.to_string(),
            "version=1".to_string(),
            format!("{ROW_COUNT_KEY}=0"),
            format!("{COLUMN_COUNT_KEY}=0"),
            format!("inDegrees={}", if in_degrees { "yes" } else { "no" }),
        ])
    }

    /// All lines, sentinel included.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Value of a `key=value` line.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| {
            let (k, v) = line.split_once('=')?;
            (k.trim() == key).then(|| v.trim())
        })
    }

    /// Replace the value of an existing `key=value` line.
    ///
    /// Returns `false` if the key is absent; the header is never extended so
    /// that unrelated metadata stays verbatim.
    pub fn set(&mut self, key: &str, value: impl std::fmt::Display) -> bool {
        for line in &mut self.lines {
            let matches = line
                .split_once('=')
                .is_some_and(|(k, _)| k.trim() == key);
            if matches {
                *line = format!("{key}={value}");
                return true;
            }
        }
        false
    }

    /// Whether the header declares angles in degrees (`inDegrees=yes`).
    #[must_use]
    pub fn in_degrees(&self) -> Option<bool> {
        self.get("inDegrees").map(|v| v.eq_ignore_ascii_case("yes"))
    }

    /// Angle unit declared by the header, radians when undeclared.
    #[must_use]
    pub fn angle_unit(&self) -> AngleUnit {
        AngleUnit::from_in_degrees(self.in_degrees().unwrap_or(false))
    }

    /// Regenerate the shape metadata for a table about to be written.
    #[must_use]
    pub fn for_table(&self, table: &StateTable) -> Self {
        let mut header = self.clone();
        header.set(ROW_COUNT_KEY, table.row_count());
        header.set(COLUMN_COUNT_KEY, table.column_count());
        header
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn knee_table() -> StateTable {
        let mut table = StateTable::new(vec![0.0, 0.5, 1.0]);
        table
            .push_column("/jointset/knee/knee_flexion/value", vec![0.1, 0.2, 0.3])
            .unwrap();
        table
            .push_column("/forceset/m1/activation", vec![0.5, 0.5, 0.5])
            .unwrap();
        table
    }

    #[test]
    fn push_rejects_length_mismatch() {
        let mut table = StateTable::new(vec![0.0, 1.0]);
        let err = table.push_column("a", vec![1.0]).unwrap_err();
        assert!(matches!(err, TableError::LengthMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn push_rejects_duplicates() {
        let mut table = knee_table();
        let err = table
            .push_column("/forceset/m1/activation", vec![0.0; 3])
            .unwrap_err();
        assert!(matches!(err, TableError::DuplicateColumn(_)));
    }

    #[test]
    fn from_columns_requires_time_first() {
        let err = StateTable::from_columns(vec!["x".into()], vec![vec![1.0]]).unwrap_err();
        assert!(matches!(err, TableError::MissingTimeColumn { .. }));
    }

    #[test]
    fn zero_column_never_touches_time() {
        let mut table = knee_table();
        assert!(!table.zero_column(0));
        assert!(table.zero_column(1));
        assert_eq!(table.time(), &[0.0, 0.5, 1.0]);
        assert_eq!(table.column_at(1), Some(&[0.0, 0.0, 0.0][..]));
    }

    #[test]
    fn retain_columns_always_keeps_time() {
        let table = knee_table();
        let kept = table.retain_columns(|name| name.contains("forceset"));
        assert_eq!(
            kept.column_names(),
            &["time".to_string(), "/forceset/m1/activation".to_string()]
        );
        assert_eq!(kept.time(), table.time());
        assert_eq!(kept.column_at(1), Some(&[0.5, 0.5, 0.5][..]));

        let bare = table.retain_columns(|_| false);
        assert_eq!(bare.column_count(), 1);
        assert_eq!(bare.row_count(), 3);
    }

    #[test]
    fn rename_column_keeps_position() {
        let mut table = knee_table();
        assert!(table.rename_column("/forceset/m1/activation", "act").unwrap());
        assert_eq!(table.column_index("act"), Some(2));
        assert!(!table.rename_column("missing", "other").unwrap());
    }

    #[test]
    fn row_iterates_in_column_order() {
        let table = knee_table();
        let row: Vec<f64> = table.row(1).collect();
        assert_eq!(row, vec![0.5, 0.2, 0.5]);
    }

    #[test]
    fn validate_detects_time_reversal() {
        let table = StateTable::new(vec![0.0, 0.2, 0.1]);
        let err = table.validate().unwrap_err();
        assert!(matches!(err, TableError::NonMonotonicTime { row: 2, .. }));
    }

    #[test]
    fn header_appends_sentinel() {
        let header = Header::new(["states", "version=1"]);
        assert_eq!(header.lines().last().map(String::as_str), Some(END_HEADER));

        let header = Header::new(["version=1", "endheader"]);
        assert_eq!(header.lines().len(), 2);
    }

    #[test]
    fn header_regenerates_row_count_only() {
        let header = Header::new(["states", "nRows=99", "nColumns=1", "inDegrees=no"]);
        let regenerated = header.for_table(&knee_table());
        assert_eq!(regenerated.get("nRows"), Some("3"));
        assert_eq!(regenerated.get("nColumns"), Some("3"));
        assert_eq!(regenerated.lines()[0], "states");
        assert_eq!(regenerated.in_degrees(), Some(false));
    }

    #[test]
    fn header_set_does_not_add_keys() {
        let mut header = Header::new(["inDegrees=yes"]);
        assert!(!header.set("nRows", 3));
        assert_eq!(header.lines().len(), 2);
        assert_eq!(header.in_degrees(), Some(true));
        assert_eq!(header.angle_unit(), AngleUnit::Degrees);
        assert_eq!(Header::default().angle_unit(), AngleUnit::Radians);
    }
}
