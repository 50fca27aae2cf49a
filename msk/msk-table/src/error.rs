//! Error types for state-table I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for state-table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// Errors that can occur while reading, writing or transforming state tables.
#[derive(Debug, Error)]
pub enum TableError {
    /// File extension is neither `.sto` nor `.mat`.
    #[error("unsupported input format for {path}: .{extension} (must be .sto or .mat)")]
    UnsupportedFormat {
        /// Offending path.
        path: PathBuf,
        /// The unrecognized extension.
        extension: String,
    },

    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// Header is not terminated by `endheader`.
    #[error("header is missing the endheader sentinel")]
    MissingHeaderSentinel,

    /// The first column of a table is not `time`.
    #[error("first column must be `time`, found `{found}`")]
    MissingTimeColumn {
        /// The name found in the first position.
        found: String,
    },

    /// A row has a different number of fields than the column line.
    #[error("line {line}: expected {expected} values, found {found}")]
    RaggedRow {
        /// 1-based line number in the file.
        line: usize,
        /// Number of columns declared.
        expected: usize,
        /// Number of values found.
        found: usize,
    },

    /// A value could not be parsed as a float.
    #[error("line {line}: invalid value `{value}` in column `{column}`")]
    InvalidValue {
        /// 1-based line number in the file.
        line: usize,
        /// Column name.
        column: String,
        /// The raw text.
        value: String,
    },

    /// Columns of a table have different lengths.
    #[error("column `{column}` has {found} rows, expected {expected}")]
    LengthMismatch {
        /// Column name.
        column: String,
        /// Expected row count.
        expected: usize,
        /// Actual row count.
        found: usize,
    },

    /// Two columns share a name.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    /// Time decreases between two rows.
    #[error("time is not monotonic at row {row}: {previous} -> {current}")]
    NonMonotonicTime {
        /// Row index where the decrease happens.
        row: usize,
        /// Time at the previous row.
        previous: f64,
        /// Time at this row.
        current: f64,
    },

    /// MATLAB container could not be decoded.
    #[error("invalid MAT file: {message}")]
    InvalidMat {
        /// Description of what was invalid.
        message: String,
    },

    /// Requested variable is not in the MATLAB container.
    #[error("variable `{name}` not found in MAT file (available: {available:?})")]
    MissingVariable {
        /// Requested variable.
        name: String,
        /// Variables present in the file.
        available: Vec<String>,
    },

    /// The source table lacks the configured frame/time field.
    #[error("source has no time field `{0}`")]
    MissingTimeField(String),

    /// A source cell holds more than one value.
    #[error("field `{field}` element {index} is not a scalar ({len} values)")]
    NonScalarCell {
        /// Field name.
        field: String,
        /// Element index within the field.
        index: usize,
        /// Number of values held by the cell.
        len: usize,
    },

    /// Mapping configuration could not be parsed.
    #[error("invalid source mapping: {0}")]
    Mapping(#[from] serde_json::Error),

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TableError {
    /// Create an `InvalidMat` error with the given message.
    #[must_use]
    pub fn invalid_mat(message: impl Into<String>) -> Self {
        Self::InvalidMat {
            message: message.into(),
        }
    }

    /// Map an `io::Error` from opening `path`, keeping not-found distinct.
    #[must_use]
    pub fn from_open(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound { path: path.into() }
        } else {
            Self::Io(err)
        }
    }
}
