//! `.sto` storage file support.
//!
//! # Format
//!
//! ```text
//! states                      <- free-form header lines
//! version=1
//! nRows=3
//! inDegrees=no
//! endheader                   <- sentinel
//! time	/jointset/knee/knee_flexion/value	...
//! 0	0.1	...
//! 0.01	0.12	...
//! ```
//!
//! Header lines are kept verbatim. Column and value lines are tab-separated;
//! the first column is always `time`.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TableError};
use crate::table::{END_HEADER, Header, StateTable, TIME_COLUMN};

/// Load a state table and its header from a `.sto` file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not a valid `.sto`.
pub fn load_sto<P: AsRef<Path>>(path: P) -> Result<(StateTable, Header)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| TableError::from_open(path, e))?;
    let (table, header) = parse_sto(BufReader::new(file))?;
    debug!(
        path = %path.display(),
        rows = table.row_count(),
        columns = table.column_count(),
        "Loaded state table"
    );
    Ok((table, header))
}

/// Parse `.sto` content from a reader.
///
/// # Errors
///
/// Returns an error if the sentinel is missing, the first column is not
/// `time`, a row is ragged, a value is not a number or time decreases.
pub fn parse_sto<R: BufRead>(reader: R) -> Result<(StateTable, Header)> {
    let mut lines = reader.lines().enumerate();

    let mut header_lines = Vec::new();
    let mut terminated = false;
    for (_, line) in lines.by_ref() {
        let line = line?;
        let line = line.trim_end_matches('\r').to_string();
        let is_end = line.trim() == END_HEADER;
        header_lines.push(line);
        if is_end {
            terminated = true;
            break;
        }
    }
    if !terminated {
        return Err(TableError::MissingHeaderSentinel);
    }

    let names: Vec<String> = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line?;
                let line = line.trim_end_matches('\r');
                if line.trim().is_empty() {
                    continue;
                }
                break line.split('\t').map(|s| s.trim().to_string()).collect();
            }
            None => {
                return Err(TableError::MissingTimeColumn {
                    found: String::new(),
                });
            }
        }
    };
    if names.first().map(String::as_str) != Some(TIME_COLUMN) {
        return Err(TableError::MissingTimeColumn {
            found: names.first().cloned().unwrap_or_default(),
        });
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for (index, line) in lines {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != names.len() {
            return Err(TableError::RaggedRow {
                line: index + 1,
                expected: names.len(),
                found: fields.len(),
            });
        }
        for ((field, column), name) in fields.iter().zip(&mut columns).zip(&names) {
            let value = field.trim().parse::<f64>().map_err(|_| TableError::InvalidValue {
                line: index + 1,
                column: name.clone(),
                value: (*field).to_string(),
            })?;
            column.push(value);
        }
    }

    let table = StateTable::from_columns(names, columns)?;
    table.validate()?;
    Ok((table, Header::new(header_lines)))
}

/// Save a state table with its header to a `.sto` file, overwriting it.
///
/// Shape metadata (`nRows`, `nColumns`) already present in the header is
/// regenerated; every other header line is written verbatim.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_sto<P: AsRef<Path>>(path: P, table: &StateTable, header: &Header) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_sto(&mut writer, table, header)?;
    writer.flush()?;
    debug!(
        path = %path.display(),
        rows = table.row_count(),
        columns = table.column_count(),
        "Wrote state table"
    );
    Ok(())
}

/// Write `.sto` content to a writer.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_sto<W: Write>(writer: &mut W, table: &StateTable, header: &Header) -> Result<()> {
    for line in header.for_table(table).lines() {
        writeln!(writer, "{line}")?;
    }

    writeln!(writer, "{}", table.column_names().join("\t"))?;

    let mut line = String::new();
    for row in 0..table.row_count() {
        line.clear();
        for (i, value) in table.row(row).enumerate() {
            if i > 0 {
                line.push('\t');
            }
            line.push_str(&value.to_string());
        }
        writeln!(writer, "{line}")?;
    }
    Ok(())
}
