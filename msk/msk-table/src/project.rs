//! Projection of an imported table onto a model's state catalogue.

use tracing::debug;

use crate::error::Result;
use crate::table::{StateTable, TIME_COLUMN};

/// Build a table with exactly the catalogue columns, `time` first.
///
/// Every catalogue column starts zero-filled. Joint states (names containing
/// `jointset` but not `ground`) are copied from `source` when present. A
/// `time` entry in the catalogue is ignored.
///
/// # Errors
///
/// Returns an error if the catalogue repeats a name.
pub fn project_onto_catalogue<S: AsRef<str>>(
    source: &StateTable,
    catalogue: &[S],
) -> Result<StateTable> {
    let rows = source.row_count();
    let mut projected = StateTable::new(source.time().to_vec());
    let mut copied = 0usize;

    for name in catalogue.iter().map(AsRef::as_ref) {
        if name == TIME_COLUMN {
            continue;
        }
        let values = if name.contains("jointset") && !name.contains("ground") {
            match source.column(name) {
                Some(values) => {
                    copied += 1;
                    values.to_vec()
                }
                None => {
                    debug!(column = name, "Joint state missing from source, zero-filled");
                    vec![0.0; rows]
                }
            }
        } else {
            vec![0.0; rows]
        };
        projected.push_column(name, values)?;
    }

    debug!(
        columns = projected.column_count(),
        copied, "Projected table onto state catalogue"
    );
    Ok(projected)
}
