//! Generation of tracking state tables.
//!
//! ```text
//! read (.sto | .mat) -> filter -> [.mat: project onto model states] -> write
//! ```

use std::fs;
use std::path::PathBuf;

use msk_osim::{enumerate_states_with, load_osim_file};
use msk_table::{
    StateTable, TableFormat, filter, project_onto_catalogue, read_table_with, select_for_view,
    write_table,
};
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// Range and mean of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    /// Column name.
    pub name: String,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
}

/// Summaries of every non-time column.
#[must_use]
pub fn summarize(table: &StateTable) -> Vec<ColumnSummary> {
    table
        .column_names()
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(i, name)| {
            let values = table.column_at(i)?;
            if values.is_empty() {
                return None;
            }
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            #[allow(clippy::cast_precision_loss)]
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            Some(ColumnSummary {
                name: name.clone(),
                min,
                max,
                mean,
            })
        })
        .collect()
}

fn log_summary(label: &str, table: &StateTable) {
    info!(label, columns = table.column_count(), rows = table.row_count(), "Table summary");
    for column in summarize(table) {
        info!(
            label,
            column = %column.name,
            min = column.min,
            max = column.max,
            mean = column.mean,
            "Column"
        );
    }
}

/// Generate a tracking state table from `config.input`.
///
/// `.mat` sources are imported through `config.mapping` and projected onto
/// the state names of `config.model`. Returns the path written.
///
/// # Errors
///
/// Returns [`PipelineError::MissingModelDependency`] for a `.mat` input
/// without a model, before anything is written. Read, parse and write
/// failures are returned as they occur.
pub fn generate_sto(config: &PipelineConfig) -> Result<PathBuf> {
    config.validate()?;
    let format = TableFormat::detect(&config.input)?;
    if format == TableFormat::Mat && config.model.is_none() {
        return Err(PipelineError::MissingModelDependency {
            input: config.input.clone(),
        });
    }

    let (table, header) = read_table_with(&config.input, &config.mapping)?;
    let mut table = if config.filter.is_empty() {
        table
    } else {
        filter::apply(&table, &config.filter)
    };

    if format == TableFormat::Mat {
        if let Some(model_path) = &config.model {
            info!(model = %model_path.display(), "Projecting source onto model states");
            let model = load_osim_file(model_path)?;
            let catalogue = enumerate_states_with(&model, &config.muscle_tag);
            table = project_onto_catalogue(&table, &catalogue.table_columns())?;
        }
    }

    let output = config.generated_path();
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_table(&output, &table, &header)?;
    info!(output = %output.display(), "Generated state table");

    if config.visualize {
        log_summary("full", &table);
        log_summary("view", &select_for_view(&table, &config.filter));
    }

    Ok(output)
}
