//! Pipeline commands tying the `msk` crates together.
//!
//! - [`generate_sto`] - build a tracking state table from a `.sto` or `.mat`
//!   source, filtered and aligned to a model's states
//! - [`run_extraction`] - replay a solved trajectory and write muscle
//!   anchor and direction samples
//!
//! Both take a [`PipelineConfig`] built once per run.
//!
//! # Example
//!
//! ```no_run
//! use msk_pipeline::{generate_sto, PipelineConfig};
//! use msk_table::FilterSpec;
//!
//! let config = PipelineConfig::new("trial.mat")
//!     .with_model("emu.osim")
//!     .with_filter(FilterSpec::new(["forceset"]))
//!     .with_output_dir("out");
//! let written = generate_sto(&config).unwrap();
//! println!("{}", written.display());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod config;
mod discovery;
mod error;
mod extract;
mod generate;
mod runlog;

pub use config::{GENERATED_SUFFIX, PipelineConfig};
pub use discovery::{AmbiguousFileMatch, find_file_in_dir, search_dir};
pub use error::{PipelineError, Result};
pub use extract::{ExtractionOutcome, TRAJECTORY_NEEDLE, resolve_trajectory, run_extraction};
pub use generate::{ColumnSummary, generate_sto, summarize};
pub use runlog::RunLog;
