//! Muscle force-vector extraction from state trajectories.
//!
//! Replays a trajectory row by row against a model through an
//! [`msk_engine::Engine`] and samples, for every muscle, the anchor of its
//! terminal segment and the unit line of action:
//!
//! ```text
//! direction = normalize(previous_ground - terminal_ground)
//! anchor    = terminal point expressed in the previous point's frame
//! ```
//!
//! Results accumulate in a [`ForceVectorSeries`] together with the
//! non-fatal [`ExtractionEvent`]s met on the way, and are written as two
//! JSON-lines files by [`write_samples`].
//!
//! # Example
//!
//! ```no_run
//! use msk_engine::KinematicEngine;
//! use msk_vectors::{extract_force_vectors, write_samples, ExtractionConfig};
//! use std::path::Path;
//!
//! let (table, header) = msk_table::read_table("trial_success.sto").unwrap();
//! let series = extract_force_vectors(
//!     &KinematicEngine::new(),
//!     Path::new("leg.osim"),
//!     &table,
//!     &header,
//!     &ExtractionConfig::default(),
//! )
//! .unwrap();
//! for event in series.events() {
//!     println!("{event}");
//! }
//! write_samples(&series, "trial_success", Path::new("out")).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod config;
mod error;
mod events;
mod extract;
mod serialize;
mod series;

pub use config::{DEFAULT_DRIFT_TOLERANCE, ExtractionConfig};
pub use error::{ExtractError, Result};
pub use events::ExtractionEvent;
pub use extract::{ElementSample, SimulationContext, StepSample, extract_force_vectors, run, step};
pub use serialize::{ORIGINS_SUFFIX, VECTORS_SUFFIX, sample_paths, write_samples};
pub use series::ForceVectorSeries;
