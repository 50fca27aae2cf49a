//! `msk` - musculoskeletal state tables and muscle force vectors.
//!
//! # Commands
//!
//! - `msk generate -i trial.mat -m emu.osim -f forceset` - build a tracking
//!   state table
//! - `msk extract -i runs/ -m emu.osim` - extract anchors and directions
//! - `msk states -m emu.osim` - list the model's state names
//! - `msk geometry -m emu.osim` - print static terminal-segment geometry
//!
//! Logging follows `RUST_LOG` (default `msk=info`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use msk_osim::{enumerate_force_geometry_with, enumerate_states_with, load_osim_file, validate};
use msk_pipeline::{PipelineConfig, RunLog, generate_sto, run_extraction};
use msk_table::{AngleUnit, FilterSpec, SourceMapping};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Musculoskeletal trajectory tools
#[derive(Parser)]
#[command(name = "msk")]
#[command(about = "Generate state tables and extract muscle force vectors", long_about = None)]
#[command(version)]
struct Cli {
    /// Prepend a markdown entry for this run to the given file
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a tracking state table from a .sto or .mat source
    Generate {
        /// Input states file (.sto/.mat)
        #[arg(short, long)]
        input: PathBuf,

        /// Model (.osim), required for .mat input
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Output filename (.sto)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for the default output name
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Substrings selecting columns to zero (e.g. -f jointset value)
        #[arg(short, long, num_args = 1..)]
        filter: Vec<String>,

        /// Zero the columns that do not match the filter instead
        #[arg(long)]
        invert_filter: bool,

        /// Log column summaries of the generated table
        #[arg(short, long)]
        visualize: bool,

        /// JSON column mapping for .mat sources
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Substring identifying muscle force elements
        #[arg(long, default_value = msk_osim::DEFAULT_MUSCLE_TAG)]
        muscle_tag: String,
    },

    /// Extract muscle anchors and lines of action from a trajectory
    Extract {
        /// Trajectory (.sto) or a directory holding one `*success.sto`
        #[arg(short, long)]
        input: PathBuf,

        /// Model (.osim)
        #[arg(short, long)]
        model: PathBuf,

        /// Directory for the sample files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Absolute anchor drift tolerance
        #[arg(long, default_value_t = msk_vectors::DEFAULT_DRIFT_TOLERANCE)]
        drift_tolerance: f64,

        /// Unit of rotational values in the table (rad/deg), overrides the header
        #[arg(long)]
        table_unit: Option<AngleUnit>,

        /// Unit the engine takes rotational values in (rad/deg)
        #[arg(long, default_value = "rad")]
        engine_unit: AngleUnit,

        /// Substring identifying muscle force elements
        #[arg(long, default_value = msk_osim::DEFAULT_MUSCLE_TAG)]
        muscle_tag: String,
    },

    /// Print the model's state names in canonical order
    States {
        /// Model (.osim)
        #[arg(short, long)]
        model: PathBuf,

        /// Substring identifying muscle force elements
        #[arg(long, default_value = msk_osim::DEFAULT_MUSCLE_TAG)]
        muscle_tag: String,
    },

    /// Print the static terminal-segment geometry of every muscle
    Geometry {
        /// Model (.osim)
        #[arg(short, long)]
        model: PathBuf,

        /// Substring identifying muscle force elements
        #[arg(long, default_value = msk_osim::DEFAULT_MUSCLE_TAG)]
        muscle_tag: String,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "generate",
            Self::Extract { .. } => "extract",
            Self::States { .. } => "states",
            Self::Geometry { .. } => "geometry",
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("msk=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn record(log: Option<&RunLog>, command: &str, params: &[(&str, String)]) -> Result<()> {
    if let Some(log) = log {
        log.record(command, params)
            .with_context(|| format!("Failed to update run log {}", log.path().display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let log = cli.log.map(RunLog::new);
    let command = cli.command.name();

    match cli.command {
        Commands::Generate {
            input,
            model,
            output,
            output_dir,
            filter,
            invert_filter,
            visualize,
            mapping,
            muscle_tag,
        } => {
            let mut config = PipelineConfig::new(input)
                .with_output_dir(output_dir)
                .with_filter(FilterSpec::new(filter).with_invert(invert_filter))
                .with_visualize(visualize)
                .with_muscle_tag(muscle_tag);
            if let Some(model) = model {
                config = config.with_model(model);
            }
            if let Some(output) = output {
                config = config.with_output(output);
            }
            if let Some(mapping) = mapping {
                let loaded = SourceMapping::from_json_file(&mapping)
                    .with_context(|| format!("Failed to load mapping {}", mapping.display()))?;
                config = config.with_mapping(loaded);
            }
            record(log.as_ref(), command, &config.parameters())?;

            let written = generate_sto(&config).context("State table generation failed")?;
            println!("Output .sto generated: {}", written.display());
        }

        Commands::Extract {
            input,
            model,
            output_dir,
            drift_tolerance,
            table_unit,
            engine_unit,
            muscle_tag,
        } => {
            let mut config = PipelineConfig::new(input)
                .with_model(model)
                .with_output_dir(output_dir)
                .with_drift_tolerance(drift_tolerance)
                .with_engine_angle_unit(engine_unit)
                .with_muscle_tag(muscle_tag);
            if let Some(unit) = table_unit {
                config = config.with_table_angle_unit(unit);
            }
            record(log.as_ref(), command, &config.parameters())?;

            let outcome = run_extraction(&config).context("Force vector extraction failed")?;
            for event in outcome.series.events() {
                println!("{event}");
            }
            println!("Muscle origins saved to {}", outcome.origins.display());
            println!("Muscle vectors saved to {}", outcome.vectors.display());
        }

        Commands::States { model, muscle_tag } => {
            record(log.as_ref(), command, &[("model", model.display().to_string())])?;
            let descriptor = load_osim_file(&model)
                .with_context(|| format!("Failed to read model {}", model.display()))?;
            let columns = enumerate_states_with(&descriptor, &muscle_tag).table_columns();
            for name in &columns {
                println!("{name}");
            }
            println!("Total states: {}", columns.len());
        }

        Commands::Geometry { model, muscle_tag } => {
            record(log.as_ref(), command, &[("model", model.display().to_string())])?;
            let descriptor = load_osim_file(&model)
                .with_context(|| format!("Failed to read model {}", model.display()))?;
            for issue in &validate(&descriptor).issues {
                warn!("{issue}");
            }
            let geometry = enumerate_force_geometry_with(&descriptor, &muscle_tag);
            for entry in &geometry {
                let direction = match entry.line_of_action.direction() {
                    Some(d) => format!("[{:.6}, {:.6}, {:.6}]", d.x, d.y, d.z),
                    None => "degenerate".to_string(),
                };
                println!(
                    "{}: {} {:?} -> {} {:?} direction {direction}",
                    entry.name,
                    entry.second_to_last.frame,
                    entry.second_to_last.location.as_slice(),
                    entry.terminal.frame,
                    entry.terminal.location.as_slice(),
                );
            }
            info!(muscles = geometry.len(), "Listed force geometry");
        }
    }

    Ok(())
}
