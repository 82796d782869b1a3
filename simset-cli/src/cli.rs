//! Command-line surface: `simset run` and `simset validate`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "simset", about = "Monte Carlo emission-tomography simulator", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs a simulation from a parameter file.
    Run {
        /// Path to the parameter file.
        #[arg(long)]
        config: PathBuf,
        /// Number of parallel decay streams (defaults to available cores).
        #[arg(long)]
        streams: Option<usize>,
    },
    /// Parses and validates a parameter file without running it.
    Validate {
        /// Path to the parameter file.
        #[arg(long)]
        config: PathBuf,
    },
}
