//! Top-level CLI error: wraps every failure mode the binary can surface
//! so `main` has one `Result` to match on and report.

use std::path::PathBuf;

use simset_core::config::ConfigError;
use simset_core::error::SimError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read parameter file {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} configuration error(s) in {path}", .errors.len())]
    Config { path: PathBuf, errors: Vec<ConfigError> },

    #[error(transparent)]
    Sim(#[from] SimError),
}
