//! `simset`: parameter-file-driven Monte Carlo emission-tomography
//! simulator.

mod cli;
mod error;
mod pipeline;

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Command};
use error::CliError;
use simset_core::config::{self, SimConfig};
use tracing::{error, info};

fn read_config_text(path: &std::path::Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::ReadConfig { path: path.to_path_buf(), source })
}

fn load_config(path: &std::path::Path) -> Result<SimConfig, CliError> {
    let text = read_config_text(path)?;
    config::load(&text).map_err(|errors| CliError::Config { path: path.to_path_buf(), errors })
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Run { config: config_path, streams } => {
            let text = read_config_text(&config_path)?;
            let params = config::parse_params(&text)
                .map_err(|e| CliError::Config { path: config_path.clone(), errors: vec![e] })?;
            let sim_config = SimConfig::from_parsed(&params)
                .map_err(|errors| CliError::Config { path: config_path.clone(), errors })?;

            let num_streams = streams.unwrap_or_else(rayon::current_num_threads).max(1);
            info!(config = %config_path.display(), num_streams, "starting run");
            pipeline::run_simulation(&sim_config, &params, num_streams)?;
            info!("run finished");
            Ok(())
        }
        Command::Validate { config: config_path } => {
            let sim_config = load_config(&config_path)?;
            info!(
                config = %config_path.display(),
                num_decays = sim_config.num_decays,
                acquisition_mode = ?sim_config.acquisition_mode,
                "parameter file is valid"
            );
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "simset failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const VALID_PARAMS: &str = "\
target_radius=20.0
target_z_min=-20.0
target_z_max=20.0
object_radius=10.0
object_z_min=-10.0
object_z_max=10.0
isotope_energy_kev=511.0
num_decays=1000000
object_index_file=obj.idx
activity_index_file=act.idx
material_file=materials.txt
history_file=out.hist
";

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn validate_accepts_a_well_formed_parameter_file() {
        let file = write_config(VALID_PARAMS);
        let cli = Cli { command: Command::Validate { config: file.path().to_path_buf() } };
        assert!(run(cli).is_ok());
    }

    #[test]
    fn validate_reports_a_missing_file_as_read_error() {
        let cli = Cli { command: Command::Validate { config: "/no/such/file.pfile".into() } };
        assert!(matches!(run(cli), Err(CliError::ReadConfig { .. })));
    }

    #[test]
    fn validate_reports_missing_required_parameters_as_config_error() {
        let file = write_config("target_radius=20.0\n");
        let cli = Cli { command: Command::Validate { config: file.path().to_path_buf() } };
        assert!(matches!(run(cli), Err(CliError::Config { .. })));
    }

    #[test]
    fn run_reports_invalid_parameters_as_config_error_before_touching_the_pipeline() {
        let file = write_config("target_radius=20.0\n");
        let cli = Cli { command: Command::Run { config: file.path().to_path_buf(), streams: Some(1) } };
        assert!(matches!(run(cli), Err(CliError::Config { .. })));
    }
}
