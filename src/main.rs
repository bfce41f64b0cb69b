#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate anyhow;

use std::process::ExitCode;

use clap::Parser;

use crate::{
    configuration::{Cli, Commands, Configuration, OutputFormat},
    error::MinimizeError,
};

pub mod configuration;
pub mod corpus;
pub mod coverage_readers;
pub mod decode;
pub mod encoder;
pub mod error;
pub mod instance;
pub mod minimizer;
pub mod report;
pub mod seeds;
pub mod solver;
pub mod wcnf;
pub mod weights;

fn main() -> ExitCode {
    // Parse once up front so that usage errors exit with status 1
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    if let Commands::Version = cli.command {
        println!("covermin {}", clap::crate_version!());
        return ExitCode::SUCCESS;
    }

    let config = match Configuration::get() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(config);
    for option in &config.ignored_options {
        log::warn!("Ignoring `{option}`, it only applies to the solve command");
    }
    if let Some(corpus_dir) = config.task.corpus_dir() {
        log::info!(
            "Minimizing `{}` ({} coverage, {:?} mode)",
            corpus_dir.display(),
            config.coverage_format,
            config.coverage_mode
        );
    }

    match minimizer::run(config) {
        Ok(Some(report)) => {
            print!("{}", report.render(config.output_format));
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            if let Some(MinimizeError::TopOverflow { .. }) = err.downcast_ref::<MinimizeError>() {
                std::process::abort();
            }
            ExitCode::FAILURE
        }
    }
}

/// Installs the global logger. JSON output gets JSON log lines, so that stdout
/// and stderr can be consumed by the same tooling.
pub fn setup_logging(config: &Configuration) {
    let result = match config.output_format {
        OutputFormat::Json => json_env_logger2::builder()
            .filter_level(config.log_level)
            .try_init(),
        OutputFormat::HumanReadable => env_logger::Builder::from_default_env()
            .filter_level(config.log_level)
            .format_timestamp_millis()
            .try_init(),
    };
    if let Err(err) = result {
        eprintln!("Could not set up logging: {err}");
    }
}
