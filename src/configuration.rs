use std::{
    convert::TryFrom,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use crate::encoder::CoverageMode;

const DEFAULT_COVERAGE_FORMAT: CoverageFormat = CoverageFormat::AflShowmap;
const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;

lazy_static! {
    static ref CONFIGURATION: Result<Configuration, anyhow::Error> =
        Configuration::try_from(PartialConfiguration::get()?);
}

/// Optimal fuzzing corpus minimization: reduces a corpus to a minimum-weight subset
/// that preserves its coverage, by encoding it as weighted MaxSAT.
#[derive(Parser)]
#[command(about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// The list of supported subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Print the version and exit
    Version,
    /// Encode a corpus as a weighted partial MaxSAT instance and write it in WCNF
    Wcnf {
        /// The path to a configuration file. If present, the configuration file is used
        /// to configure the minimizer. Arguments given on the command line take precedence
        /// over the configuration file.
        #[arg(long, value_parser, value_name = "CONFIG_FILE.YAML")]
        config: Option<PathBuf>,

        /// Directory holding one coverage file per seed
        #[arg(value_parser, value_name = "CORPUS_DIRECTORY")]
        corpus_dir: Option<PathBuf>,

        /// Where to write the WCNF instance
        #[arg(short, long, value_parser, value_name = "OUT.WCNF")]
        output: Option<PathBuf>,

        #[command(flatten)]
        encoding: EncodingArgs,
    },
    /// Encode a corpus and minimize it with the embedded z3 optimizer
    Solve {
        /// The path to a configuration file. If present, the configuration file is used
        /// to configure the minimizer. Arguments given on the command line take precedence
        /// over the configuration file.
        #[arg(long, value_parser, value_name = "CONFIG_FILE.YAML")]
        config: Option<PathBuf>,

        /// Directory holding one coverage file per seed
        #[arg(value_parser, value_name = "CORPUS_DIRECTORY")]
        corpus_dir: Option<PathBuf>,

        /// Dump the optimization problem in SMT-LIB2 format to this file before solving
        #[arg(short, long, value_parser, value_name = "OUT.SMT2")]
        smt_output: Option<PathBuf>,

        /// Give up solving after this many seconds. Without it, the solver runs
        /// until it finds an optimum.
        #[arg(value_parser, long, value_name = "SECONDS")]
        solver_timeout: Option<u64>,

        #[command(flatten)]
        encoding: EncodingArgs,
    },
    /// Map the output of an external MaxSAT solver back to seed names
    Decode {
        /// The WCNF file the solver was run on
        #[arg(long, value_parser, value_name = "INSTANCE.WCNF")]
        wcnf: PathBuf,

        /// The captured standard output of the solver
        #[arg(value_parser, value_name = "SOLVER_OUTPUT")]
        solver_output: PathBuf,

        /// Output to stdout can be formatted in human readable format or json.
        #[arg(value_parser, long, value_enum, required = false, ignore_case = true)]
        output_format: Option<OutputFormat>,

        // Manually added possible values below, since automatically showing possible values of an external (remote) enum
        // such as log::LevelFilter is not well supported.
        // See https://github.com/serde-rs/serde/issues/1301, https://github.com/serde-rs/serde/issues/723
        /// Log level to output. This flag takes precedence over the environment variable. [possible values: off, error, warn, debug, info, trace]
        #[arg(value_parser = clap::value_parser!(log::LevelFilter), long, value_enum, env = "LOG_LEVEL", ignore_case = true)]
        log_level: Option<log::LevelFilter>,
    },
}

/// Options shared by the commands that read a corpus.
#[derive(Args, Debug, Default)]
pub struct EncodingArgs {
    /// The format of the per-seed coverage files. Defaults to afl-showmap.
    #[arg(value_parser, long, value_enum, ignore_case = true)]
    coverage_format: Option<CoverageFormat>,

    /// Ignore hit counts: a seed covers an edge or region as soon as it reaches it once
    #[arg(short = 'e', long)]
    coverage_only: bool,

    /// Clamp hit counts to the bucket width, so that frequent edges cannot collide
    /// with the buckets of the next edge
    #[arg(long)]
    clamp_hit_counts: bool,

    /// CSV file of `seed,weight` pairs. Seeds without an entry weigh 1.
    #[arg(short, long, value_parser, value_name = "WEIGHTS.CSV")]
    weights: Option<PathBuf>,

    /// Show progress bars while reading the corpus
    #[arg(short, long)]
    progress: bool,

    /// Number of threads used to read coverage files. 0 uses every core.
    #[arg(short, long, value_parser, value_name = "N")]
    jobs: Option<usize>,

    /// Output to stdout can be formatted in human readable format or json.
    #[arg(value_parser, long, value_enum, required = false, ignore_case = true)]
    output_format: Option<OutputFormat>,

    // Manually added possible values below, since automatically showing possible values of an external (remote) enum
    // such as log::LevelFilter is not well supported.
    // See https://github.com/serde-rs/serde/issues/1301, https://github.com/serde-rs/serde/issues/723
    /// Log level to output. This flag takes precedence over the environment variable. [possible values: off, error, warn, debug, info, trace]
    #[arg(value_parser = clap::value_parser!(log::LevelFilter), long, value_enum, env = "LOG_LEVEL", ignore_case = true)]
    log_level: Option<log::LevelFilter>,
}

impl EncodingArgs {
    fn into_partial(self, command: CommandKind) -> PartialConfiguration {
        PartialConfiguration {
            command: Some(command),
            coverage_format: self.coverage_format,
            coverage_only: self.coverage_only.then_some(true),
            clamp_hit_counts: self.clamp_hit_counts.then_some(true),
            weights: self.weights,
            progress: self.progress.then_some(true),
            jobs: self.jobs,
            output_format: self.output_format,
            log_level: self.log_level,
            ..Default::default()
        }
    }
}

impl Commands {
    fn config_filename(&self) -> Option<&PathBuf> {
        match self {
            Commands::Wcnf { config, .. } | Commands::Solve { config, .. } => config.as_ref(),
            _ => None,
        }
    }

    fn minimizer_config(self) -> Result<PartialConfiguration, anyhow::Error> {
        match self {
            Commands::Wcnf {
                corpus_dir,
                output,
                encoding,
                ..
            } => Ok(PartialConfiguration {
                corpus_dir,
                output,
                ..encoding.into_partial(CommandKind::Wcnf)
            }),
            Commands::Solve {
                corpus_dir,
                smt_output,
                solver_timeout,
                encoding,
                ..
            } => Ok(PartialConfiguration {
                corpus_dir,
                smt_output,
                solver_timeout,
                ..encoding.into_partial(CommandKind::Solve)
            }),
            Commands::Decode {
                wcnf,
                solver_output,
                output_format,
                log_level,
            } => Ok(PartialConfiguration {
                command: Some(CommandKind::Decode),
                wcnf: Some(wcnf),
                solver_output: Some(solver_output),
                output_format,
                log_level,
                ..Default::default()
            }),
            Commands::Version => Err(anyhow!(
                "Tried to generate a configuration for an unsupported command"
            )),
        }
    }
}

/// Which of the configurable commands a partial configuration came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CommandKind {
    Wcnf,
    Solve,
    Decode,
}

/// PartialConfiguration is a representation of a minimizer configuration, obtained from the
/// CLI or from a configuration file.
///
/// Partial configurations are only one source, e.g. config file or command line.
/// No field can be mandatory, since then they would need to be specified in both places.
/// The Configuration is combined from the partials and does have mandatory fields,
/// so creating a Configuration from a PartialConfiguration using TryFrom can fail.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfiguration {
    /// Only known from the command line
    #[serde(skip)]
    command: Option<CommandKind>,

    pub corpus_dir: Option<PathBuf>,

    pub output: Option<PathBuf>,

    pub wcnf: Option<PathBuf>,

    pub solver_output: Option<PathBuf>,

    pub coverage_format: Option<CoverageFormat>,

    pub coverage_only: Option<bool>,

    pub clamp_hit_counts: Option<bool>,

    pub weights: Option<PathBuf>,

    pub progress: Option<bool>,

    pub jobs: Option<usize>,

    pub smt_output: Option<PathBuf>,

    pub solver_timeout: Option<u64>,

    pub output_format: Option<OutputFormat>,

    pub log_level: Option<log::LevelFilter>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Deserialize, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum CoverageFormat {
    /// `edge:count` lines as written by afl-showmap
    #[serde(alias = "afl-showmap", alias = "afl_showmap", alias = "aflshowmap")]
    AflShowmap,
    /// JSON export of `llvm-cov export`
    #[serde(alias = "llvm-cov", alias = "llvm_cov", alias = "llvmcov")]
    LlvmCov,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Deserialize)]
pub enum OutputFormat {
    #[serde(alias = "json")]
    Json,
    #[serde(
        alias = "human-readable",
        alias = "human_readable",
        alias = "humanreadable"
    )]
    HumanReadable,
}

/// What the minimizer was asked to do, with the inputs specific to that task.
#[derive(Debug, PartialEq, Eq)]
pub enum Task {
    /// Write the instance of `corpus_dir` as WCNF to `output`.
    Wcnf { corpus_dir: PathBuf, output: PathBuf },
    /// Solve the instance of `corpus_dir` with z3.
    Solve {
        corpus_dir: PathBuf,
        smt_output: Option<PathBuf>,
        solver_timeout: Option<Duration>,
    },
    /// Decode `solver_output` against the legend in `wcnf`.
    Decode { wcnf: PathBuf, solver_output: PathBuf },
}

impl Task {
    /// The corpus this task reads, if any
    pub fn corpus_dir(&self) -> Option<&Path> {
        match self {
            Task::Wcnf { corpus_dir, .. } | Task::Solve { corpus_dir, .. } => Some(corpus_dir),
            Task::Decode { .. } => None,
        }
    }
}

/// The main configuration object.
#[derive(Debug, PartialEq, Eq)]
pub struct Configuration {
    pub task: Task,

    /// The format of the per-seed coverage files.
    pub coverage_format: CoverageFormat,

    /// Whether hit counts are part of a coverage element.
    pub coverage_mode: CoverageMode,

    /// Clamp hit counts to the bucket width before deriving elements.
    pub clamp_hit_counts: bool,

    /// Optional CSV file of seed weights.
    pub weights: Option<PathBuf>,

    /// Show progress bars while reading the corpus.
    pub progress: bool,

    /// Threads for reading coverage files, 0 meaning every core.
    pub jobs: usize,

    /// Output to stdout can be formatted in human readable format or json.
    pub output_format: OutputFormat,

    /// Log level to output. This flag takes precedence over the environment variable.
    pub log_level: log::LevelFilter,

    /// Options that were given but have no effect on the chosen task, to be warned about
    /// once logging is up.
    pub ignored_options: Vec<&'static str>,
}

impl Configuration {
    /// Attempts to gather configuration from all sources. If certain required
    /// parameters are missing, the `Err` variant specifies what is missing.
    pub fn get() -> Result<&'static Self, &'static anyhow::Error> {
        CONFIGURATION.as_ref()
    }
}

impl TryFrom<PartialConfiguration> for Configuration {
    type Error = anyhow::Error;

    fn try_from(value: PartialConfiguration) -> Result<Self, Self::Error> {
        let mut ignored_options = Vec::new();
        if value.command != Some(CommandKind::Solve) {
            if value.smt_output.is_some() {
                ignored_options.push("smt_output");
            }
            if value.solver_timeout.is_some() {
                ignored_options.push("solver_timeout");
            }
        }

        let task = match value.command {
            Some(CommandKind::Decode) => {
                let Some(wcnf) = value.wcnf else {
                    bail!("No WCNF file given to decode");
                };
                let Some(solver_output) = value.solver_output else {
                    bail!("No solver output given to decode");
                };
                Task::Decode {
                    wcnf,
                    solver_output,
                }
            }
            Some(CommandKind::Wcnf) => {
                let Some(corpus_dir) = value.corpus_dir else {
                    bail!("No corpus directory given");
                };
                let Some(output) = value.output else {
                    bail!("No output file given for the WCNF instance");
                };
                Task::Wcnf { corpus_dir, output }
            }
            Some(CommandKind::Solve) | None => {
                let Some(corpus_dir) = value.corpus_dir else {
                    bail!("No corpus directory given");
                };
                if value.solver_timeout == Some(0) {
                    bail!("The solver timeout must be at least one second, omit it to disable");
                }
                Task::Solve {
                    corpus_dir,
                    smt_output: value.smt_output,
                    solver_timeout: value.solver_timeout.map(Duration::from_secs),
                }
            }
        };

        Ok(Self {
            task,
            coverage_format: value.coverage_format.unwrap_or(DEFAULT_COVERAGE_FORMAT),
            coverage_mode: if value.coverage_only.unwrap_or(false) {
                CoverageMode::CoverageOnly
            } else {
                CoverageMode::Frequency
            },
            clamp_hit_counts: value.clamp_hit_counts.unwrap_or(false),
            weights: value.weights,
            progress: value.progress.unwrap_or(false),
            jobs: value.jobs.unwrap_or(0),
            output_format: value.output_format.unwrap_or(OutputFormat::HumanReadable),
            log_level: value.log_level.unwrap_or(DEFAULT_LOG_LEVEL),
            ignored_options,
        })
    }
}

impl PartialConfiguration {
    /// Dynamically loads configuration from the command line arguments
    /// and from any file given as `--config <NAME>`.
    /// The values from the cli are preferred if given.
    pub fn get() -> Result<Self, anyhow::Error> {
        // Parse command line arguments
        let cli_config = Cli::try_parse()?;
        // Load any configuration file
        let mut file_config = match cli_config.command.config_filename() {
            Some(filename) => PartialConfiguration::from_yaml_file(filename)?,
            None => return cli_config.command.minimizer_config(),
        };

        // Prefer cli values if present
        file_config.overwrite_from(cli_config.command.minimizer_config()?);
        Ok(file_config)
    }

    /// Loads a Configuration from a yaml file
    fn from_yaml_file(filename: &Path) -> Result<Self, anyhow::Error> {
        let file = std::fs::File::open(filename).with_context(|| {
            format!("Could not open configuration file {}", filename.display())
        })?;
        serde_yaml::from_reader(file)
            .with_context(|| format!("Invalid configuration file {}", filename.display()))
    }

    /// Overwrites `self` with the options given in other. If `other` contains
    /// None for a certain field, leaves the value from `self` in place.
    fn overwrite_from(&mut self, other: PartialConfiguration) {
        *self = PartialConfiguration {
            command: other.command.or(self.command.take()),
            corpus_dir: other.corpus_dir.or(self.corpus_dir.take()),
            output: other.output.or(self.output.take()),
            wcnf: other.wcnf.or(self.wcnf.take()),
            solver_output: other.solver_output.or(self.solver_output.take()),
            coverage_format: other.coverage_format.or(self.coverage_format.take()),
            coverage_only: other.coverage_only.or(self.coverage_only.take()),
            clamp_hit_counts: other.clamp_hit_counts.or(self.clamp_hit_counts.take()),
            weights: other.weights.or(self.weights.take()),
            progress: other.progress.or(self.progress.take()),
            jobs: other.jobs.or(self.jobs.take()),
            smt_output: other.smt_output.or(self.smt_output.take()),
            solver_timeout: other.solver_timeout.or(self.solver_timeout.take()),
            output_format: other.output_format.or(self.output_format.take()),
            log_level: other.log_level.or_else(|| self.log_level.take()),
        };
    }
}
