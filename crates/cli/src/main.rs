// tlr - headless trace-link recovery and inconsistency detection

mod exit_codes;
mod holdback;
mod trace;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracelink_engine::{EngineError, PipelineConfig};
use tracelink_io::IoError;
use tracing_subscriber::EnvFilter;

use exit_codes::{
    EXIT_ERROR, EXIT_INPUT_PARSE, EXIT_INVALID_CONFIG, EXIT_PIPELINE, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "tlr")]
#[command(about = "Recover trace links between documentation and models, and report where they disagree")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Log progress to stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over one text and one or more models
    #[command(after_help = "\
Examples:
  tlr run --text doc.json --model arch.json
  tlr run --text doc.json --model arch.json --model code.json --json
  tlr run --text doc.json --model arch.json --config tuned.toml --output report.json
  tlr run --text doc.json --model arch.json --links-csv links.csv --gold goldstandard.csv")]
    Run(trace::RunArgs),

    /// Re-run once per model element with that element removed and score
    /// how well its mentions surface as unmatched text references
    #[command(after_help = "\
Examples:
  tlr holdback --text doc.json --model arch.json --gold goldstandard.csv
  tlr holdback --text doc.json --model arch.json --gold goldstandard.csv --json --min-f1 0.6")]
    Holdback {
        /// Annotated text document (JSON)
        #[arg(long)]
        text: PathBuf,

        /// Model document (JSON)
        #[arg(long)]
        model: PathBuf,

        /// Gold standard (CSV: modelElementID,sentence)
        #[arg(long)]
        gold: PathBuf,

        /// Pipeline configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the evaluation as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Fail with exit code 6 if the weighted F1 is below this value
        #[arg(long)]
        min_f1: Option<f64>,
    },

    /// Check a pipeline configuration without running
    #[command(after_help = "\
Examples:
  tlr validate tuned.toml
  tlr validate tuned.toml --json")]
    Validate {
        /// Path to the TOML configuration
        config: PathBuf,

        /// Print the effective configuration (defaults filled in) as JSON
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  tracelink-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

/// Diagnostics go to stderr so stdout stays a clean JSON channel.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => trace::cmd_run(args),
        Commands::Holdback {
            text,
            model,
            gold,
            config,
            json,
            min_f1,
        } => holdback::cmd_holdback(text, model, gold, config, json, min_f1),
        Commands::Validate { config, json } => trace::cmd_validate(config, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        let code = match &err {
            e if e.is_parse_error() => EXIT_INPUT_PARSE,
            IoError::Read { .. } => EXIT_USAGE,
            _ => EXIT_ERROR,
        };
        Self::new(code, err.to_string())
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match &err {
            EngineError::ConfigParse(_) | EngineError::ConfigValidation(_) => {
                Self::new(EXIT_INVALID_CONFIG, err.to_string())
                    .with_hint("run `tlr validate <config>` for details")
            }
            EngineError::AmbiguousMerge { .. } | EngineError::LostMergeTarget { .. } => {
                Self::new(EXIT_PIPELINE, err.to_string())
                    .with_hint("re-run with -vv to see the merge history")
            }
            _ => Self::new(EXIT_PIPELINE, err.to_string()),
        }
    }
}

/// Read and validate the pipeline config, or fall back to the defaults.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, CliError> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let source = std::fs::read_to_string(path)
        .map_err(|e| CliError::usage(format!("cannot read config {}: {e}", path.display())))?;
    PipelineConfig::from_toml(&source).map_err(|e| {
        CliError::new(EXIT_INVALID_CONFIG, format!("{}: {e}", path.display()))
    })
}
