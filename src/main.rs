// WellSleuth - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading and CLI overrides
// 3. Logging initialisation (debug mode support)
// 4. Input discovery, batch run and output

use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use wellsleuth::app::batch::{self, BatchConfig};
use wellsleuth::app::report::{self, OutputFormat};
use wellsleuth::core::discovery;
use wellsleuth::platform::config::{self, PlatformPaths};
use wellsleuth::util::error::{ExportError, WellSleuthError};
use wellsleuth::util::{constants, logging};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Csv,
    Las,
}

impl From<FormatArg> for OutputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Las => OutputFormat::Las,
        }
    }
}

/// WellSleuth - LAS well-log parsing, quality control and conditioning.
///
/// Point WellSleuth at LAS files or directories. Each file is parsed,
/// standardized, quality-checked and, when it passes the quality gate,
/// denoised and despiked.
#[derive(Parser, Debug)]
#[command(name = "wellsleuth", version, about)]
struct Cli {
    /// LAS files or directories to process.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// config.toml to use (defaults to the platform config directory).
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Write conditioned data and per-file reports to this directory.
    /// Without it, a JSON summary is printed to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Data format written to the output directory.
    #[arg(long = "format", value_enum, default_value = "las")]
    format: FormatArg,

    /// Concurrent file runs (0 = one per core).
    #[arg(short = 'j', long = "jobs")]
    jobs: Option<usize>,

    /// Per-file timeout in seconds.
    #[arg(long = "timeout")]
    timeout: Option<u64>,

    /// Skip denoising.
    #[arg(long = "no-denoise")]
    no_denoise: bool,

    /// Skip despiking.
    #[arg(long = "no-despike")]
    no_despike: bool,

    /// Enable baseline correction.
    #[arg(long = "baseline")]
    baseline: bool,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PlatformPaths::resolve().config_file());
    let (mut app_config, config_warnings) = config::load_config(&config_path);

    logging::init(cli.debug, app_config.log_level.as_deref());

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        config = %config_path.display(),
        "WellSleuth starting"
    );
    for warning in &config_warnings {
        tracing::warn!(warning = %warning, "Config warning");
    }
    if cli.config.is_some() && !config_path.exists() {
        eprintln!("Error: config file '{}' does not exist", config_path.display());
        return ExitCode::from(2);
    }

    // CLI flags override config.toml.
    let processing = &mut app_config.processing;
    if cli.no_denoise {
        processing.denoise.enabled = false;
    }
    if cli.no_despike {
        processing.despike.enabled = false;
    }
    if cli.baseline {
        processing.baseline.enabled = true;
    }
    if let Err(e) = processing.validate() {
        eprintln!("Error: invalid processing options: {e}");
        return ExitCode::from(2);
    }

    let jobs = cli.jobs.unwrap_or(app_config.jobs);
    if jobs > constants::ABSOLUTE_MAX_CONCURRENCY {
        eprintln!(
            "Error: --jobs {jobs} exceeds the maximum of {}",
            constants::ABSOLUTE_MAX_CONCURRENCY
        );
        return ExitCode::from(2);
    }
    let timeout_secs = match cli.timeout {
        Some(0) => None,
        Some(secs) => Some(secs.min(constants::MAX_FILE_TIMEOUT_SECS)),
        None => app_config.timeout_secs,
    };

    let inputs = discovery::collect_inputs(&cli.paths, &app_config.discovery);
    for warning in &inputs.warnings {
        tracing::warn!(warning = %warning, "Discovery warning");
    }
    if inputs.files.is_empty() {
        eprintln!("Error: no LAS files found in the given paths");
        return ExitCode::from(2);
    }
    let files: Vec<PathBuf> = inputs.files.into_iter().map(|f| f.path).collect();

    let outcomes = batch::run_batch(
        &files,
        Arc::new(app_config.processing),
        BatchConfig {
            jobs,
            timeout: timeout_secs.map(Duration::from_secs),
        },
    );

    let written = match &cli.output {
        Some(dir) => report::write_outputs(&outcomes, dir, cli.format.into()).map(|_| ()),
        None => print_summary(&outcomes).map_err(WellSleuthError::from),
    };
    if let Err(e) = written {
        tracing::error!(error = %e, "Failed to write outputs");
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let failed: Vec<_> = outcomes.iter().filter(|o| !o.succeeded()).collect();
    for outcome in &failed {
        eprintln!(
            "{}: {}",
            outcome.path.display(),
            outcome.error.as_deref().unwrap_or("failed")
        );
    }
    if failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_summary(outcomes: &[batch::BatchOutcome]) -> Result<(), ExportError> {
    let stdout = Path::new("<stdout>");
    let mut lock = std::io::stdout().lock();
    report::write_summary(outcomes, &mut lock, stdout)?;
    writeln!(lock).map_err(|source| ExportError::Io {
        path: stdout.to_path_buf(),
        source,
    })
}
