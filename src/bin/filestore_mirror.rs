use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use filestore_mirror::app::{App, MirrorOptions, ProgressSink};
use filestore_mirror::catalog::Catalog;
use filestore_mirror::config::{ConfigLoader, ResolvedConfig};
use filestore_mirror::error::MirrorError;
use filestore_mirror::output::{JsonOutput, OutputMode, StderrProgress, print_summary};
use filestore_mirror::remote::{HttpRemoteClient, Session, parse_base_url};
use filestore_mirror::store::Store;

const EXIT_ENTRIES_FAILED: u8 = 3;

#[derive(Parser)]
#[command(name = "filestore-mirror")]
#[command(about = "Download a scoped remote file store into a local directory tree")]
#[command(version, author)]
struct Cli {
    /// JSON settings file (default: ./filestore-mirror.json when present)
    #[arg(long)]
    config: Option<String>,

    /// JSON catalog listing the entries to materialize
    #[arg(long)]
    catalog: PathBuf,

    #[arg(long)]
    root: Option<Utf8PathBuf>,

    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Resolve destinations without fetching or writing anything
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    abort_on_filesystem_error: bool,

    /// Write failed and not-attempted entries as a catalog for a re-run
    #[arg(long)]
    write_failed: Option<Utf8PathBuf>,

    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<MirrorError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &MirrorError) -> u8 {
    match error {
        MirrorError::ConfigRead(_)
        | MirrorError::ConfigParse(_)
        | MirrorError::ConfigInvalid(_)
        | MirrorError::CatalogRead(_)
        | MirrorError::CatalogParse(_)
        | MirrorError::MissingApiKey(_)
        | MirrorError::InvalidScope(_)
        | MirrorError::InvalidEntry(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let config = apply_overrides(ConfigLoader::resolve(cli.config.as_deref())?, &cli)?;
    let catalog = Catalog::load(&cli.catalog)?;

    // a dry run never sends the key, so it may be absent
    let api_key = match config.api_key() {
        Ok(key) => key,
        Err(_) if cli.dry_run => String::new(),
        Err(err) => return Err(err.into()),
    };
    let session = Session::new(config.base_url.as_str(), api_key)?;
    let client = HttpRemoteClient::new(config.timeout)?;
    let app = App::new(Store::new(config.root_dir.clone()), client, session);

    let options = MirrorOptions {
        workers: config.workers,
        dry_run: cli.dry_run,
        abort_on_filesystem_error: config.abort_on_filesystem_error,
    };
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Human => &StderrProgress,
    };
    let report = app.mirror(&catalog, &options, sink)?;

    if let Some(path) = &cli.write_failed {
        report.failed_catalog().save(path)?;
    }

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Human => print_summary(&report),
    }

    if report.has_failures() {
        Ok(ExitCode::from(EXIT_ENTRIES_FAILED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn apply_overrides(mut config: ResolvedConfig, cli: &Cli) -> Result<ResolvedConfig, MirrorError> {
    if let Some(root) = &cli.root {
        config.root_dir = root.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.base_url = parse_base_url(base_url)?;
    }
    if let Some(workers) = cli.workers {
        if workers == 0 {
            return Err(MirrorError::ConfigInvalid(
                "workers must be at least 1".to_string(),
            ));
        }
        config.workers = workers;
    }
    if let Some(timeout_secs) = cli.timeout_secs {
        if timeout_secs == 0 {
            return Err(MirrorError::ConfigInvalid(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        config.timeout = std::time::Duration::from_secs(timeout_secs);
    }
    if cli.abort_on_filesystem_error {
        config.abort_on_filesystem_error = true;
    }
    Ok(config)
}
