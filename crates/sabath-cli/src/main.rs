//! SABATH - surrogate model benchmark harness CLI
//!
//! ## Commands
//!
//! - `run`: fetch, set up and run a model, producing a report directory
//! - `setup`: fetch and set up a model without running it
//! - `download`: fetch a dataset into the cache
//! - `list`: list models or datasets in the catalog
//! - `status`: show the cache state of a model or dataset

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};

use sabath_core::{
    init_tracing, CleanupPolicy, EntityKind, HarnessConfig, LogSettings, Report, SabathError,
};

#[derive(Parser)]
#[command(name = "sabath")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SABATH: a platform for running ML surrogate models", long_about = None)]
struct Cli {
    /// Install root holding the `db/` descriptor catalog (default: current directory)
    #[arg(long, global = true, env = "SABATH_DIR")]
    root: Option<PathBuf>,

    /// Cache directory for models and datasets (default: <root>/.sabath)
    #[arg(long, global = true, env = "SABATH_CACHE")]
    cache: Option<PathBuf>,

    /// Remove partially fetched directories recursively when a fetch fails
    #[arg(long, global = true)]
    purge_failed: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a model, producing a report
    Run {
        /// Model id (a file in db/models)
        model: String,

        /// Report directory (default: ./report-<model>-<timestamp>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch and set up a model without running it
    Setup {
        /// Model id
        model: String,
    },

    /// Fetch a dataset into the cache
    Download {
        /// Dataset id (a file in db/datasets)
        dataset: String,
    },

    /// List catalog entries
    List {
        #[arg(value_enum, default_value = "models")]
        kind: KindArg,
    },

    /// Show the cache state of an entity
    Status {
        /// Model or dataset id
        id: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Models,
    Datasets,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Models => EntityKind::Model,
            KindArg::Datasets => EntityKind::Dataset,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log = LogSettings {
        json: cli.json,
        level: if cli.verbose { Level::DEBUG } else { Level::INFO },
    };
    init_tracing(log);

    let cleanup = if cli.purge_failed {
        CleanupPolicy::Recursive
    } else {
        CleanupPolicy::EmptyOnly
    };
    let config = HarnessConfig::resolve(cli.root, cli.cache)
        .context("Failed to resolve install root")?
        .with_cleanup(cleanup)
        .with_log(log);

    std::fs::create_dir_all(&config.cache)
        .with_context(|| format!("Failed to create cache directory {:?}", config.cache))?;
    info!(root = %config.root.display(), cache = %config.cache.display(), "SABATH initialized");

    match cli.command {
        Commands::Run { model, output } => cmd_run(&config, &model, output.as_deref()),
        Commands::Setup { model } => cmd_setup(&config, &model),
        Commands::Download { dataset } => cmd_download(&config, &dataset),
        Commands::List { kind } => cmd_list(&config, kind.into()),
        Commands::Status { id } => cmd_status(&config, &id),
    }
}

/// Attach a catalog hint to unknown-entity errors.
fn with_catalog_hint(err: SabathError) -> anyhow::Error {
    match &err {
        SabathError::UnknownEntity { kind, .. } => {
            let hint = format!("try something in `./db/{}`", kind.catalog_dir());
            anyhow::Error::new(err).context(hint)
        }
        _ => anyhow::Error::new(err),
    }
}

/// Run a model end to end and write its report.
fn cmd_run(config: &HarnessConfig, model_id: &str, output: Option<&Path>) -> Result<()> {
    let (model, dataset) = config
        .catalog()
        .load_run_inputs(model_id)
        .map_err(with_catalog_hint)?;

    let dest = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| Report::default_destination(model_id));
    let report = Report::new(config.clone(), &dest, model, dataset);
    let dest = report.dest().to_path_buf();

    let summary = report
        .run()
        .with_context(|| format!("Run of '{}' failed; see {:?}", model_id, dest))?;

    println!("Report: {}", summary.dest.display());
    println!("Duration: {} ms", summary.duration_ms);
    if let Some(rev) = &summary.model_revision {
        println!("Model revision: {}", rev);
    }
    Ok(())
}

/// Fetch and set up a model.
fn cmd_setup(config: &HarnessConfig, model_id: &str) -> Result<()> {
    let model = config
        .catalog()
        .load_model(model_id)
        .map_err(with_catalog_hint)?;
    let dir = config
        .setup_stage()
        .ensure_setup(&model)
        .with_context(|| format!("Setup of '{}' failed", model_id))?;
    println!("{}", dir.display());
    Ok(())
}

/// Fetch a dataset.
fn cmd_download(config: &HarnessConfig, dataset_id: &str) -> Result<()> {
    let dataset = config
        .catalog()
        .load_dataset(dataset_id)
        .map_err(with_catalog_hint)?;
    let dir = config
        .setup_stage()
        .fetcher()
        .fetch(&dataset)
        .with_context(|| format!("Download of '{}' failed", dataset_id))?;
    println!("{}", dir.display());
    Ok(())
}

fn cmd_list(config: &HarnessConfig, kind: EntityKind) -> Result<()> {
    let cache = config.cache_locator();
    for id in config.catalog().list(kind)? {
        println!("{:<32} {}", id, cache.state(&id));
    }
    Ok(())
}

fn cmd_status(config: &HarnessConfig, id: &str) -> Result<()> {
    sabath_core::descriptor::validate_id(id)?;
    let cache = config.cache_locator();
    let output = serde_json::json!({
        "id": id,
        "dir": cache.locate(id),
        "state": cache.state(id),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_globals() {
        let cli = Cli::try_parse_from([
            "sabath",
            "--cache",
            "/scratch/cache",
            "--purge-failed",
            "run",
            "CloudMask-0",
            "-o",
            "out",
        ])
        .unwrap();
        assert_eq!(cli.cache, Some(PathBuf::from("/scratch/cache")));
        assert!(cli.purge_failed);
        match cli.command {
            Commands::Run { model, output } => {
                assert_eq!(model, "CloudMask-0");
                assert_eq!(output, Some(PathBuf::from("out")));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn unknown_model_gets_catalog_hint() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HarnessConfig::new(tmp.path());
        let err = cmd_run(&config, "nope", None).unwrap_err();
        assert!(format!("{err:#}").contains("db/models"));
    }

    #[test]
    fn status_rejects_path_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HarnessConfig::new(tmp.path());
        assert!(cmd_status(&config, "../x").is_err());
        assert!(cmd_status(&config, "M1").is_ok());
    }
}
