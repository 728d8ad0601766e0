//! Ontograph CLI
//!
//! Command-line access to a topic ontology:
//! - Lifecycle: `setup`, `update`, `version`, `build`
//! - Queries: `label`, `broaders`, `descendants`, `climb`, `stem`, `similar`
//!
//! Configuration comes from `--config`, else `./ontograph.toml`, else the
//! built-in defaults. `--data-dir` overrides whatever the file says.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use ontograph_storage::{
    LoadedOntology, OntologyStore, SetupOutcome, StorageConfig, UpdateOutcome, VersionStatus,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod query;

const DEFAULT_CONFIG_FILE: &str = "ontograph.toml";

#[derive(Parser)]
#[command(name = "ontograph")]
#[command(author, version, about = "Ontograph: academic topic ontology queries")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// TOML configuration file (default: ./ontograph.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the relation source, snapshot and state file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and build the ontology if no snapshot exists yet
    Setup,

    /// Rebuild from the latest remote release when it is newer
    Update {
        /// Download and rebuild even if the local version is current
        #[arg(long)]
        force: bool,
    },

    /// Compare the local ontology version with the remote one
    Version,

    /// Build the snapshot from a local relation file (no network)
    Build {
        /// Delimited triple file
        #[arg(long)]
        source: PathBuf,
        /// Version tag recorded for this build
        #[arg(long, default_value = ontograph_storage::FALLBACK_VERSION)]
        version: String,
    },

    /// Graph statistics
    Stats,

    /// Primary label and same-as cluster of a topic
    Label { topic: String },

    /// All broader topics and the depth level of a topic
    Broaders { topic: String },

    /// All narrower topics, including the topics themselves
    Descendants {
        topics: Vec<String>,
        /// Topic or topics as JSON (a string or an array of strings)
        #[arg(long, conflicts_with = "topics")]
        json_input: Option<String>,
    },

    /// Broader topics implied by a set of seed topics
    Climb {
        #[arg(required = true)]
        topics: Vec<String>,
        /// none | one-level | full-closure
        #[arg(long, default_value = "full-closure")]
        mode: String,
        /// Minimum number of supporting topics (default from config)
        #[arg(long)]
        min_support: Option<usize>,
    },

    /// Topics sharing the first four characters of a word
    Stem { word: String },

    /// Topics most similar to a term
    Similar {
        term: String,
        /// Number of results (default from config)
        #[arg(short)]
        n: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let config = resolve_config(&cli.global)?;
    let store = OntologyStore::with_http(config).context("failed to initialise remote access")?;
    let json = cli.global.json;

    match cli.command {
        Commands::Setup => cmd_setup(&store, json),
        Commands::Update { force } => cmd_update(&store, force, json),
        Commands::Version => cmd_version(&store, json),
        Commands::Build { source, version } => cmd_build(&store, &source, &version, json),
        command => {
            let loaded = store.load().context("failed to load the ontology")?;
            query::run(command, &loaded, store.config(), json)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(global: &GlobalArgs) -> Result<StorageConfig> {
    let path = match &global.config {
        Some(path) => Some(path.clone()),
        None => {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            local.exists().then_some(local)
        }
    };

    let config = match path {
        Some(path) => StorageConfig::from_file(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => StorageConfig::default(),
    };

    let config = match &global.data_dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    };
    tracing::debug!(data_dir = %config.data_dir.display(), "resolved configuration");
    Ok(config)
}

// ============================================================================
// Lifecycle Commands
// ============================================================================

fn cmd_setup(store: &OntologyStore, json: bool) -> Result<()> {
    let outcome = store.setup().context("ontology setup failed")?;
    if json {
        let value = match &outcome {
            SetupOutcome::AlreadyAvailable => serde_json::json!({ "status": "already_available" }),
            SetupOutcome::Built { version } => {
                serde_json::json!({ "status": "built", "version": version })
            }
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match outcome {
        SetupOutcome::AlreadyAvailable => println!(
            "{} nothing to do, the ontology is already available",
            "ok".green().bold()
        ),
        SetupOutcome::Built { version } => println!(
            "{} built ontology version {}",
            "ok".green().bold(),
            version.bold()
        ),
    }
    Ok(())
}

fn cmd_update(store: &OntologyStore, force: bool, json: bool) -> Result<()> {
    let outcome = store.update(force).context("ontology update failed")?;
    match outcome {
        UpdateOutcome::AlreadyUpToDate { version } => {
            if json {
                let value = serde_json::json!({ "status": "up_to_date", "version": version });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!(
                    "{} the ontology is already up to date ({})",
                    "ok".green().bold(),
                    version
                );
            }
        }
        UpdateOutcome::Updated { previous, ontology } => {
            if json {
                let value = serde_json::json!({
                    "status": "updated",
                    "previous": previous,
                    "version": ontology.version,
                    "topics": ontology.graph.topic_count(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!(
                    "{} updated {} -> {} ({} topics)",
                    "ok".green().bold(),
                    previous.as_deref().unwrap_or("none"),
                    ontology.version.bold(),
                    ontology.graph.topic_count()
                );
            }
        }
    }
    Ok(())
}

fn cmd_version(store: &OntologyStore, json: bool) -> Result<()> {
    let report = store
        .version_status()
        .context("failed to check the remote version")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let local = report.local.as_deref().unwrap_or("none");
    println!("ontology version {}", local.bold());
    match report.status {
        VersionStatus::UpToDate => println!("{} this is the latest release", "ok".green().bold()),
        VersionStatus::UpdateAvailable => println!(
            "{} version {} is available; run `ontograph update`",
            "info:".yellow().bold(),
            report.remote.bold()
        ),
        VersionStatus::AheadOfRemote => println!(
            "{} local version {} is ahead of the latest release {}",
            "warning:".red().bold(),
            local,
            report.remote
        ),
    }
    Ok(())
}

fn cmd_build(store: &OntologyStore, source: &Path, version: &str, json: bool) -> Result<()> {
    let LoadedOntology { graph, version, .. } = store
        .import(source, version)
        .with_context(|| format!("failed to build from {}", source.display()))?;
    if json {
        let value = serde_json::json!({ "version": version, "stats": graph.stats() });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        eprintln!(
            "{} {}",
            "wrote".green().bold(),
            store.config().snapshot_path().display().to_string().bold()
        );
        println!("version {version}, {} topics", graph.topic_count());
    }
    Ok(())
}
