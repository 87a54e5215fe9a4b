//! # File Tracker CLI (`ftrack`)
//!
//! The `ftrack` binary ingests a source tree into a deduplicated archive and
//! answers questions about what the catalog holds.
//!
//! ## Usage
//!
//! ```bash
//! ftrack --config ./config/ftrack.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ftrack init` | Create the SQLite catalog and run schema migrations |
//! | `ftrack run` | Ingest the source tree, up to the node ceiling |
//! | `ftrack stats` | Summarize catalog contents |
//! | `ftrack show <key>` | Show one content record by hash or source path |
//! | `ftrack similar <phash>` | List images with a nearby perceptual hash |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the catalog
//! ftrack init --config ./config/ftrack.toml
//!
//! # Ingest, overriding the roots from the config file
//! ftrack run --source /media/camera --dest /archive --config ./config/ftrack.toml
//!
//! # Where did this file end up?
//! ftrack show /media/camera/DCIM/IMG_0001.JPG
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use file_tracker::{config, ingest, logging, lookup, migrate, stats};

/// File Tracker CLI, a resumable, deduplicating file-ingestion archive.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ftrack.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ftrack",
    about = "File Tracker: a resumable, deduplicating file-ingestion archive",
    version,
    long_about = "File Tracker walks a source tree, fingerprints each new file, records it \
    in a SQLite catalog and copies it into a destination archive mirroring the source layout. \
    Content already archived is refused, and reruns pick up where the last one stopped."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ftrack.toml")]
    config: PathBuf,

    /// Increase diagnostic output on stderr (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the catalog schema.
    ///
    /// Creates the SQLite database file and the contents and imports
    /// tables. Running it again is safe.
    Init,

    /// Ingest the source tree into the archive.
    ///
    /// Files already imported are skipped, so a run stopped by the node
    /// ceiling or by an error continues where it left off.
    Run {
        /// Source root, overriding `archive.source_root`.
        #[arg(long)]
        source: Option<PathBuf>,

        /// Destination root, overriding `archive.dest_root`.
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Node ceiling for this run, overriding `traversal.max_nodes`.
        #[arg(long)]
        max_nodes: Option<u64>,
    },

    /// Show catalog statistics.
    Stats,

    /// Show a content record and its imports.
    Show {
        /// A content hash or an imported source path.
        key: String,
    },

    /// List images whose perceptual hash is near the given one.
    Similar {
        /// 16 hex digit perceptual hash.
        hash: String,

        /// Largest Hamming distance to report.
        #[arg(long, default_value_t = lookup::DEFAULT_MAX_DISTANCE)]
        max_distance: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let mut cfg = config::load_config(&cli.config)?;

    if let Commands::Run {
        source,
        dest,
        max_nodes,
    } = &cli.command
    {
        if let Some(source) = source {
            cfg.archive.source_root = source.clone();
        }
        if let Some(dest) = dest {
            cfg.archive.dest_root = dest.clone();
        }
        if let Some(max_nodes) = max_nodes {
            cfg.traversal.max_nodes = *max_nodes;
        }
        config::validate(&cfg)?;
    }

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Catalog initialized successfully.");
        }
        Commands::Run { .. } => {
            ingest::run_ingest(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Show { key } => {
            lookup::run_show(&cfg, &key).await?;
        }
        Commands::Similar { hash, max_distance } => {
            lookup::run_similar(&cfg, &hash, max_distance).await?;
        }
    }

    Ok(())
}
