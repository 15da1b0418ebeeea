// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # chainspan-node
//!
//! Entry point for the `chainspan-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and runs one command against the sled
//! forest database in the data directory.
//!
//! - `init`: create the database and store the root block
//! - `ingest`: store headers from a file, then organize
//! - `organize`: run passes until the forest settles
//! - `relation`: compare two linked blocks
//! - `status`: print statistics and tips
//! - `version`: print build version information

mod cli;
mod headers;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use chainspan::{BlockHash, ForestDb, Organizer, OrganizerConfig, SettleReport};

use cli::{ChainspanCli, Commands, StoreArgs};
use logging::LogFormat;
use metrics::OrganizerMetrics;

/// Directory inside the data dir that holds the sled database.
const DB_DIR: &str = "forest";

fn main() -> Result<()> {
    let cli = ChainspanCli::parse();

    logging::init_logging(
        &cli.global.log_level,
        LogFormat::from_str_lossy(&cli.global.log_format),
    );

    let config = load_config(cli.global.config.as_deref())?;
    let metrics = OrganizerMetrics::new().context("failed to register metrics")?;

    match cli.command {
        Commands::Init(args) => {
            let genesis = match (&args.genesis, &args.genesis_label) {
                (Some(hex), _) => hex
                    .parse::<BlockHash>()
                    .context("invalid --genesis hash")?,
                (None, Some(label)) => BlockHash::digest(label.as_bytes()),
                // clap rejects a missing genesis source before we get here.
                (None, None) => anyhow::bail!("one of --genesis or --genesis-label is required"),
            };
            init_forest(&args.store, config, genesis, &metrics)?;
        }
        Commands::Ingest(args) => ingest_headers(&args.store, config, &args.file, &metrics)?,
        Commands::Organize(store) => {
            let mut organizer = open_organizer(&store, config)?;
            let report = settle(&mut organizer, &metrics)?;
            print_settle(&report);
        }
        Commands::Relation(args) => {
            let a = args.a.parse::<BlockHash>().context("invalid first hash")?;
            let b = args.b.parse::<BlockHash>().context("invalid second hash")?;
            let organizer = open_organizer(&args.store, config)?;
            let relation = organizer
                .forest()
                .relation(&a, &b)
                .context("cannot compare blocks")?;
            println!("{relation}");
        }
        Commands::Status(store) => {
            let organizer = open_organizer(&store, config)?;
            print_status(&organizer, &metrics)?;
        }
        Commands::Version => print_version(),
    }

    if cli.global.metrics {
        print!("{}", metrics.encode().context("failed to encode metrics")?);
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<OrganizerConfig> {
    let Some(path) = path else {
        return Ok(OrganizerConfig::default());
    };
    let config = OrganizerConfig::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    tracing::info!(path = %path.display(), max_passes = config.max_passes, "config loaded");
    Ok(config)
}

fn db_path(store: &StoreArgs) -> PathBuf {
    store.data_dir.join(DB_DIR)
}

/// Opens (or creates) the forest database under the data directory.
fn open_organizer(store: &StoreArgs, config: OrganizerConfig) -> Result<Organizer<ForestDb>> {
    let path = db_path(store);
    std::fs::create_dir_all(&path)
        .with_context(|| format!("failed to create data directory: {}", path.display()))?;

    let db = ForestDb::open(&path)
        .with_context(|| format!("failed to open forest database at {}", path.display()))?;
    tracing::debug!(path = %path.display(), "forest database opened");
    Ok(Organizer::with_config(db, config))
}

fn init_forest(
    store: &StoreArgs,
    config: OrganizerConfig,
    genesis: BlockHash,
    metrics: &OrganizerMetrics,
) -> Result<()> {
    let mut organizer = open_organizer(store, config)?;
    let id = organizer.add_root(genesis).context("failed to store root block")?;
    // A root can unblock headers ingested before it.
    settle(&mut organizer, metrics)?;

    let linkage = organizer
        .forest()
        .linkage(&genesis)
        .context("root block is not linked")?;

    println!("Forest initialized.");
    println!("  Data directory : {}", store.data_dir.display());
    println!("  Root block     : {genesis} ({id})");
    println!("  Chain interval : {}", linkage.interval);
    Ok(())
}

fn ingest_headers(
    store: &StoreArgs,
    config: OrganizerConfig,
    file: &Path,
    metrics: &OrganizerMetrics,
) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read headers from {}", file.display()))?;
    let headers = headers::parse_headers(&contents)
        .with_context(|| format!("malformed headers file {}", file.display()))?;

    let mut organizer = open_organizer(store, config)?;
    for header in &headers {
        organizer
            .ingest(header.hash, header.prev_hash)
            .with_context(|| format!("failed to store header {}", header.hash))?;
    }
    tracing::info!(count = headers.len(), file = %file.display(), "headers stored");

    let report = settle(&mut organizer, metrics)?;

    println!("Ingested {} headers.", headers.len());
    print_settle(&report);
    Ok(())
}

fn settle(organizer: &mut Organizer<ForestDb>, metrics: &OrganizerMetrics) -> Result<SettleReport> {
    let report = organizer
        .organize_until_settled()
        .context("organizer pass failed")?;
    metrics.record_settle(&report);
    metrics.observe(&organizer.forest().stats()?);
    organizer.store().flush().context("failed to flush database")?;
    Ok(report)
}

fn print_settle(report: &SettleReport) {
    println!("  Passes         : {}", report.passes);
    println!("  Linked         : {}", report.linked);
    println!("  Forks reserved : {}", report.forks_reserved);
    println!("  Still pending  : {}", report.still_pending);
    if !report.settled {
        println!("  (pass cap reached; run `organize` again)");
    }
}

fn print_status(organizer: &Organizer<ForestDb>, metrics: &OrganizerMetrics) -> Result<()> {
    let forest = organizer.forest();
    let stats = forest.stats().context("failed to read forest statistics")?;
    metrics.observe(&stats);

    println!("Blocks    : {} ({} linked, {} pending)", stats.total, stats.linked, stats.pending);
    println!("Roots     : {}", stats.roots);
    match stats.max_depth {
        Some(depth) => println!("Max depth : {depth}"),
        None => println!("Max depth : -"),
    }
    println!("Tips      : {}", stats.tips);
    for tip in forest.tips().context("failed to list tips")? {
        let Some(linkage) = tip.linkage else {
            continue;
        };
        println!(
            "  {}  depth {:>6}  chain {}",
            tip.hash, linkage.depth, linkage.interval
        );
    }
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("chainspan-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
