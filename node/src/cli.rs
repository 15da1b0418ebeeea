//! # CLI Interface
//!
//! Command-line arguments for `chainspan-node`, built with `clap` derive.
//! Every command that touches the forest takes a data directory; logging,
//! config and metrics flags are global and may appear anywhere.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Keeps an interval forest of block headers on disk.
///
/// Headers are stored as pending, linked into the forest by repeated
/// organizer passes, and can then be compared for ancestry in O(1).
#[derive(Parser, Debug)]
#[command(
    name = "chainspan-node",
    about = "Block organizer backed by an interval forest",
    version,
    propagate_version = true
)]
pub struct ChainspanCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Default tracing filter. `RUST_LOG` takes precedence when set.
    #[arg(long, global = true, env = "CHAINSPAN_LOG", default_value = "info")]
    pub log_level: String,

    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, default_value = "pretty")]
    pub log_format: String,

    /// Organizer config file (JSON). Defaults apply when omitted.
    #[arg(long, short = 'c', global = true, env = "CHAINSPAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print organizer metrics in Prometheus text format when done.
    #[arg(long, global = true)]
    pub metrics: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the forest database and store its root block.
    Init(InitArgs),
    /// Store headers from a file as pending, then organize.
    Ingest(IngestArgs),
    /// Run organizer passes until the forest settles.
    Organize(StoreArgs),
    /// Print how two linked blocks relate.
    Relation(RelationArgs),
    /// Print forest statistics and the current tips.
    Status(StoreArgs),
    /// Print version information and exit.
    Version,
}

/// Location of the forest database.
#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Data directory holding the sled database. Created if missing.
    #[arg(long, short = 'd', env = "CHAINSPAN_DATA_DIR", default_value = "./chainspan-data")]
    pub data_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Root block hash, 64 hex characters.
    #[arg(long, conflicts_with = "genesis_label", required_unless_present = "genesis_label")]
    pub genesis: Option<String>,

    /// Derive the root hash from a text label (BLAKE3).
    #[arg(long)]
    pub genesis_label: Option<String>,
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Headers file: one `<hash> <prev-hash>` pair per line, hex encoded.
    /// Blank lines and lines starting with `#` are skipped.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct RelationArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// First block hash (hex).
    pub a: String,

    /// Second block hash (hex).
    pub b: String,
}
