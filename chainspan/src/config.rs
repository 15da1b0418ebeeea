//! # Organizer Configuration & Constants
//!
//! Fixed parameters of the forest live here as constants. The only knob
//! that is tunable at runtime is how many organizer passes a settle run may
//! take, which lives in [`OrganizerConfig`] and can be loaded from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Hashes
// ---------------------------------------------------------------------------

/// Length of a block hash in bytes.
pub const HASH_LENGTH: usize = 32;

/// Length of a block hash rendered as hex.
pub const HASH_HEX_LENGTH: usize = HASH_LENGTH * 2;

// ---------------------------------------------------------------------------
// Organizer
// ---------------------------------------------------------------------------

/// Default cap on passes for a single settle run.
///
/// Each pass links one more level of an unresolved backlog and completes at
/// most one fork reservation per pending block, so this covers backlogs far
/// deeper than a node normally sees between two organize calls.
pub const DEFAULT_MAX_PASSES: usize = 10_000;

/// Depth assigned to a root record.
pub const ROOT_DEPTH: u64 = 0;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// sled tree holding `bincode(BlockRecord)` keyed by big-endian block id.
pub const RECORDS_TREE: &str = "records";

/// sled tree mapping a block hash to its big-endian block id.
pub const HASH_INDEX_TREE: &str = "hash_index";

/// sled tree for counters and other bookkeeping.
pub const METADATA_TREE: &str = "metadata";

/// Metadata key holding the next block id to hand out.
pub const META_NEXT_ID: &[u8] = b"next_block_id";

// ---------------------------------------------------------------------------
// OrganizerConfig
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating an [`OrganizerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime settings for the organizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OrganizerConfig {
    /// Upper bound on passes performed by `Organizer::organize_until_settled`.
    pub max_passes: usize,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl OrganizerConfig {
    /// Parse a config from a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Reject settings the organizer cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_passes == 0 {
            return Err(ConfigError::Invalid("max-passes must be at least 1".into()));
        }
        Ok(())
    }
}
