//! # Structured Logging
//!
//! The library logs under the `chainspan` target, split by module:
//!
//! | Target                        | What it reports                             |
//! |-------------------------------|---------------------------------------------|
//! | `chainspan::forest::organizer`| pass summaries, fork reservations (`info`), |
//! |                               | each link (`debug`), pass cap (`warn`)      |
//! | `chainspan::storage::db`      | interval shifts written to sled (`trace`)   |
//! | `chainspan_node`              | config, database and command progress       |
//!
//! `--log-level` sets the level for those targets only. sled's own logging
//! stays at `warn` unless `RUST_LOG` says otherwise. Logs go to stderr:
//! stdout carries command output and the optional metrics dump.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose logs `--log-level` controls.
const OWN_TARGETS: [&str; 2] = ["chainspan", "chainspan_node"];

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

impl LogFormat {
    /// Accepts "json" or "pretty" (case-insensitive). Anything else is
    /// treated as `Pretty`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Filter directives for a `--log-level` value.
///
/// A bare level such as `debug` applies to the chainspan targets and keeps
/// everything else at `warn`. Anything containing `=` or `,` is already a
/// full directive list and is used unchanged.
pub fn filter_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    let mut directives = vec!["warn".to_string()];
    directives.extend(OWN_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

/// Install the global subscriber. Call once, early in `main()`.
///
/// `RUST_LOG` replaces the `--log-level` directives entirely when set:
///
/// ```text
/// RUST_LOG=chainspan::forest=debug,sled=info chainspan-node organize
/// ```
pub fn init_logging(level: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(level)));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(false),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(false)
                        .with_target(true),
                )
                .init();
        }
    }

    tracing::debug!(?format, level, "logging initialized");
}
