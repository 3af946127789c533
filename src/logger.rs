//! Timestamped, tagged console logging on two channels.
//!
//! Messages go through `tracing` under the fixed [`COMPONENT`] target. The
//! subscriber installed by [`init`] stamps each line with local wall-clock
//! time and sends warnings and errors to stderr, everything else to stdout,
//! so the two channels can be redirected independently.

use tracing::Level;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Component tag attached to every message.
pub const COMPONENT: &str = "bootstrap";

/// Timestamp format for every line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn non_blank(message: &str) -> Option<&str> {
    let trimmed = message.trim_end();
    (!trimmed.trim_start().is_empty()).then_some(trimmed)
}

/// Emits bootstrap messages. Blank or whitespace-only messages are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

impl Logger {
    /// Informational channel.
    pub fn info(&self, message: impl AsRef<str>) {
        if let Some(message) = non_blank(message.as_ref()) {
            tracing::info!(target: COMPONENT, "{}", message);
        }
    }

    /// Recoverable problems; shares the error channel.
    pub fn warn(&self, message: impl AsRef<str>) {
        if let Some(message) = non_blank(message.as_ref()) {
            tracing::warn!(target: COMPONENT, "{}", message);
        }
    }

    /// Error channel.
    pub fn error(&self, message: impl AsRef<str>) {
        if let Some(message) = non_blank(message.as_ref()) {
            tracing::error!(target: COMPONENT, "{}", message);
        }
    }
}

/// Default filter directive for the given verbosity flags.
pub fn level_for(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose == 0 {
        "info"
    } else {
        "debug"
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the flags.
pub fn init(verbose: u8, quiet: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbose, quiet)));

    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(writer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("could not install logger: {}", e))
}
