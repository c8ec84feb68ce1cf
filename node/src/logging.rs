//! # Structured Logging
//!
//! One `tracing` subscriber for the whole node. CertiChain crates log at
//! the level picked on the command line; third-party crates get fixed
//! levels. `RUST_LOG`, when set, replaces the defaults.
//!
//! Output goes to stderr so `init` and `reconcile` can print their results
//! on stdout.

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose level follows `--log-level`.
const NODE_CRATES: [&str; 3] = [
    "certichain_node",
    "certichain_protocol",
    "certichain_contracts",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Multi-line, colored, with source locations. For a terminal.
    Pretty,
    /// One line per event.
    Compact,
    /// JSON lines with event fields flattened to the top level.
    Json,
}

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives: Vec<String> = NODE_CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect();
    directives.push("tower_http=info".into());
    directives.push("sled=warn".into());
    directives.join(",")
}

fn env_filter(level: Level) -> Result<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(spec) if !spec.trim().is_empty() => {
            EnvFilter::try_new(&spec).with_context(|| format!("invalid RUST_LOG '{spec}'"))
        }
        _ => EnvFilter::try_new(default_directives(level))
            .context("invalid default log directives"),
    }
}

/// Installs the global subscriber. Fails if `RUST_LOG` does not parse or a
/// subscriber is already installed.
pub fn init_logging(format: LogFormat, level: Level) -> Result<()> {
    let filter = env_filter(level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    tracing::debug!(?format, %level, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_follow_level_for_node_crates() {
        let directives = default_directives(Level::DEBUG);
        for krate in NODE_CRATES {
            assert!(directives.contains(&format!("{krate}=debug")), "{directives}");
        }
        assert!(directives.contains("tower_http=info"));
        assert!(directives.contains("sled=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn format_names_parse() {
        assert_eq!(LogFormat::from_str("json", true).unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("Compact", true).unwrap(), LogFormat::Compact);
        assert!(LogFormat::from_str("yaml", true).is_err());
    }
}
