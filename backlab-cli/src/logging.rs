//! Logging setup using tracing.
//!
//! Events go to stderr so JSON reports on stdout stay machine-readable.
//! `RUST_LOG` overrides the default `info` level.

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable, multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per event, for log aggregation.
    Json,
    /// Single-line, no targets.
    Compact,
}

fn env_filter(default_level: Level) -> EnvFilter {
    let mut filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    // polars is chatty at debug level
    if let Ok(directive) = "polars=warn".parse() {
        filter = filter.add_directive(directive);
    }
    filter
}

/// Install the global subscriber. Call once, before any command runs.
pub fn init_logging(format: LogFormat, default_level: Level) {
    let filter = env_filter(default_level);
    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(false),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .compact()
                        .with_writer(std::io::stderr)
                        .with_target(false),
                )
                .init();
        }
    }
}
