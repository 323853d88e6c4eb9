//! Tracing setup for the CLI and for individual reports.
//!
//! [`init_tracing`] installs the process-wide console subscriber.
//! [`report_dispatch`] builds a subscriber that additionally writes to a
//! report's `log.txt`; the orchestrator installs it as the thread default for
//! the duration of a run.

use std::fs::File;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{Dispatch, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Console and file logging preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Emit newline-delimited JSON instead of text.
    pub json: bool,
    /// Default verbosity when `RUST_LOG` is not set.
    #[serde(with = "level_name")]
    pub level: Level,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            json: false,
            level: Level::INFO,
        }
    }
}

mod level_name {
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(level.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Level, D::Error> {
        let name = String::deserialize(d)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Initialise the global tracing subscriber.
///
/// Respects `RUST_LOG`; falls back to `settings.level`. Only the first call
/// takes effect.
pub fn init_tracing(settings: LogSettings) {
    if settings.json {
        tracing_subscriber::registry()
            .with(env_filter(settings.level))
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter(settings.level))
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

/// Console output plus a plain-text copy written to `log_file`.
///
/// `RUST_LOG` only narrows the console. The file layer records at
/// `settings.level`, never less verbose than INFO, so stage messages always
/// reach `log.txt`. It never uses ANSI colours.
pub fn report_dispatch(settings: LogSettings, log_file: File) -> Dispatch {
    build_report_dispatch(settings, env_filter(settings.level), log_file)
}

fn build_report_dispatch(settings: LogSettings, console: EnvFilter, log_file: File) -> Dispatch {
    let file_level = LevelFilter::from_level(settings.level.max(Level::INFO));
    let log_file = Arc::new(log_file);

    if settings.json {
        Dispatch::new(
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .json()
                        .with_filter(console),
                )
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(log_file)
                        .with_filter(file_level),
                ),
        )
    } else {
        Dispatch::new(
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(false).with_filter(console))
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(log_file)
                        .with_filter(file_level),
                ),
        )
    }
}
