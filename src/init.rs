use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::env::{env_or, LOG_FORMAT_ENV};
use crate::error::InitError;

/// Local logging configuration.
///
/// **Fields**
/// - `filter`: `EnvFilter` directives used when `RUST_LOG` is unset.
/// - `json`: emit one JSON object per line instead of the human format;
///   the right choice when a log collector parses stdout.
/// - `with_target`: include the event target in each line.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Defaults, with `LOG_FORMAT=json` selecting the JSON formatter.
    pub fn from_env() -> Self {
        Self {
            json: env_or(LOG_FORMAT_ENV, "text").eq_ignore_ascii_case("json"),
            ..Self::default()
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// **Parameters**
/// - `config`: [`LoggingConfig`] selecting filter and output format.
///
/// **Effects**
///
/// Installs a [`Registry`] with an [`EnvFilter`] (from `RUST_LOG`, else
/// `config.filter`) and a `fmt` layer as the global default subscriber.
/// Calling it a second time returns [`InitError::AlreadyInstalled`].
pub fn init_logging(config: LoggingConfig) -> Result<(), InitError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)?,
    };

    // Two concrete subscriber types, one per formatter.
    if config.json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(config.with_target);
        Registry::default().with(filter).with(fmt_layer).try_init()?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(config.with_target);
        Registry::default().with(filter).with(fmt_layer).try_init()?;
    }
    Ok(())
}

/// Install a test-friendly subscriber; repeated calls are harmless.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
