//! Structured logging setup for programs embedding the client.
//!
//! The connection itself only emits `tracing` events; it never installs a
//! subscriber. Host programs that have no subscriber of their own can call
//! [`initialise`] once at start-up.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{EnvFilter, fmt};

use coordwire_config::{ClientConfig, LogFormat};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression did not parse.
    #[error("invalid log filter `{directive}`")]
    Filter {
        /// Filter expression as configured.
        directive: String,
        /// Parser diagnostic.
        #[source]
        source: ParseError,
    },
    /// Another global subscriber is already installed.
    #[error("failed to install telemetry subscriber")]
    Subscriber(#[source] SetGlobalDefaultError),
}

/// Installs a global `tracing` subscriber built from `config`.
///
/// Only the first successful call installs anything; later calls return a
/// fresh [`TelemetryHandle`] and leave the global subscriber alone.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] if the configured filter is invalid, or
/// [`TelemetryError::Subscriber`] if some other subscriber got there first.
///
/// # Examples
///
/// ```rust
/// use coordwire::ClientConfig;
/// use coordwire::telemetry;
///
/// # fn main() -> Result<(), coordwire::telemetry::TelemetryError> {
/// let config = ClientConfig::default().with_log_filter("coordwire=debug");
/// let _handle = telemetry::initialise(&config)?;
/// # Ok(())
/// # }
/// ```
pub fn initialise(config: &ClientConfig) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|()| TelemetryHandle)
}

fn build_filter(config: &ClientConfig) -> Result<EnvFilter, TelemetryError> {
    let directive = config.log_filter();
    EnvFilter::try_new(directive).map_err(|source| TelemetryError::Filter {
        directive: directive.to_owned(),
        source,
    })
}

fn install_subscriber(config: &ClientConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;

    let builder = |env_filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
