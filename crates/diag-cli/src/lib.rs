//! OBD-II Diagnostics Front End
//!
//! Configuration, logging and the command implementations behind the
//! `obd-diag` binary.

pub mod commands;
mod config;
pub mod output;

pub use crate::config::{AdapterConfig, AppConfig, TablesConfig, DEFAULT_CONFIG_NAME};

use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging to stderr
///
/// `RUST_LOG` wins when set; otherwise INFO, or DEBUG when `verbose`.
pub fn init_logging(verbose: bool) -> Result<(), SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}
