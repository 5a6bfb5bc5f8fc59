//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then a TOML file,
//! then `OBD_DIAG__`-prefixed environment variables
//! (e.g. `OBD_DIAG__ADAPTER__DEVICE=/dev/ttyUSB0`).

use config::{Config, ConfigError, Environment, File};
use dtc_catalog::ResolverConfig;
use obd_protocol::{InitPolicy, ObdProtocol, SessionConfig, DEFAULT_BAUD_RATE};
use obd_scheduler::PollerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_NAME: &str = "obd-diag";

/// Adapter connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Serial device (RFCOMM binding or USB tty)
    pub device: String,
    pub baud_rate: u32,
    pub protocol: ObdProtocol,
    pub init_policy: InitPolicy,
    pub init_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            device: session.device,
            baud_rate: DEFAULT_BAUD_RATE,
            protocol: session.protocol,
            init_policy: session.init_policy,
            init_delay_ms: session.init_delay_ms,
            settle_delay_ms: session.settle_delay_ms,
            read_timeout_ms: session.read_timeout_ms,
        }
    }
}

/// Code table locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablesConfig {
    /// Directory of `<brand>.json` files
    pub brand_dir: PathBuf,
    /// Extra generic descriptions merged over the built-in ones
    pub generic_file: Option<PathBuf>,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            brand_dir: ResolverConfig::default().table_dir,
            generic_file: None,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub adapter: AdapterConfig,
    pub tables: TablesConfig,
    /// Manufacturer query command per brand
    pub brand_queries: HashMap<String, String>,
    /// Live view refresh interval
    pub poll_interval_ms: Option<u64>,
}

impl AppConfig {
    /// Load defaults, file and environment
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(file)
            .add_source(Environment::with_prefix("OBD_DIAG").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            device: self.adapter.device.clone(),
            baud_rate: self.adapter.baud_rate,
            protocol: self.adapter.protocol,
            init_policy: self.adapter.init_policy,
            init_delay_ms: self.adapter.init_delay_ms,
            settle_delay_ms: self.adapter.settle_delay_ms,
            read_timeout_ms: self.adapter.read_timeout_ms,
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            table_dir: self.tables.brand_dir.clone(),
            queries: self.brand_queries.clone(),
            simulation_seed: None,
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        let defaults = PollerConfig::default();
        PollerConfig {
            interval: self
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            ..defaults
        }
    }
}
