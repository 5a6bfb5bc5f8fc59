//! OBD-II Diagnostics - Main Entry Point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diag_cli::{commands, init_logging, AppConfig};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "obd-diag")]
#[command(author, version, about = "OBD-II diagnostics over an ELM327 adapter")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path (default: ./obd-diag.toml if present)
    #[arg(short, long, env = "OBD_DIAG_CONFIG")]
    config: Option<PathBuf>,

    /// Serial device, overrides the configured one
    #[arg(short, long)]
    device: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream live sensor values
    Live {
        /// Take a single sweep and exit
        #[arg(long)]
        once: bool,
    },

    /// List the PIDs the vehicle supports
    Pids,

    /// Generic stored trouble codes
    Dtc {
        #[command(subcommand)]
        action: DtcAction,
    },

    /// Manufacturer-specific trouble codes
    Brand {
        #[command(subcommand)]
        action: BrandAction,
    },
}

#[derive(Subcommand)]
enum DtcAction {
    /// Read stored codes
    Read,
    /// Clear stored codes and the MIL
    Clear,
}

#[derive(Subcommand)]
enum BrandAction {
    /// Brands with a code table
    List,
    /// Read a brand's codes
    Read {
        brand: String,
        /// Generate codes instead of querying the vehicle
        #[arg(long)]
        simulate: bool,
    },
    /// Clear a brand's codes
    Clear {
        brand: String,
        /// Clear simulated codes only
        #[arg(long)]
        simulate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    info!("=== OBD Diagnostics v{} ===", env!("CARGO_PKG_VERSION"));

    let mut config =
        AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(device) = cli.device {
        config.adapter.device = device;
    }
    debug!("Configuration: {:?}", config);

    let json = cli.json;
    match cli.command {
        Commands::Live { once } => commands::live(&config, once, json).await,
        Commands::Pids => commands::pids(&config, json).await,
        Commands::Dtc { action } => match action {
            DtcAction::Read => commands::dtc_read(&config, json).await,
            DtcAction::Clear => commands::dtc_clear(&config).await,
        },
        Commands::Brand { action } => match action {
            BrandAction::List => commands::brand_list(&config, json),
            BrandAction::Read { brand, simulate } => {
                commands::brand_read(&config, &brand, simulate, json).await
            }
            BrandAction::Clear { brand, simulate } => {
                commands::brand_clear(&config, &brand, simulate).await
            }
        },
    }
}
