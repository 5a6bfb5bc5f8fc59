//! Command implementations

use crate::output;
use crate::AppConfig;
use anyhow::{bail, Context, Result};
use dtc_catalog::{load_generic_table, ManufacturerDtcResolver};
use obd_protocol::{ObdSession, SerialChannel};
use obd_scheduler::{LivePoller, PollerConfig};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Open and initialize the configured adapter
pub async fn open_session(config: &AppConfig) -> Result<ObdSession<SerialChannel>> {
    let session_config = config.session_config();
    let device = session_config.device.clone();

    ObdSession::connect(session_config)
        .await
        .with_context(|| format!("failed to connect to adapter on {}", device))
}

fn print<T: Serialize + ?Sized>(
    value: &T,
    json: bool,
    text: impl FnOnce(&T) -> String,
) -> Result<()> {
    if json {
        println!("{}", output::to_json(value)?);
    } else {
        print!("{}", text(value));
    }
    Ok(())
}

/// List the PIDs the vehicle reports
pub async fn pids(config: &AppConfig, json: bool) -> Result<()> {
    let mut session = open_session(config).await?;
    let result = session
        .probe_capabilities()
        .await
        .map(|supported| supported.clone())
        .context("capability probe failed");
    session.close().await;

    let supported = result?;
    print(supported.pids(), json, |_| output::format_supported(&supported))
}

/// Live parameter view, one sweep or until interrupted
pub async fn live(config: &AppConfig, once: bool, json: bool) -> Result<()> {
    let mut session = open_session(config).await?;
    let poller_config = PollerConfig {
        max_sweeps: once.then_some(1),
        ..config.poller_config()
    };
    let mut poller = LivePoller::new(poller_config);

    let (snapshot_tx, mut snapshot_rx) = mpsc::channel(4);
    let printer = async {
        while let Some(snapshot) = snapshot_rx.recv().await {
            if let Err(e) = print(&snapshot, json, output::format_snapshot) {
                warn!("Failed to render snapshot: {}", e);
            }
        }
    };
    let polling = async {
        let (result, ()) = tokio::join!(poller.run(&mut session, snapshot_tx), printer);
        result
    };

    let result = tokio::select! {
        result = polling => result.context("live polling failed"),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    };

    session.close().await;
    result
}

/// Read stored generic codes
pub async fn dtc_read(config: &AppConfig, json: bool) -> Result<()> {
    let table = load_generic_table(config.tables.generic_file.as_deref())
        .context("failed to load generic code table")?;

    let mut session = open_session(config).await?;
    let result = session
        .read_stored_codes(&table)
        .await
        .context("reading stored codes failed");
    session.close().await;

    let codes = result?;
    print(codes.as_slice(), json, output::format_codes)
}

/// Clear stored codes and the MIL
pub async fn dtc_clear(config: &AppConfig) -> Result<()> {
    let mut session = open_session(config).await?;
    let result = session
        .clear_stored_codes()
        .await
        .context("clearing stored codes failed");
    session.close().await;

    if !result? {
        bail!("adapter did not confirm the clear");
    }
    println!("Trouble codes cleared");
    Ok(())
}

/// Brands with a manufacturer table
pub fn brand_list(config: &AppConfig, json: bool) -> Result<()> {
    let resolver = ManufacturerDtcResolver::new(config.resolver_config());
    let brands = resolver.available_brands();
    print(brands.as_slice(), json, output::format_brands)
}

/// Manufacturer codes for `brand`, from the vehicle or simulated
pub async fn brand_read(config: &AppConfig, brand: &str, simulate: bool, json: bool) -> Result<()> {
    let mut resolver = ManufacturerDtcResolver::new(config.resolver_config());

    let codes = if simulate {
        resolver.read_simulated(brand)
    } else {
        let mut session = open_session(config).await?;
        let result = resolver
            .read_live(brand, &mut session)
            .await
            .with_context(|| format!("reading {} codes failed", brand));
        session.close().await;
        result?
    };

    print(codes.as_slice(), json, output::format_codes)
}

/// Clear manufacturer codes for `brand`
pub async fn brand_clear(config: &AppConfig, brand: &str, simulate: bool) -> Result<()> {
    let mut resolver = ManufacturerDtcResolver::new(config.resolver_config());

    let cleared = if simulate {
        resolver.clear_simulated(brand)
    } else {
        let mut session = open_session(config).await?;
        let result = resolver
            .clear_live(brand, &mut session)
            .await
            .with_context(|| format!("clearing {} codes failed", brand));
        session.close().await;
        result?
    };

    if !cleared {
        bail!("adapter did not confirm the clear");
    }
    println!("{} codes cleared", brand);
    Ok(())
}
