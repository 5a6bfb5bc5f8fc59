//! Manufacturer-specific trouble codes (mode 22)
//!
//! The live decode is approximate: manufacturers encode these answers in
//! their own ways, so tokens after the two-token header are read in pairs
//! and folded into `P`-prefixed codes. Treat results as a hint, not a
//! certified reading.

use crate::brand::BrandKey;
use crate::simulation::SimulatedBrandState;
use crate::tables::BrandTables;
use obd_protocol::{
    frame_payloads, is_clear_success, AdapterChannel, CodeTable, ObdError, TroubleCode,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Query sent when a brand has no specific command configured
pub const DEFAULT_BRAND_QUERY: &str = "22 F190";

/// Adapter answer meaning the ECU had nothing to report
pub const NO_DATA_MARKER: &str = "NO DATA";

/// Description for codes missing from a brand table
pub const UNKNOWN_CODE_DESCRIPTION: &str = "Unknown code";

/// Service echo and data identifier precede the code bytes
const HEADER_TOKENS: usize = 2;

/// Resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Directory holding `<brand>.json` tables
    pub table_dir: PathBuf,
    /// Brand-specific query commands, keyed by brand name
    pub queries: HashMap<String, String>,
    /// Seed for simulated draws; entropy when unset
    pub simulation_seed: Option<u64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            table_dir: PathBuf::from("assets/manufacturer_specific_dtc"),
            queries: HashMap::new(),
            simulation_seed: None,
        }
    }
}

/// Positive response echo to a mode 22 request
const POSITIVE_RESPONSE_MARKER: &str = "62";

/// Hex digits of the data identifier following the echo
const IDENTIFIER_DIGITS: usize = 4;

fn brand_code(digits: &str, table: &CodeTable) -> TroubleCode {
    let code = format!("P{}", digits.to_ascii_uppercase());
    let description = table.describe(&code, UNKNOWN_CODE_DESCRIPTION).to_string();
    TroubleCode { code, description }
}

/// Fold a mode 22 answer into codes described from `table`
///
/// Spaced answers (`62 F190 01 23`) are read token by token: the two header
/// tokens are skipped and the rest paired. Compact answers, as the adapter
/// prints them with spaces off (`62F1900123`, possibly behind a bus header),
/// are read per frame: echo and identifier are skipped and the rest cut into
/// four-digit groups. Either way an incomplete trailing group is dropped.
pub fn decode_brand_response(response: &str, table: &CodeTable) -> Vec<TroubleCode> {
    let spaced = response
        .split(['\r', '\n'])
        .any(|line| line.split_whitespace().nth(1).is_some());
    if spaced {
        decode_spaced(response, table)
    } else {
        decode_compact(response, table)
    }
}

fn decode_spaced(response: &str, table: &CodeTable) -> Vec<TroubleCode> {
    let tokens: Vec<&str> = response.split_whitespace().collect();
    if tokens.len() <= HEADER_TOKENS {
        return Vec::new();
    }

    tokens[HEADER_TOKENS..]
        .chunks_exact(2)
        .filter_map(|pair| {
            let digits = pair.concat();
            if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                debug!("Skipping non-hex pair {:?}", pair);
                return None;
            }
            let low = &digits[digits.len().saturating_sub(4)..];
            Some(brand_code(low, table))
        })
        .collect()
}

fn decode_compact(response: &str, table: &CodeTable) -> Vec<TroubleCode> {
    let mut codes = Vec::new();
    for frame in frame_payloads(response, POSITIVE_RESPONSE_MARKER) {
        let Some(data) = frame.get(IDENTIFIER_DIGITS..) else {
            continue;
        };
        for group in data.as_bytes().chunks_exact(4) {
            match std::str::from_utf8(group) {
                Ok(digits) if digits.bytes().all(|b| b.is_ascii_hexdigit()) => {
                    codes.push(brand_code(digits, table))
                }
                _ => debug!("Skipping non-hex group {:?}", group),
            }
        }
    }
    codes
}

/// Reads and clears manufacturer-specific codes for one session
///
/// With a channel the adapter is asked; without one the answers come from
/// the session's [`SimulatedBrandState`].
#[derive(Debug)]
pub struct ManufacturerDtcResolver {
    tables: BrandTables,
    simulation: SimulatedBrandState,
    queries: HashMap<BrandKey, String>,
}

impl ManufacturerDtcResolver {
    pub fn new(config: ResolverConfig) -> Self {
        let simulation = match config.simulation_seed {
            Some(seed) => SimulatedBrandState::with_seed(seed),
            None => SimulatedBrandState::new(),
        };
        Self::from_parts(BrandTables::new(config.table_dir), simulation)
            .with_queries(config.queries)
    }

    /// Assemble from already built tables and simulation store
    pub fn from_parts(tables: BrandTables, simulation: SimulatedBrandState) -> Self {
        Self {
            tables,
            simulation,
            queries: HashMap::new(),
        }
    }

    /// Override query commands per brand
    pub fn with_queries(mut self, queries: HashMap<String, String>) -> Self {
        self.queries.extend(
            queries
                .into_iter()
                .map(|(brand, command)| (BrandKey::new(&brand), command)),
        );
        self
    }

    /// Command used to ask for `brand`'s codes
    pub fn query_for(&self, brand: &str) -> &str {
        self.queries
            .get(&BrandKey::new(brand))
            .map(String::as_str)
            .unwrap_or(DEFAULT_BRAND_QUERY)
    }

    /// Description table for `brand` (empty if none)
    pub fn table(&mut self, brand: &str) -> &CodeTable {
        self.tables.table(&BrandKey::new(brand))
    }

    /// Brands with a table file
    pub fn available_brands(&self) -> Vec<String> {
        self.tables.available_brands()
    }

    /// Read codes, live when a channel is given, simulated otherwise
    pub async fn read_codes(
        &mut self,
        brand: &str,
        channel: Option<&mut dyn AdapterChannel>,
    ) -> Result<Vec<TroubleCode>, ObdError> {
        match channel {
            Some(channel) => self.read_live(brand, channel).await,
            None => Ok(self.read_simulated(brand)),
        }
    }

    /// Ask the adapter for `brand`'s codes
    ///
    /// Brands without a table are answered empty without touching the
    /// channel. The answer is not validated beyond the `NO DATA` check.
    pub async fn read_live<C>(
        &mut self,
        brand: &str,
        channel: &mut C,
    ) -> Result<Vec<TroubleCode>, ObdError>
    where
        C: AdapterChannel + ?Sized,
    {
        let key = BrandKey::new(brand);
        let command = self.query_for(brand).to_string();
        let table = self.tables.table(&key);
        if table.is_empty() {
            info!("No code table for {}, skipping manufacturer query", key);
            return Ok(Vec::new());
        }

        let response = channel.send_and_receive(&command).await?;
        if response.to_ascii_uppercase().contains(NO_DATA_MARKER) {
            debug!("{} answered {}", key, NO_DATA_MARKER);
            return Ok(Vec::new());
        }

        let codes = decode_brand_response(&response, table);
        info!("Read {} manufacturer codes for {}", codes.len(), key);
        Ok(codes)
    }

    /// Simulated codes for `brand`, stable until cleared
    pub fn read_simulated(&mut self, brand: &str) -> Vec<TroubleCode> {
        let key = BrandKey::new(brand);
        let table = self.tables.table(&key);
        self.simulation
            .read(&key, table)
            .iter()
            .map(|code| TroubleCode {
                code: code.clone(),
                description: table.describe(code, UNKNOWN_CODE_DESCRIPTION).to_string(),
            })
            .collect()
    }

    /// Clear codes, live when a channel is given, simulated otherwise
    pub async fn clear_codes(
        &mut self,
        brand: &str,
        channel: Option<&mut dyn AdapterChannel>,
    ) -> Result<bool, ObdError> {
        match channel {
            Some(channel) => self.clear_live(brand, channel).await,
            None => Ok(self.clear_simulated(brand)),
        }
    }

    /// Send the generic mode 04 clear on behalf of `brand`
    pub async fn clear_live<C>(&mut self, brand: &str, channel: &mut C) -> Result<bool, ObdError>
    where
        C: AdapterChannel + ?Sized,
    {
        let response = channel
            .send_and_receive(obd_protocol::CLEAR_CODES_COMMAND)
            .await?;
        let cleared = is_clear_success(&response);
        if !cleared {
            warn!("Clear for {} not confirmed: {:?}", brand, response.trim());
        }
        Ok(cleared)
    }

    /// Reset simulated codes; always acknowledged
    pub fn clear_simulated(&mut self, brand: &str) -> bool {
        let key = BrandKey::new(brand);
        self.simulation.clear(&key);
        info!("Cleared simulated codes for {}", key);
        true
    }

    /// Whether simulation currently holds codes for `brand`
    pub fn has_active_codes(&self, brand: &str) -> bool {
        self.simulation.has_active_codes(&BrandKey::new(brand))
    }
}
