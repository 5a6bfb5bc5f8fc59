//! Simulated manufacturer codes
//!
//! Without an adapter, each brand gets zero to two codes drawn from its
//! table on first read. The draw is remembered for the lifetime of this
//! store so repeated reads agree until the brand is cleared.

use crate::brand::BrandKey;
use obd_protocol::CodeTable;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::{debug, info};

/// Largest number of codes one brand can get
const MAX_SIMULATED_CODES: usize = 2;

/// Per-session memory of which simulated codes are active per brand
#[derive(Debug)]
pub struct SimulatedBrandState {
    active: HashMap<BrandKey, Vec<String>>,
    rng: StdRng,
}

impl Default for SimulatedBrandState {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBrandState {
    /// Store seeded from OS entropy
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Store with reproducible draws
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            active: HashMap::new(),
            rng,
        }
    }

    /// Active codes for `key`, drawing them from `table` on first read
    ///
    /// A brand with an empty table is remembered with no codes.
    pub fn read(&mut self, key: &BrandKey, table: &CodeTable) -> &[String] {
        let rng = &mut self.rng;
        self.active.entry(key.clone()).or_insert_with(|| {
            if table.is_empty() {
                debug!("No table for {}, simulating no codes", key);
                return Vec::new();
            }
            let pool: Vec<&str> = table.codes().collect();
            let count = rng.gen_range(0..=MAX_SIMULATED_CODES);
            let drawn: Vec<String> = pool
                .choose_multiple(rng, count)
                .map(|code| code.to_string())
                .collect();
            info!("Simulating {} active codes for {}", drawn.len(), key);
            drawn
        })
    }

    /// Forget active codes for `key`
    pub fn clear(&mut self, key: &BrandKey) {
        self.active.insert(key.clone(), Vec::new());
    }

    /// Whether `key` currently has simulated codes
    pub fn has_active_codes(&self, key: &BrandKey) -> bool {
        self.active.get(key).is_some_and(|codes| !codes.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CodeTable {
        ["P1296", "P1602", "P1570", "P16E6"]
            .into_iter()
            .map(|c| (c.to_string(), format!("{} description", c)))
            .collect()
    }

    #[test]
    fn test_reads_are_stable() {
        let key = BrandKey::new("Audi");
        for seed in 0..32 {
            let mut state = SimulatedBrandState::with_seed(seed);
            let first = state.read(&key, &table()).to_vec();
            let second = state.read(&key, &table()).to_vec();
            assert_eq!(first, second);
            assert!(first.len() <= MAX_SIMULATED_CODES);
        }
    }

    #[test]
    fn test_drawn_codes_are_distinct_table_entries() {
        let key = BrandKey::new("Audi");
        let table = table();
        for seed in 0..32 {
            let mut state = SimulatedBrandState::with_seed(seed);
            let codes = state.read(&key, &table).to_vec();
            assert!(codes.iter().all(|c| table.get(c).is_some()));
            if codes.len() == 2 {
                assert_ne!(codes[0], codes[1]);
            }
        }
    }

    #[test]
    fn test_every_count_occurs() {
        let key = BrandKey::new("Audi");
        let mut seen = [false; MAX_SIMULATED_CODES + 1];
        for seed in 0..200 {
            let mut state = SimulatedBrandState::with_seed(seed);
            seen[state.read(&key, &table()).len()] = true;
        }
        assert_eq!(seen, [true; MAX_SIMULATED_CODES + 1]);
    }

    #[test]
    fn test_empty_table_stays_empty() {
        let key = BrandKey::new("Lada");
        let mut state = SimulatedBrandState::with_seed(7);
        assert!(state.read(&key, &CodeTable::new()).is_empty());
        // a table showing up later does not change the remembered answer
        assert!(state.read(&key, &table()).is_empty());
        assert!(!state.has_active_codes(&key));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let key = BrandKey::new("Audi");
        let mut state = SimulatedBrandState::with_seed(1);
        state.read(&key, &table());

        state.clear(&key);
        assert!(!state.has_active_codes(&key));
        assert!(state.read(&key, &table()).is_empty());
        state.clear(&key);
        assert!(!state.has_active_codes(&key));
    }

    #[test]
    fn test_unread_brand_has_no_codes() {
        let state = SimulatedBrandState::with_seed(1);
        assert!(!state.has_active_codes(&BrandKey::new("Audi")));
    }
}
