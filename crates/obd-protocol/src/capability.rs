//! Supported-PID Discovery
//!
//! `0100` answers `4100` followed by a 32-bit mask; bit 31 stands for PID
//! 0x01 and bit 0 for PID 0x20.

use crate::channel::AdapterChannel;
use crate::error::ObdError;
use crate::response::bytes_after_marker;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Request for the bank-1 support mask
pub const SUPPORTED_PIDS_COMMAND: &str = "0100";

/// Echo preceding the mask in the answer
pub const SUPPORTED_PIDS_MARKER: &str = "4100";

/// Mode 01 PIDs the vehicle reported, ascending
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedPids {
    pids: Vec<u8>,
}

impl SupportedPids {
    /// Expand a support mask into PIDs
    pub fn from_mask(mask: u32) -> Self {
        let pids = (0..32u8)
            .filter(|bit| mask & (0x8000_0000 >> bit) != 0)
            .map(|bit| bit + 1)
            .collect();
        Self { pids }
    }

    /// Decode the answer to `0100`; a missing marker gives the empty set
    pub fn from_response(response: &str) -> Self {
        match bytes_after_marker(response, SUPPORTED_PIDS_MARKER, 4) {
            Some(bytes) => {
                let mask = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                Self::from_mask(mask)
            }
            None => {
                debug!("No {} mask in {:?}", SUPPORTED_PIDS_MARKER, response.trim());
                Self::default()
            }
        }
    }

    /// Whether a PID may be queried
    pub fn contains(&self, pid: u8) -> bool {
        self.pids.binary_search(&pid).is_ok()
    }

    /// PIDs in ascending order
    pub fn pids(&self) -> &[u8] {
        &self.pids
    }

    /// Mode 01 request strings (`0101`, `010C`, ...)
    pub fn commands(&self) -> Vec<String> {
        self.pids.iter().map(|pid| format!("01{:02X}", pid)).collect()
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }
}

/// Ask the adapter which PIDs the vehicle supports
pub async fn probe<C>(channel: &mut C) -> Result<SupportedPids, ObdError>
where
    C: AdapterChannel + ?Sized,
{
    let response = channel.send_and_receive(SUPPORTED_PIDS_COMMAND).await?;
    let supported = SupportedPids::from_response(&response);
    info!("Vehicle supports {} PIDs: {:02X?}", supported.len(), supported.pids());
    Ok(supported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;
    use proptest::prelude::*;

    #[test]
    fn test_full_mask() {
        let supported = SupportedPids::from_response("4100FFFFFFFF");
        let expected: Vec<String> = (1..=0x20).map(|p| format!("01{:02X}", p)).collect();
        assert_eq!(supported.commands(), expected);
        assert_eq!(supported.commands().first().unwrap(), "0101");
        assert_eq!(supported.commands().last().unwrap(), "0120");
    }

    #[test]
    fn test_empty_mask() {
        assert!(SupportedPids::from_response("410000000000").is_empty());
    }

    #[test]
    fn test_missing_marker_is_empty_set() {
        assert!(SupportedPids::from_response("UNABLE TO CONNECT").is_empty());
        assert!(SupportedPids::from_response("").is_empty());
    }

    #[test]
    fn test_typical_mask() {
        // BE1FA813: 01 03 04 05 06 07 0C 0D 0E 0F 10 11 13 15 1C 1F 20
        let supported = SupportedPids::from_response("SEARCHING...\r4100BE1FA813\r");
        assert!(supported.contains(0x0C));
        assert!(supported.contains(0x0D));
        assert!(supported.contains(0x05));
        assert!(!supported.contains(0x02));
        assert!(!supported.contains(0x0A));
        assert_eq!(supported.pids()[0], 0x01);
    }

    #[tokio::test]
    async fn test_probe_sends_request() {
        let mut channel = ScriptedChannel::new().with_response("0100", "4100 80 00 00 01");
        let supported = probe(&mut channel).await.unwrap();
        assert_eq!(supported.pids(), [0x01, 0x20]);
        assert_eq!(channel.sent(), ["0100"]);
    }

    proptest! {
        #[test]
        fn prop_one_pid_per_set_bit(mask: u32) {
            let supported = SupportedPids::from_mask(mask);
            prop_assert_eq!(supported.len(), mask.count_ones() as usize);
            prop_assert!(supported.pids().windows(2).all(|w| w[0] < w[1]));
            for &pid in supported.pids() {
                prop_assert!(mask & (1 << (32 - pid as u32)) != 0);
            }
        }
    }
}
