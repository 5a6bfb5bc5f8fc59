//! Stored Trouble Codes (modes 03 and 04)
//!
//! Each stored code travels as four hex digits. The top two bits of the
//! first digit pick the system letter, the bottom two bits become the first
//! numeric digit, the remaining three digits are copied verbatim:
//! `0301` is `P0301`, `4567` is `C0567`.

use crate::channel::AdapterChannel;
use crate::error::ObdError;
use crate::response::frame_payloads;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Read stored codes
pub const READ_CODES_COMMAND: &str = "03";

/// Clear stored codes and the check-engine light
pub const CLEAR_CODES_COMMAND: &str = "04";

/// Mode echo opening every line that carries stored codes
pub const STORED_CODES_MARKER: &str = "43";

/// Substrings (upper-cased) that confirm a clear
pub const CLEAR_SUCCESS_MARKERS: [&str; 2] = ["OK", "CLEARED"];

/// Description for codes missing from the generic table
pub const UNRECOGNIZED_DESCRIPTION: &str = "Unrecognized / manufacturer-specific code";

const SYSTEM_LETTERS: [char; 4] = ['P', 'C', 'B', 'U'];

/// A decoded code with its description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroubleCode {
    /// Five-character code, e.g. `P0301`
    pub code: String,
    /// Description from a code table
    pub description: String,
}

/// Decode one four-digit group; `0000` padding and non-hex input give `None`
pub fn decode_trouble_code(group: &str) -> Option<String> {
    if group.len() != 4 || !group.chars().all(|c| c.is_ascii_hexdigit()) || group == "0000" {
        return None;
    }

    let first = group.chars().next()?.to_digit(16)?;
    let letter = SYSTEM_LETTERS[(first >> 2) as usize];
    let digit = first & 0x3;

    Some(format!("{}{}{}", letter, digit, group[1..].to_ascii_uppercase()))
}

/// Concatenated code digits from every `43` frame of a mode 03 answer
pub fn stored_code_payload(response: &str) -> String {
    frame_payloads(response, STORED_CODES_MARKER).concat()
}

/// Codes contained in a mode 03 answer, in transmission order
pub fn parse_stored_codes(response: &str) -> Vec<String> {
    let payload = stored_code_payload(response);
    if payload.len() % 4 != 0 {
        debug!("Ignoring {} trailing code digits", payload.len() % 4);
    }

    (0..payload.len() / 4)
        .filter_map(|i| payload.get(i * 4..i * 4 + 4))
        .filter_map(decode_trouble_code)
        .collect()
}

/// Whether a mode 04 answer confirms the clear
pub fn is_clear_success(response: &str) -> bool {
    let upper = response.to_ascii_uppercase();
    CLEAR_SUCCESS_MARKERS.iter().any(|m| upper.contains(m))
}

/// Code to description mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeTable {
    entries: BTreeMap<String, String>,
}

impl CodeTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in descriptions for common SAE generic codes
    pub fn generic() -> Self {
        GENERIC_CODES
            .iter()
            .map(|(code, desc)| (code.to_string(), desc.to_string()))
            .collect()
    }

    /// Add or replace one entry
    pub fn insert(&mut self, code: impl Into<String>, description: impl Into<String>) {
        self.entries.insert(code.into(), description.into());
    }

    /// Add every entry of `other`, replacing duplicates
    pub fn merge(&mut self, other: CodeTable) {
        self.entries.extend(other.entries);
    }

    /// Exact-match lookup
    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    /// Lookup with a placeholder for unknown codes
    pub fn describe<'a>(&'a self, code: &str, fallback: &'a str) -> &'a str {
        self.get(code).unwrap_or(fallback)
    }

    /// Codes in ascending order
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for CodeTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Read and describe the vehicle's stored codes
pub async fn read_stored_codes<C>(
    channel: &mut C,
    table: &CodeTable,
) -> Result<Vec<TroubleCode>, ObdError>
where
    C: AdapterChannel + ?Sized,
{
    let response = channel.send_and_receive(READ_CODES_COMMAND).await?;
    let codes: Vec<TroubleCode> = parse_stored_codes(&response)
        .into_iter()
        .map(|code| {
            let description = table.describe(&code, UNRECOGNIZED_DESCRIPTION).to_string();
            TroubleCode { code, description }
        })
        .collect();

    info!("Read {} stored trouble codes", codes.len());
    Ok(codes)
}

/// Clear stored codes; `Ok(false)` if the adapter did not confirm
pub async fn clear_stored_codes<C>(channel: &mut C) -> Result<bool, ObdError>
where
    C: AdapterChannel + ?Sized,
{
    let response = channel.send_and_receive(CLEAR_CODES_COMMAND).await?;
    let cleared = is_clear_success(&response);
    if cleared {
        info!("Stored trouble codes cleared");
    } else {
        warn!("Clear not confirmed: {:?}", response.trim());
    }
    Ok(cleared)
}

static GENERIC_CODES: &[(&str, &str)] = &[
    ("P0100", "Mass or Volume Air Flow Circuit Malfunction"),
    ("P0101", "Mass or Volume Air Flow Circuit Range/Performance Problem"),
    ("P0102", "Mass or Volume Air Flow Circuit Low Input"),
    ("P0103", "Mass or Volume Air Flow Circuit High Input"),
    ("P0110", "Intake Air Temperature Circuit Malfunction"),
    ("P0115", "Engine Coolant Temperature Circuit Malfunction"),
    ("P0117", "Engine Coolant Temperature Circuit Low Input"),
    ("P0118", "Engine Coolant Temperature Circuit High Input"),
    ("P0120", "Throttle Position Sensor/Switch A Circuit Malfunction"),
    ("P0121", "Throttle Position Sensor/Switch A Circuit Range/Performance Problem"),
    ("P0128", "Coolant Thermostat (Coolant Temperature Below Thermostat Regulating Temperature)"),
    ("P0130", "O2 Sensor Circuit Malfunction (Bank 1 Sensor 1)"),
    ("P0133", "O2 Sensor Circuit Slow Response (Bank 1 Sensor 1)"),
    ("P0135", "O2 Sensor Heater Circuit Malfunction (Bank 1 Sensor 1)"),
    ("P0171", "System Too Lean (Bank 1)"),
    ("P0172", "System Too Rich (Bank 1)"),
    ("P0174", "System Too Lean (Bank 2)"),
    ("P0175", "System Too Rich (Bank 2)"),
    ("P0190", "Fuel Rail Pressure Sensor Circuit Malfunction"),
    ("P0300", "Random/Multiple Cylinder Misfire Detected"),
    ("P0301", "Cylinder 1 Misfire Detected"),
    ("P0302", "Cylinder 2 Misfire Detected"),
    ("P0303", "Cylinder 3 Misfire Detected"),
    ("P0304", "Cylinder 4 Misfire Detected"),
    ("P0305", "Cylinder 5 Misfire Detected"),
    ("P0306", "Cylinder 6 Misfire Detected"),
    ("P0325", "Knock Sensor 1 Circuit Malfunction (Bank 1 or Single Sensor)"),
    ("P0335", "Crankshaft Position Sensor A Circuit Malfunction"),
    ("P0340", "Camshaft Position Sensor Circuit Malfunction"),
    ("P0401", "Exhaust Gas Recirculation Flow Insufficient Detected"),
    ("P0420", "Catalyst System Efficiency Below Threshold (Bank 1)"),
    ("P0430", "Catalyst System Efficiency Below Threshold (Bank 2)"),
    ("P0440", "Evaporative Emission Control System Malfunction"),
    ("P0442", "Evaporative Emission Control System Leak Detected (small leak)"),
    ("P0455", "Evaporative Emission Control System Leak Detected (gross leak)"),
    ("P0500", "Vehicle Speed Sensor Malfunction"),
    ("P0505", "Idle Control System Malfunction"),
    ("P0562", "System Voltage Low"),
    ("P0563", "System Voltage High"),
    ("P0600", "Serial Communication Link Malfunction"),
    ("P0700", "Transmission Control System Malfunction"),
    ("C0035", "Left Front Wheel Speed Circuit Malfunction"),
    ("C0040", "Right Front Wheel Speed Circuit Malfunction"),
    ("B0001", "Driver Frontal Stage 1 Deployment Control"),
    ("U0100", "Lost Communication With ECM/PCM A"),
    ("U0121", "Lost Communication With Anti-Lock Brake System (ABS) Control Module"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;
    use proptest::prelude::*;

    #[test]
    fn test_decode_powertrain() {
        assert_eq!(decode_trouble_code("0301").as_deref(), Some("P0301"));
        assert_eq!(decode_trouble_code("0420").as_deref(), Some("P0420"));
    }

    #[test]
    fn test_decode_system_letters() {
        assert_eq!(decode_trouble_code("4567").as_deref(), Some("C0567"));
        assert_eq!(decode_trouble_code("9001").as_deref(), Some("B1001"));
        assert_eq!(decode_trouble_code("C100").as_deref(), Some("U0100"));
        assert_eq!(decode_trouble_code("f1ab").as_deref(), Some("U31AB"));
    }

    #[test]
    fn test_decode_rejects_padding_and_garbage() {
        assert_eq!(decode_trouble_code("0000"), None);
        assert_eq!(decode_trouble_code("03G1"), None);
        assert_eq!(decode_trouble_code("030"), None);
    }

    #[test]
    fn test_padding_group_dropped() {
        assert_eq!(parse_stored_codes("4303010000"), vec!["P0301"]);
    }

    #[test]
    fn test_multi_line_answer() {
        let raw = "43 01 33 00 00 00 00\r43 04 20 C1 00 00 00\r\r";
        assert_eq!(parse_stored_codes(raw), vec!["P0133", "P0420", "U0100"]);
    }

    #[test]
    fn test_lines_without_marker_ignored() {
        assert!(parse_stored_codes("NO DATA").is_empty());
        assert!(parse_stored_codes("SEARCHING...\r").is_empty());
        assert_eq!(parse_stored_codes("SEARCHING...\r430301"), vec!["P0301"]);
    }

    #[test]
    fn test_can_header_stripped() {
        assert_eq!(parse_stored_codes("7E806430301\r"), vec!["P0301"]);
        assert_eq!(parse_stored_codes("18DAF1100643013300000000\r"), vec!["P0133"]);
    }

    #[test]
    fn test_three_byte_header_and_checksum_stripped() {
        assert_eq!(parse_stored_codes("486B104301330000000045\r"), vec!["P0133"]);

        let raw = "48 6B 10 43 01 33 04 20 C1 00 3A\r48 6B 10 43 03 01 00 00 00 00 B2\r";
        assert_eq!(parse_stored_codes(raw), vec!["P0133", "P0420", "U0100", "P0301"]);
    }

    #[test]
    fn test_invalid_utf8_after_header_does_not_panic() {
        let noisy = String::from_utf8_lossy(b"7E8\xFF430301\r").into_owned();
        assert!(parse_stored_codes(&noisy).is_empty());

        let recovered = String::from_utf8_lossy(b"7E8\xFF430301\r7E806430133\r").into_owned();
        assert_eq!(parse_stored_codes(&recovered), vec!["P0133"]);
    }

    #[test]
    fn test_clear_markers() {
        assert!(is_clear_success("44\rOK"));
        assert!(is_clear_success("Codes Cleared"));
        assert!(!is_clear_success("?"));
        assert!(!is_clear_success(""));
    }

    #[test]
    fn test_generic_table_lookup() {
        let table = CodeTable::generic();
        assert_eq!(table.get("P0301"), Some("Cylinder 1 Misfire Detected"));
        assert_eq!(table.describe("P1999", UNRECOGNIZED_DESCRIPTION), UNRECOGNIZED_DESCRIPTION);
    }

    #[tokio::test]
    async fn test_read_stored_codes_describes() {
        let mut channel = ScriptedChannel::new().with_response("03", "43030116990000\r");
        let codes = read_stored_codes(&mut channel, &CodeTable::generic())
            .await
            .unwrap();

        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0].code, "P0301");
        assert_eq!(codes[0].description, "Cylinder 1 Misfire Detected");
        assert_eq!(codes[1].code, "P1699");
        assert_eq!(codes[1].description, UNRECOGNIZED_DESCRIPTION);
    }

    #[tokio::test]
    async fn test_read_stored_codes_iso_headers() {
        let mut channel = ScriptedChannel::new().with_response("03", "486B104301330000000045\r");
        let codes = read_stored_codes(&mut channel, &CodeTable::generic())
            .await
            .unwrap();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, "P0133");
    }

    #[tokio::test]
    async fn test_clear_stored_codes() {
        let mut ok = ScriptedChannel::new().with_response("04", "44\r");
        assert!(!clear_stored_codes(&mut ok).await.unwrap());

        let mut confirmed = ScriptedChannel::new().with_response("04", "OK");
        assert!(clear_stored_codes(&mut confirmed).await.unwrap());

        let mut dead = ScriptedChannel::new().failing_on("04");
        assert!(clear_stored_codes(&mut dead).await.is_err());
    }

    proptest! {
        #[test]
        fn prop_decoded_codes_match_pattern(group in "[0-9A-F]{4}") {
            match decode_trouble_code(&group) {
                None => prop_assert_eq!(group.as_str(), "0000"),
                Some(code) => {
                    prop_assert_eq!(code.len(), 5);
                    prop_assert!("PCBU".contains(&code[..1]));
                    prop_assert!("0123".contains(&code[1..2]));
                    prop_assert_eq!(&code[2..], &group[1..]);
                }
            }
        }
    }
}
