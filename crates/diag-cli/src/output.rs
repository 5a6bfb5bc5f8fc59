//! Text and JSON rendering of command results

use obd_protocol::{descriptor, PidReading, SupportedPids, TroubleCode};
use obd_scheduler::{LiveSnapshot, Sample};
use serde::Serialize;
use std::fmt::Write;

/// Pretty JSON for any result
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Whole numbers print without decimals, everything else with two
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

pub fn format_reading(reading: &PidReading) -> String {
    let value = format_value(reading.value);
    if reading.unit.is_empty() {
        format!("{}: {}", reading.label, value)
    } else {
        format!("{}: {} {}", reading.label, value, reading.unit)
    }
}

pub fn format_snapshot(snapshot: &LiveSnapshot) -> String {
    let mut out = String::new();
    for entry in &snapshot.entries {
        let _ = match &entry.sample {
            Sample::Value(reading) => writeln!(out, "  {}", format_reading(reading)),
            Sample::Absent => writeln!(out, "  {}: no data", entry.label),
            Sample::Unsupported => writeln!(out, "  {}: not supported", entry.label),
        };
    }
    out
}

pub fn format_codes(codes: &[TroubleCode]) -> String {
    if codes.is_empty() {
        return "No trouble codes\n".to_string();
    }

    let mut out = String::new();
    for code in codes {
        let _ = writeln!(out, "{}  {}", code.code, code.description);
    }
    out
}

pub fn format_supported(supported: &SupportedPids) -> String {
    let mut out = String::new();
    for &pid in supported.pids() {
        let _ = match descriptor(pid) {
            Some(desc) => writeln!(out, "01{:02X}  {} [{}]", pid, desc.label, desc.unit),
            None => writeln!(out, "01{:02X}", pid),
        };
    }
    out
}

pub fn format_brands(brands: &[String]) -> String {
    if brands.is_empty() {
        return "No manufacturer tables found\n".to_string();
    }
    brands.iter().map(|b| format!("{}\n", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_protocol::decode;
    use obd_scheduler::SnapshotEntry;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(1726.0), "1726");
        assert_eq!(format_value(0.6), "0.60");
        assert_eq!(format_value(-40.0), "-40");
    }

    #[test]
    fn test_format_snapshot() {
        let rpm = decode(0x0C, "410C1AF8").unwrap();
        let snapshot = LiveSnapshot {
            timestamp_ms: 0,
            entries: vec![
                SnapshotEntry {
                    pid: 0x0C,
                    label: rpm.label,
                    sample: Sample::Value(rpm.clone()),
                },
                SnapshotEntry {
                    pid: 0x0D,
                    label: "Vehicle Speed",
                    sample: Sample::Absent,
                },
                SnapshotEntry {
                    pid: 0x05,
                    label: "Coolant Temperature",
                    sample: Sample::Unsupported,
                },
            ],
        };

        let text = format_snapshot(&snapshot);
        assert!(text.contains(&format!("{}: 1726", rpm.label)));
        assert!(text.contains("Vehicle Speed: no data"));
        assert!(text.contains("Coolant Temperature: not supported"));
    }

    #[test]
    fn test_format_codes() {
        assert_eq!(format_codes(&[]), "No trouble codes\n");

        let codes = vec![TroubleCode {
            code: "P0133".to_string(),
            description: "O2 Sensor Circuit Slow Response".to_string(),
        }];
        assert_eq!(
            format_codes(&codes),
            "P0133  O2 Sensor Circuit Slow Response\n"
        );
    }

    #[test]
    fn test_snapshot_json_tags_samples() {
        let snapshot = LiveSnapshot {
            timestamp_ms: 42,
            entries: vec![SnapshotEntry {
                pid: 0x11,
                label: "Throttle Position",
                sample: Sample::Unsupported,
            }],
        };

        let json: serde_json::Value = serde_json::from_str(&to_json(&snapshot).unwrap()).unwrap();
        assert_eq!(json["timestamp_ms"], 42);
        assert_eq!(json["entries"][0]["sample"]["status"], "unsupported");
    }
}
