//! OBD-II PID Definitions and Response Parsing
//!
//! Defines the mode 01 parameters this crate can decode and their formulas.
//! `A` and `B` are the first and second data bytes after the `41<PID>` echo.

use crate::response::bytes_after_marker;
use serde::Serialize;
use tracing::debug;

/// Standard OBD-II PIDs for Mode 01 (current data)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum Pid {
    /// Calculated engine load (0x04)
    EngineLoad = 0x04,
    /// Engine coolant temperature (0x05)
    CoolantTemp = 0x05,
    /// Short-term fuel trim bank 1 (0x06)
    ShortFuelTrim = 0x06,
    /// Long-term fuel trim bank 1 (0x07)
    LongFuelTrim = 0x07,
    /// Fuel pressure, gauge (0x0A)
    FuelPressure = 0x0A,
    /// Intake manifold absolute pressure (0x0B)
    IntakeManifoldPressure = 0x0B,
    /// Engine RPM (0x0C)
    Rpm = 0x0C,
    /// Vehicle speed (0x0D)
    Speed = 0x0D,
    /// Intake air temperature (0x0F)
    IntakeTemp = 0x0F,
    /// Mass air flow rate (0x10)
    Maf = 0x10,
    /// Throttle position (0x11)
    ThrottlePosition = 0x11,
    /// Oxygen sensor voltage bank 1, sensor 1 (0x14)
    O2Voltage = 0x14,
}

impl Pid {
    /// Get the PID hex value
    pub fn as_hex(&self) -> u8 {
        *self as u8
    }

    /// Catalog entry for this PID
    pub fn descriptor(&self) -> Option<&'static ParameterDescriptor> {
        descriptor(self.as_hex())
    }
}

/// ⌊(A·256 + B) / 4⌋ rpm
pub fn engine_speed(a: u8, b: u8) -> u32 {
    (a as u32 * 256 + b as u32) / 4
}

/// A km/h
pub fn vehicle_speed(a: u8) -> u32 {
    a as u32
}

/// A − 40 °C, shared by coolant and intake air
pub fn temperature(a: u8) -> i32 {
    a as i32 - 40
}

/// A·100 / 255 %, shared by throttle and engine load
pub fn percent(a: u8) -> f64 {
    a as f64 * 100.0 / 255.0
}

/// (A·256 + B) / 100 g/s
pub fn air_flow(a: u8, b: u8) -> f64 {
    (a as f64 * 256.0 + b as f64) / 100.0
}

/// A·3 kPa
pub fn fuel_pressure(a: u8) -> u32 {
    a as u32 * 3
}

/// A / 200 V
pub fn oxygen_voltage(a: u8) -> f64 {
    a as f64 / 200.0
}

/// (A − 128)·100 / 128 %
pub fn fuel_trim(a: u8) -> f64 {
    (a as f64 - 128.0) * 100.0 / 128.0
}

fn rpm_value(b: &[u8]) -> f64 {
    engine_speed(b[0], b[1]) as f64
}

fn speed_value(b: &[u8]) -> f64 {
    vehicle_speed(b[0]) as f64
}

fn temperature_value(b: &[u8]) -> f64 {
    temperature(b[0]) as f64
}

fn percent_value(b: &[u8]) -> f64 {
    percent(b[0])
}

fn air_flow_value(b: &[u8]) -> f64 {
    air_flow(b[0], b[1])
}

fn fuel_pressure_value(b: &[u8]) -> f64 {
    fuel_pressure(b[0]) as f64
}

fn oxygen_value(b: &[u8]) -> f64 {
    oxygen_voltage(b[0])
}

fn fuel_trim_value(b: &[u8]) -> f64 {
    fuel_trim(b[0])
}

/// Manifold pressure: A kPa
fn pressure_value(b: &[u8]) -> f64 {
    b[0] as f64
}

/// Static description of one decodable parameter
#[derive(Debug)]
pub struct ParameterDescriptor {
    /// Mode 01 PID
    pub pid: u8,
    /// Human-readable name
    pub label: &'static str,
    /// Physical unit of the decoded value
    pub unit: &'static str,
    /// Data bytes the formula consumes
    pub data_bytes: usize,
    formula: fn(&[u8]) -> f64,
}

impl ParameterDescriptor {
    /// Request string, e.g. `010C`
    pub fn command(&self) -> String {
        format!("01{:02X}", self.pid)
    }

    /// Echo that precedes the data bytes, e.g. `410C`
    pub fn echo(&self) -> String {
        format!("41{:02X}", self.pid)
    }

    /// Decode a raw answer; `None` if the echo or data bytes are missing
    pub fn decode(&self, response: &str) -> Option<PidReading> {
        let raw_bytes = bytes_after_marker(response, &self.echo(), self.data_bytes)?;
        Some(PidReading {
            pid: self.pid,
            label: self.label,
            unit: self.unit,
            value: (self.formula)(&raw_bytes),
            raw_bytes,
        })
    }
}

/// Every parameter the decoder understands, ordered for display
pub static CATALOG: [ParameterDescriptor; 12] = [
    ParameterDescriptor {
        pid: 0x0C,
        label: "RPM",
        unit: "rpm",
        data_bytes: 2,
        formula: rpm_value,
    },
    ParameterDescriptor {
        pid: 0x0D,
        label: "Vehicle Speed",
        unit: "km/h",
        data_bytes: 1,
        formula: speed_value,
    },
    ParameterDescriptor {
        pid: 0x05,
        label: "Coolant Temp",
        unit: "°C",
        data_bytes: 1,
        formula: temperature_value,
    },
    ParameterDescriptor {
        pid: 0x11,
        label: "Throttle Position",
        unit: "%",
        data_bytes: 1,
        formula: percent_value,
    },
    ParameterDescriptor {
        pid: 0x0F,
        label: "Intake Temp",
        unit: "°C",
        data_bytes: 1,
        formula: temperature_value,
    },
    ParameterDescriptor {
        pid: 0x10,
        label: "MAF Rate",
        unit: "g/s",
        data_bytes: 2,
        formula: air_flow_value,
    },
    ParameterDescriptor {
        pid: 0x0A,
        label: "Fuel Pressure",
        unit: "kPa",
        data_bytes: 1,
        formula: fuel_pressure_value,
    },
    ParameterDescriptor {
        pid: 0x14,
        label: "O2 Sensor (Bank 1)",
        unit: "V",
        data_bytes: 1,
        formula: oxygen_value,
    },
    ParameterDescriptor {
        pid: 0x04,
        label: "Engine Load",
        unit: "%",
        data_bytes: 1,
        formula: percent_value,
    },
    ParameterDescriptor {
        pid: 0x06,
        label: "Short Fuel Trim (Bank 1)",
        unit: "%",
        data_bytes: 1,
        formula: fuel_trim_value,
    },
    ParameterDescriptor {
        pid: 0x07,
        label: "Long Fuel Trim (Bank 1)",
        unit: "%",
        data_bytes: 1,
        formula: fuel_trim_value,
    },
    ParameterDescriptor {
        pid: 0x0B,
        label: "Intake Manifold Pressure",
        unit: "kPa",
        data_bytes: 1,
        formula: pressure_value,
    },
];

/// Look up the catalog entry for a PID
pub fn descriptor(pid: u8) -> Option<&'static ParameterDescriptor> {
    CATALOG.iter().find(|d| d.pid == pid)
}

/// Decode the answer to `01<pid>`
///
/// Unknown PIDs, missing echoes and short payloads all yield `None`.
pub fn decode(pid: u8, response: &str) -> Option<PidReading> {
    let reading = descriptor(pid)?.decode(response);
    if reading.is_none() {
        debug!("PID {:02X}: no value in {:?}", pid, response.trim());
    }
    reading
}

/// Decoded value of one PID query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PidReading {
    /// The PID that was queried
    pub pid: u8,
    /// Parameter name
    pub label: &'static str,
    /// Physical unit
    pub unit: &'static str,
    /// Decoded value
    pub value: f64,
    /// Data bytes the value was computed from
    pub raw_bytes: Vec<u8>,
}
