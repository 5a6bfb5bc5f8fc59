//! OBD-II Protocol Implementation
//!
//! Turns the text dialogue with an ELM327-compatible adapter into typed
//! data: supported PIDs, live sensor values and stored trouble codes.

mod capability;
mod channel;
mod dtc;
mod error;
mod init;
mod pid;
mod protocol;
mod response;
mod session;

pub use capability::{probe, SupportedPids, SUPPORTED_PIDS_COMMAND};
pub use channel::{AdapterChannel, ScriptedChannel, SerialChannel};
pub use dtc::{
    clear_stored_codes, decode_trouble_code, is_clear_success, parse_stored_codes,
    read_stored_codes, CodeTable, TroubleCode, CLEAR_CODES_COMMAND, READ_CODES_COMMAND,
    UNRECOGNIZED_DESCRIPTION,
};
pub use error::ObdError;
pub use init::{InitPolicy, InitSequencer};
pub use pid::{decode, descriptor, ParameterDescriptor, Pid, PidReading, CATALOG};
pub use protocol::ObdProtocol;
pub use response::frame_payloads;
pub use session::{ObdSession, SessionConfig, SessionState, DEFAULT_BAUD_RATE};

/// Decode formulas by name, for callers holding raw bytes
pub mod formula {
    pub use crate::pid::{
        air_flow, engine_speed, fuel_pressure, fuel_trim, oxygen_voltage, percent, temperature,
        vehicle_speed,
    };
}

/// OBD-II mode constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
    /// Diagnostic trouble codes
    pub const READ_DTC: u8 = 0x03;
    /// Clear trouble codes
    pub const CLEAR_DTC: u8 = 0x04;
    /// Manufacturer-specific read data by identifier
    pub const READ_DATA_BY_ID: u8 = 0x22;
}
