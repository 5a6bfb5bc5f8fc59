//! Bus protocol selection
//!
//! The last init command forces one of the ELM327's numbered protocols, or
//! leaves detection to the adapter (`ATSP0`). Config files name them in
//! snake case, e.g. `protocol = "iso9141_2"`.

use serde::{Deserialize, Serialize};

/// Protocol numbers understood by `ATSP<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObdProtocol {
    /// 0: adapter searches
    #[default]
    Auto,
    /// 1: J1850 PWM
    J1850Pwm,
    /// 2: J1850 VPW
    J1850Vpw,
    /// 3: ISO 9141-2
    Iso9141_2,
    /// 4: KWP2000, 5-baud init
    Iso14230_4Kwp,
    /// 5: KWP2000, fast init
    Iso14230_4KwpFast,
    /// 6: CAN 11-bit, 500k
    Iso15765_4Can11bit500,
    /// 7: CAN 29-bit, 500k
    Iso15765_4Can29bit500,
    /// 8: CAN 11-bit, 250k
    Iso15765_4Can11bit250,
    /// 9: CAN 29-bit, 250k
    Iso15765_4Can29bit250,
}

impl ObdProtocol {
    /// Digit the adapter uses for this protocol
    pub fn number(&self) -> u8 {
        *self as u8
    }

    /// `ATSP<n>` command selecting this protocol
    pub fn to_elm_command(&self) -> &'static str {
        const COMMANDS: [&str; 10] = [
            "ATSP0", "ATSP1", "ATSP2", "ATSP3", "ATSP4", "ATSP5", "ATSP6", "ATSP7", "ATSP8",
            "ATSP9",
        ];
        COMMANDS[self.number() as usize]
    }
}
