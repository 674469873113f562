//! Vehicle bus protocol selection
//!
//! The ELM327 numbers its bus protocols 0 to 9; `ATSP<n>` selects one and
//! `ATSP0` lets the adapter search on the first request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bus protocol the adapter is told to use, tagged with its ELM327 number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ObdProtocol {
    #[default]
    Auto = 0,
    J1850Pwm = 1,
    J1850Vpw = 2,
    Iso9141_2 = 3,
    /// KWP2000, 5 baud init
    Iso14230_4Kwp = 4,
    /// KWP2000, fast init
    Iso14230_4KwpFast = 5,
    /// CAN, 11 bit ID at 500 kbaud. The reference vehicle talks this.
    Iso15765_4Can11bit500 = 6,
    Iso15765_4Can29bit500 = 7,
    Iso15765_4Can11bit250 = 8,
    Iso15765_4Can29bit250 = 9,
}

impl ObdProtocol {
    /// ELM327 protocol number
    pub fn number(self) -> u8 {
        self as u8
    }

    /// `ATSP<n>` command selecting this protocol
    pub fn to_elm_command(self) -> String {
        format!("ATSP{}", self.number())
    }

    /// Whether the adapter is left to find the bus by itself
    pub fn is_auto(self) -> bool {
        self == ObdProtocol::Auto
    }
}

impl fmt::Display for ObdProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_auto() {
            write!(f, "auto")
        } else {
            write!(f, "protocol {}", self.number())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_command_carries_number() {
        assert_eq!(ObdProtocol::default().to_elm_command(), "ATSP0");
        assert_eq!(ObdProtocol::Iso15765_4Can11bit500.to_elm_command(), "ATSP6");
        assert_eq!(ObdProtocol::Iso15765_4Can29bit250.to_elm_command(), "ATSP9");
    }

    #[test]
    fn test_display() {
        assert_eq!(ObdProtocol::Auto.to_string(), "auto");
        assert_eq!(ObdProtocol::J1850Vpw.to_string(), "protocol 2");
    }
}
