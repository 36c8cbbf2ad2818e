//! Pulse channels and memory slots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A hardware channel an instruction is scheduled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Qubit drive line.
    Drive(u32),
    /// Readout resonator drive.
    Measure(u32),
    /// Digitizer input for a readout.
    Acquire(u32),
    /// Coupler line used by two-qubit gates.
    Control(u32),
}

impl Channel {
    /// Channel index.
    pub fn index(&self) -> u32 {
        match self {
            Channel::Drive(i) | Channel::Measure(i) | Channel::Acquire(i) | Channel::Control(i) => {
                *i
            }
        }
    }

    /// Short prefix used in wire names.
    pub fn prefix(&self) -> &'static str {
        match self {
            Channel::Drive(_) => "d",
            Channel::Measure(_) => "m",
            Channel::Acquire(_) => "a",
            Channel::Control(_) => "u",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix(), self.index())
    }
}

/// Classical memory slot receiving an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemorySlot(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(Channel::Drive(0).to_string(), "d0");
        assert_eq!(Channel::Measure(3).to_string(), "m3");
        assert_eq!(Channel::Acquire(1).to_string(), "a1");
        assert_eq!(Channel::Control(12).to_string(), "u12");
    }
}
