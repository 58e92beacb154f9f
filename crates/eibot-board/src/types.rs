use std::fmt;

use serde::Serialize;

/// One of the three 8-bit I/O ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Port {
    A,
    B,
    C,
}

impl Port {
    pub fn letter(self) -> char {
        match self {
            Port::A => 'A',
            Port::B => 'B',
            Port::C => 'C',
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Direction of a single pin, as the `PD` command encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinDirection {
    Output,
    Input,
}

impl PinDirection {
    pub fn code(self) -> i64 {
        match self {
            PinDirection::Output => 0,
            PinDirection::Input => 1,
        }
    }
}

/// What the board samples when the `T` timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    /// Digital port state, pushed as `I,a,b,c`.
    Digital,
    /// Enabled analog channels, pushed as `A,v1,...`.
    Analog,
}

impl TimerMode {
    pub fn code(self) -> i64 {
        match self {
            TimerMode::Digital => 0,
            TimerMode::Analog => 1,
        }
    }
}

/// Digital input state of all three ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortState {
    pub a: u8,
    pub b: u8,
    pub c: u8,
}

/// Reading of the `QC` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurrentReading {
    /// Voltage on REF_RA0 as a 10-bit value (0 = 0.0V, 1023 = 3.3V).
    pub ra0: u16,
    /// Voltage on the V+ net, scaled by the board's resistor divider.
    pub vplus: u16,
}
