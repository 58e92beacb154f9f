use std::fmt;

use crate::error::{BoardError, Result};
use crate::types::Port;

/// Inclusive bounds for a numeric command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRange {
    pub min: i64,
    pub max: i64,
}

impl ParamRange {
    pub const BYTE: Self = Self::new(0, 255);
    pub const PIN: Self = Self::new(0, 7);
    pub const ADDRESS: Self = Self::new(0, 4095);
    pub const ANALOG_COUNT: Self = Self::new(0, 13);
    pub const SERVO_PULSE: Self = Self::new(0, 11890);
    pub const DURATION: Self = Self::new(0, 65535);
    pub const STEPS: Self = Self::new(-32767, 32767);
    pub const TIMER_INTERVAL: Self = Self::new(0, 30000);
    pub const NODE_COUNT: Self = Self::new(0, u32::MAX as i64);
    pub const S2_CHANNEL: Self = Self::new(0, 7);
    pub const S2_DURATION: Self = Self::new(0, 32000);
    pub const S2_PIN: Self = Self::new(0, 24);
    pub const MOTOR_ENABLE: Self = Self::new(0, 5);
    pub const MOTOR2_ENABLE: Self = Self::new(0, 1);
    pub const BULK_STREAM_LEN: Self = Self::new(1, 56);

    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Check a value wider than `i64` against this range.
    pub fn check_wide(&self, name: &'static str, value: u64) -> Result<i64> {
        match i64::try_from(value) {
            Ok(narrow) => self.check(name, narrow),
            Err(_) => Err(BoardError::InvalidArgument {
                name,
                value: value.into(),
                min: self.min,
                max: self.max,
            }),
        }
    }

    /// Validate `value`, naming the parameter in the error.
    pub fn check(&self, name: &'static str, value: i64) -> Result<i64> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(BoardError::InvalidArgument {
                name,
                value: value.into(),
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// A single encoded parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Int(i64),
    Flag(bool),
    Port(Port),
    Hex(Vec<u8>),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Int(value) => write!(f, "{value}"),
            Param::Flag(on) => f.write_str(if *on { "1" } else { "0" }),
            Param::Port(port) => write!(f, "{port}"),
            Param::Hex(bytes) => f.write_str(&hex::encode_upper(bytes)),
        }
    }
}

/// A validated command: an opcode plus its ordered parameters.
///
/// Builders validate as they go, so a `Command` that exists is always safe
/// to put on the wire. `Display` renders the line without its terminator:
///
/// ```
/// use eibot_board::{Command, ParamRange};
///
/// let cmd = Command::new("SM")
///     .int("duration", 1000, ParamRange::DURATION)?
///     .int("axis1", -200, ParamRange::STEPS)?
///     .int("axis2", 0, ParamRange::STEPS)?;
/// assert_eq!(cmd.to_string(), "SM,1000,-200,0");
/// # Ok::<(), eibot_board::BoardError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: &'static str,
    params: Vec<Param>,
}

impl Command {
    pub fn new(opcode: &'static str) -> Self {
        Self {
            opcode,
            params: Vec::new(),
        }
    }

    /// Append an integer parameter after checking it against `range`.
    pub fn int(mut self, name: &'static str, value: impl Into<i64>, range: ParamRange) -> Result<Self> {
        let value = range.check(name, value.into())?;
        self.params.push(Param::Int(value));
        Ok(self)
    }

    /// Append a `1`/`0` flag.
    pub fn flag(mut self, on: bool) -> Self {
        self.params.push(Param::Flag(on));
        self
    }

    /// Append a port letter.
    pub fn port(mut self, port: Port) -> Self {
        self.params.push(Param::Port(port));
        self
    }

    /// Append bytes as uppercase hex pairs, most significant nibble first.
    pub fn hex(mut self, bytes: &[u8]) -> Self {
        self.params.push(Param::Hex(bytes.to_vec()));
        self
    }

    pub fn opcode(&self) -> &'static str {
        self.opcode
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode)?;
        for param in &self.params {
            write!(f, ",{param}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_opcode_has_no_trailing_comma() {
        assert_eq!(Command::new("V").to_string(), "V");
    }

    #[test]
    fn parameters_are_comma_joined() {
        let cmd = Command::new("C")
            .int("dir_a", 255, ParamRange::BYTE)
            .and_then(|c| c.int("dir_b", 0, ParamRange::BYTE))
            .and_then(|c| c.int("dir_c", 7, ParamRange::BYTE))
            .and_then(|c| c.int("analog_count", 13, ParamRange::ANALOG_COUNT))
            .unwrap();
        assert_eq!(cmd.to_string(), "C,255,0,7,13");
        assert_eq!(cmd.opcode(), "C");
        assert_eq!(cmd.params().len(), 4);
    }

    #[test]
    fn ports_flags_and_hex() {
        let cmd = Command::new("PO")
            .port(Port::B)
            .int("pin", 3, ParamRange::PIN)
            .unwrap()
            .flag(true);
        assert_eq!(cmd.to_string(), "PO,B,3,1");

        let bulk = Command::new("BO").hex(&[0x0F, 0xA0, 0x00, 0xFF]);
        assert_eq!(bulk.to_string(), "BO,0FA000FF");
    }

    #[test]
    fn wide_values_keep_their_magnitude() {
        assert_eq!(
            ParamRange::NODE_COUNT.check_wide("value", 4_294_967_295).unwrap(),
            4_294_967_295
        );
        assert!(matches!(
            ParamRange::NODE_COUNT.check_wide("value", 1 << 63),
            Err(BoardError::InvalidArgument { value, .. }) if value == 1i128 << 63
        ));
    }

    #[test]
    fn out_of_range_reports_name_and_bounds() {
        let err = Command::new("PD")
            .int("pin", 8, ParamRange::PIN)
            .unwrap_err();
        assert!(matches!(
            err,
            BoardError::InvalidArgument {
                name: "pin",
                value: 8,
                min: 0,
                max: 7
            }
        ));
    }

    #[test]
    fn range_edges_are_inclusive() {
        assert!(ParamRange::STEPS.contains(-32767));
        assert!(ParamRange::STEPS.contains(32767));
        assert!(!ParamRange::STEPS.contains(-32768));
        assert!(ParamRange::NODE_COUNT.contains(4_294_967_295));
        assert!(!ParamRange::NODE_COUNT.contains(4_294_967_296));
        assert!(!ParamRange::BULK_STREAM_LEN.contains(0));
        assert!(ParamRange::BULK_STREAM_LEN.contains(56));
    }

    #[test]
    fn negative_steps_render_with_sign() {
        let cmd = Command::new("SM")
            .int("duration", 10, ParamRange::DURATION)
            .and_then(|c| c.int("axis1", -32767, ParamRange::STEPS))
            .and_then(|c| c.int("axis2", 1, ParamRange::STEPS))
            .unwrap();
        assert_eq!(cmd.to_string(), "SM,10,-32767,1");
    }
}
