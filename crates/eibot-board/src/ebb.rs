//! EiBotBoard extensions: steppers, pen servo, node counter.

use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use eibot_transport::{BoardStream, LinkConfig};

use crate::command::{Command, ParamRange};
use crate::decode::{fields, parse_field, parse_flag};
use crate::error::{BoardError, Result};
use crate::session::{Session, SessionConfig};
use crate::types::CurrentReading;

/// An EiBotBoard session.
///
/// Dereferences to [`Session`], so every UBW command is available too.
pub struct Ebb<W: Write = BoardStream> {
    session: Session<W>,
}

impl Ebb<BoardStream> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Session::open(path)?))
    }

    pub fn open_with_config(
        path: impl AsRef<Path>,
        link: &LinkConfig,
        config: SessionConfig,
    ) -> Result<Self> {
        Ok(Self::new(Session::open_with_config(path, link, config)?))
    }
}

impl<W: Write> Ebb<W> {
    pub fn new(session: Session<W>) -> Self {
        Self { session }
    }

    pub fn into_session(self) -> Session<W> {
        self.session
    }

    /// `QC`: voltages on REF_RA0 and V+.
    pub fn query_current(&mut self) -> Result<CurrentReading> {
        let reply = self.query(&Command::new("QC"))?;
        match fields(&reply).as_slice() {
            [ra0, vplus] => Ok(CurrentReading {
                ra0: parse_field(&reply, ra0, "ra0")?,
                vplus: parse_field(&reply, vplus, "vplus")?,
            }),
            _ => Err(BoardError::parse(&reply, "expected <ra0>,<vplus>")),
        }
    }

    /// `NI`: increment the node counter.
    pub fn node_count_increment(&mut self) -> Result<()> {
        self.acknowledge(&Command::new("NI"))
    }

    /// `ND`: decrement the node counter.
    pub fn node_count_decrement(&mut self) -> Result<()> {
        self.acknowledge(&Command::new("ND"))
    }

    /// `BL`: jump into the bootloader. The board stops answering commands afterwards.
    pub fn boot_load(&mut self) -> Result<()> {
        self.acknowledge(&Command::new("BL"))
    }

    /// `SN`: set the 32-bit node counter.
    pub fn set_node_count(&mut self, value: u64) -> Result<()> {
        let value = ParamRange::NODE_COUNT.check_wide("value", value)?;
        let cmd = Command::new("SN").int("value", value, ParamRange::NODE_COUNT)?;
        self.acknowledge(&cmd)
    }

    /// `QN`: read the node counter.
    pub fn query_node_count(&mut self) -> Result<u64> {
        let reply = self.query(&Command::new("QN"))?;
        parse_field(&reply, reply.trim(), "node count")
    }

    /// `SL`: set the layer variable.
    pub fn set_layer(&mut self, layer: u8) -> Result<()> {
        let cmd = Command::new("SL").int("layer", layer, ParamRange::BYTE)?;
        self.acknowledge(&cmd)
    }

    /// `QL`: read the layer variable.
    pub fn query_layer(&mut self) -> Result<u8> {
        let reply = self.query(&Command::new("QL"))?;
        parse_field(&reply, reply.trim(), "layer")
    }

    /// `QB`: whether the PRG button was pressed since the last query.
    pub fn query_button(&mut self) -> Result<bool> {
        let reply = self.query(&Command::new("QB"))?;
        parse_flag(&reply, reply.trim())
    }

    /// `QP`: whether the pen is up.
    pub fn query_pen(&mut self) -> Result<bool> {
        let reply = self.query(&Command::new("QP"))?;
        parse_flag(&reply, reply.trim())
    }

    /// `TP`: toggle the pen with the board's default delay.
    pub fn toggle_pen(&mut self) -> Result<()> {
        self.acknowledge(&Command::new("TP"))
    }

    /// `TP,d`: toggle the pen, then hold off the next command for `duration` ms.
    pub fn toggle_pen_for(&mut self, duration: u16) -> Result<()> {
        let cmd = Command::new("TP").int("duration", duration, ParamRange::DURATION)?;
        self.acknowledge(&cmd)
    }

    /// `SM`: move both steppers in a straight line over `duration` ms.
    pub fn stepper_move(&mut self, duration: u16, axis1: i32, axis2: i32) -> Result<()> {
        let cmd = Command::new("SM")
            .int("duration", duration, ParamRange::DURATION)?
            .int("axis1", axis1, ParamRange::STEPS)?
            .int("axis2", axis2, ParamRange::STEPS)?;
        self.acknowledge(&cmd)
    }

    /// `SP`: raise or lower the pen.
    pub fn set_pen_state(&mut self, down: bool) -> Result<()> {
        self.acknowledge(&Command::new("SP").flag(down))
    }

    /// `SP,s,d`: raise or lower the pen, then hold off the next command for `duration` ms.
    pub fn set_pen_state_for(&mut self, down: bool, duration: u16) -> Result<()> {
        let cmd = Command::new("SP")
            .flag(down)
            .int("duration", duration, ParamRange::DURATION)?;
        self.acknowledge(&cmd)
    }

    /// `EM`: enable or disable the motor drivers.
    ///
    /// `enable1` above 1 selects a microstep mode for both drivers, in which
    /// case `enable2` is not sent.
    pub fn enable_motors(&mut self, enable1: u8, enable2: u8) -> Result<()> {
        let cmd = Command::new("EM").int("enable1", enable1, ParamRange::MOTOR_ENABLE)?;
        let cmd = if enable1 > 1 {
            ParamRange::MOTOR2_ENABLE.check("enable2", enable2.into())?;
            cmd
        } else {
            cmd.int("enable2", enable2, ParamRange::MOTOR2_ENABLE)?
        };
        self.acknowledge(&cmd)
    }

    /// `SC`: stepper and servo configuration.
    pub fn stepper_mode_configure(&mut self, parameter: u8, value: u16) -> Result<()> {
        let cmd = Command::new("SC")
            .int("parameter", parameter, ParamRange::BYTE)?
            .int("value", value, ParamRange::DURATION)?;
        self.acknowledge(&cmd)
    }

    /// `S2`: drive an RC servo channel.
    pub fn servo_output(&mut self, channel: u8, duration: u16, pin: u8, rate: u16) -> Result<()> {
        let cmd = Command::new("S2")
            .int("channel", channel, ParamRange::S2_CHANNEL)?
            .int("duration", duration, ParamRange::S2_DURATION)?
            .int("pin", pin, ParamRange::S2_PIN)?
            .int("rate", rate, ParamRange::DURATION)?;
        self.acknowledge(&cmd)
    }
}

impl<W: Write> Deref for Ebb<W> {
    type Target = Session<W>;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl<W: Write> DerefMut for Ebb<W> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}
