//! Commands shared by every UBW-family board.

use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::Arc;

use eibot_transport::TransportError;
use tracing::info;

use crate::command::{Command, ParamRange};
use crate::decode::{fields, parse_flag, parse_tagged};
use crate::error::{BoardError, Result};
use crate::push::{spawn_dispatcher, PushListener, PushRoute, PushSink, PushStream};
use crate::session::Session;
use crate::types::{PinDirection, Port, PortState, TimerMode};

/// Intervals for push streams; zero would mean "stop".
const STREAM_INTERVAL: ParamRange = ParamRange::new(1, 30000);

impl<W: Write> Session<W> {
    /// `C`: set the direction of every pin (bit set = input) and enable the
    /// first `analog_count` analog channels.
    pub fn configure_ports(&mut self, dir_a: u8, dir_b: u8, dir_c: u8, analog_count: u8) -> Result<()> {
        let cmd = Command::new("C")
            .int("dir_a", dir_a, ParamRange::BYTE)?
            .int("dir_b", dir_b, ParamRange::BYTE)?
            .int("dir_c", dir_c, ParamRange::BYTE)?
            .int("analog_count", analog_count, ParamRange::ANALOG_COUNT)?;
        self.acknowledge(&cmd)
    }

    /// `O`: drive all three output ports.
    pub fn output_state(&mut self, a: u8, b: u8, c: u8) -> Result<()> {
        let cmd = Command::new("O")
            .int("port_a", a, ParamRange::BYTE)?
            .int("port_b", b, ParamRange::BYTE)?
            .int("port_c", c, ParamRange::BYTE)?;
        self.acknowledge(&cmd)
    }

    /// `I`: read the digital state of all three ports.
    ///
    /// Fails with [`BoardError::PushActive`] while a subscription is active,
    /// since the reply would carry the digital push tag.
    pub fn read_port_state(&mut self) -> Result<PortState> {
        if self.push_active() {
            return Err(BoardError::PushActive);
        }
        let reply = self.execute(&Command::new("I"))?;
        match parse_tagged::<u8>(&reply, "I")?.as_slice() {
            [a, b, c] => Ok(PortState { a: *a, b: *b, c: *c }),
            values => Err(BoardError::parse(
                &reply,
                format!("expected 3 port values, got {}", values.len()),
            )),
        }
    }

    /// `V`: the firmware version line.
    pub fn version(&mut self) -> Result<String> {
        self.execute(&Command::new("V"))
    }

    /// `R`: reset the board to its power-on state.
    pub fn reset(&mut self) -> Result<()> {
        self.acknowledge(&Command::new("R"))
    }

    /// `T`: sample inputs every `interval_ms` and deliver them to `listener`.
    ///
    /// An interval of zero stops the timer and removes the listener instead.
    /// A new subscription replaces the previous one, which then receives
    /// nothing further.
    pub fn subscribe_push<L: PushListener>(
        &mut self,
        interval_ms: u32,
        mode: TimerMode,
        listener: L,
    ) -> Result<()> {
        let cmd = timer_command(interval_ms, mode)?;
        if interval_ms == 0 {
            self.router.clear();
            return self.acknowledge(&cmd);
        }
        self.ensure_open()?;

        let (tx, rx) = mpsc::channel();
        let active = Arc::new(AtomicBool::new(true));
        let dispatcher =
            spawn_dispatcher(rx, Arc::clone(&active), listener).map_err(TransportError::Io)?;
        self.dispatcher = Some(dispatcher);

        self.start_timer(&cmd, PushSink::Queue(tx), active, mode, interval_ms)
    }

    /// `T,0`: stop the timer and drop the current subscription.
    pub fn cancel_push(&mut self, mode: TimerMode) -> Result<()> {
        let cmd = timer_command(0, mode)?;
        self.router.clear();
        self.acknowledge(&cmd)
    }

    /// Like [`Session::subscribe_push`], but hands packets out as a blocking iterator.
    pub fn push_stream(&mut self, interval_ms: u32, mode: TimerMode) -> Result<PushStream> {
        STREAM_INTERVAL.check("interval_ms", interval_ms.into())?;
        let cmd = timer_command(interval_ms, mode)?;
        self.ensure_open()?;

        let (tx, rx) = mpsc::channel();
        let active = Arc::new(AtomicBool::new(true));
        self.start_timer(&cmd, PushSink::Queue(tx), Arc::clone(&active), mode, interval_ms)?;
        Ok(PushStream::new(rx, active))
    }

    /// Like [`Session::push_stream`], for async consumers.
    #[cfg(feature = "async")]
    pub fn push_stream_async(
        &mut self,
        interval_ms: u32,
        mode: TimerMode,
    ) -> Result<crate::push::AsyncPushStream> {
        STREAM_INTERVAL.check("interval_ms", interval_ms.into())?;
        let cmd = timer_command(interval_ms, mode)?;
        self.ensure_open()?;

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(true));
        self.start_timer(&cmd, PushSink::Async(tx), Arc::clone(&active), mode, interval_ms)?;
        Ok(crate::push::AsyncPushStream::new(rx, active))
    }

    /// `A`: the most recent sample of every enabled analog channel.
    ///
    /// Fails with [`BoardError::PushActive`] while a subscription is active.
    pub fn sample_analog_inputs(&mut self) -> Result<Vec<u32>> {
        if self.push_active() {
            return Err(BoardError::PushActive);
        }
        let reply = self.execute(&Command::new("A"))?;
        parse_tagged(&reply, "A")
    }

    /// `MR`: read one byte of RAM.
    pub fn memory_read(&mut self, address: u16) -> Result<u8> {
        let cmd = Command::new("MR").int("address", address, ParamRange::ADDRESS)?;
        let reply = self.execute(&cmd)?;
        match parse_tagged::<u8>(&reply, "MR")?.as_slice() {
            [value] => Ok(*value),
            _ => Err(BoardError::parse(&reply, "expected MR,<value>")),
        }
    }

    /// `MW`: write one byte of RAM.
    pub fn memory_write(&mut self, address: u16, value: u8) -> Result<()> {
        let cmd = Command::new("MW")
            .int("address", address, ParamRange::ADDRESS)?
            .int("value", value, ParamRange::BYTE)?;
        self.acknowledge(&cmd)
    }

    /// `PD`: set the direction of a single pin.
    pub fn set_pin_direction(&mut self, port: Port, pin: u8, direction: PinDirection) -> Result<()> {
        let cmd = Command::new("PD")
            .port(port)
            .int("pin", pin, ParamRange::PIN)?
            .int("direction", direction.code(), ParamRange::new(0, 1))?;
        self.acknowledge(&cmd)
    }

    /// `PI`: read a single pin.
    pub fn read_pin(&mut self, port: Port, pin: u8) -> Result<bool> {
        let cmd = Command::new("PI")
            .port(port)
            .int("pin", pin, ParamRange::PIN)?;
        let reply = self.execute(&cmd)?;
        match fields(&reply).as_slice() {
            [tag, value] if tag.eq_ignore_ascii_case("PI") => parse_flag(&reply, value),
            _ => Err(BoardError::parse(&reply, "expected PI,<0|1>")),
        }
    }

    /// `PO`: drive a single pin.
    pub fn write_pin(&mut self, port: Port, pin: u8, high: bool) -> Result<()> {
        let cmd = Command::new("PO")
            .port(port)
            .int("pin", pin, ParamRange::PIN)?
            .flag(high);
        self.acknowledge(&cmd)
    }

    /// `CU`: set a board-wide configuration parameter.
    pub fn configure_unit(&mut self, parameter: u8, value: u8) -> Result<()> {
        let cmd = Command::new("CU")
            .int("parameter", parameter, ParamRange::BYTE)?
            .int("value", value, ParamRange::BYTE)?;
        self.acknowledge(&cmd)
    }

    /// `RC`: drive an RC servo pulse on a pin, in units of 83.3ns.
    pub fn rc_servo_output(&mut self, port: Port, pin: u8, value: u16) -> Result<()> {
        let cmd = Command::new("RC")
            .port(port)
            .int("pin", pin, ParamRange::PIN)?
            .int("value", value, ParamRange::SERVO_PULSE)?;
        self.acknowledge(&cmd)
    }

    /// `BC`: configure port B for bulk output.
    pub fn bulk_configure(
        &mut self,
        init: u8,
        wait_mask: u8,
        wait_delay: u8,
        strobe_mask: u8,
        strobe_delay: u8,
    ) -> Result<()> {
        let cmd = Command::new("BC")
            .int("init", init, ParamRange::BYTE)?
            .int("wait_mask", wait_mask, ParamRange::BYTE)?
            .int("wait_delay", wait_delay, ParamRange::BYTE)?
            .int("strobe_mask", strobe_mask, ParamRange::BYTE)?
            .int("strobe_delay", strobe_delay, ParamRange::BYTE)?;
        self.acknowledge(&cmd)
    }

    /// `BO`: clock bytes out of port B, sent as hex.
    pub fn bulk_output(&mut self, bytes: &[u8]) -> Result<()> {
        self.acknowledge(&Command::new("BO").hex(bytes))
    }

    /// `BS`: clock bytes out of port B, sent as raw binary.
    pub fn bulk_stream(&mut self, bytes: &[u8]) -> Result<()> {
        let len = ParamRange::BULK_STREAM_LEN.check_wide("length", bytes.len() as u64)?;
        self.acknowledge_raw(&format!("BS,{len},"), bytes)
    }

    fn start_timer(
        &mut self,
        cmd: &Command,
        sink: PushSink,
        active: Arc<AtomicBool>,
        mode: TimerMode,
        interval_ms: u32,
    ) -> Result<()> {
        self.router.install(PushRoute {
            sink,
            active,
            mode,
            interval_ms,
        });
        if let Err(err) = self.acknowledge(cmd) {
            self.router.clear();
            return Err(err);
        }
        info!(interval_ms, ?mode, "push subscription active");
        Ok(())
    }
}

fn timer_command(interval_ms: u32, mode: TimerMode) -> Result<Command> {
    Command::new("T")
        .int("interval_ms", interval_ms, ParamRange::TIMER_INTERVAL)?
        .int("mode", mode.code(), ParamRange::new(0, 1))
}
