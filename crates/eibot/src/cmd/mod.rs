use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use eibot_board::{Ebb, SessionConfig, TimerMode};
use eibot_transport::{LinkConfig, DEFAULT_BAUD_RATE};
use tracing::debug;

use crate::exit::{board_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod ports;
pub mod send;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports and mark connected boards.
    Ports(PortsArgs),
    /// Print firmware version and, for an EBB, pen and motor status.
    Info(InfoArgs),
    /// Send raw command lines and print the replies.
    Send(SendArgs),
    /// Start the input timer and print pushed samples.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// How to reach the board.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Serial port of the board (e.g. /dev/ttyACM0, COM3).
    #[arg(env = "EIBOT_PORT")]
    pub port: PathBuf,
    /// Baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Reply timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Skip the reset normally sent after opening.
    #[arg(long)]
    pub no_reset: bool,
}

impl ConnectArgs {
    pub fn open(&self) -> CliResult<Ebb> {
        let link = LinkConfig {
            baud_rate: self.baud,
            ..LinkConfig::default()
        };
        let config = SessionConfig {
            response_timeout: Some(parse_duration(&self.timeout)?),
            reset_on_open: !self.no_reset,
            ..SessionConfig::default()
        };
        debug!(port = %self.port.display(), baud = self.baud, "opening board");
        Ebb::open_with_config(&self.port, &link, config)
            .map_err(|err| board_error(&format!("open {} failed", self.port.display()), err))
    }
}

#[derive(Args, Debug)]
pub struct PortsArgs {
    /// Only list ports whose USB ids match an EiBotBoard.
    #[arg(long)]
    pub boards: bool,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Command lines to send in order, without the terminator (e.g. V, "SM,1000,100,0").
    #[arg(required = true)]
    pub commands: Vec<String>,
    /// Reply lines to read per command. Queries such as QC answer with two.
    #[arg(long, default_value_t = 1)]
    pub lines: usize,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum WatchMode {
    Digital,
    Analog,
}

impl From<WatchMode> for TimerMode {
    fn from(mode: WatchMode) -> Self {
        match mode {
            WatchMode::Digital => TimerMode::Digital,
            WatchMode::Analog => TimerMode::Analog,
        }
    }
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Sampling interval in milliseconds (1-30000).
    #[arg(long, default_value_t = 100)]
    pub interval: u32,
    /// What the board samples.
    #[arg(long, value_enum, default_value = "digital")]
    pub mode: WatchMode,
    /// Exit after printing N packets.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
