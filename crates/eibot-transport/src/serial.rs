use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::BoardStream;

/// Default baud rate. The board enumerates as USB CDC, so the value is
/// nominal, but the link is still configured with it.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// USB vendor id of the EiBotBoard (Microchip).
pub const EBB_VID: u16 = 0x04D8;

/// USB product id of the EiBotBoard.
pub const EBB_PID: u16 = 0xFD92;

/// Serial link parameters. Framing is always 8N1 without flow control.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Baud rate. Default: 9600.
    pub baud_rate: u32,
    /// Read timeout applied to the opened port. Readers treat a timeout as a
    /// poll tick, so this bounds how long a close takes to be noticed.
    pub read_timeout: Duration,
    /// Discard stale bytes buffered by the driver right after opening.
    pub clear_on_open: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(100),
            clear_on_open: true,
        }
    }
}

/// A serial port discovered on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    /// Port name (e.g. "/dev/ttyACM0", "COM3").
    pub name: String,
    /// USB vendor id, if the port is USB backed.
    pub vid: Option<u16>,
    /// USB product id, if the port is USB backed.
    pub pid: Option<u16>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
}

impl PortInfo {
    /// Whether the USB ids match an EiBotBoard.
    pub fn is_board(&self) -> bool {
        self.vid == Some(EBB_VID) && self.pid == Some(EBB_PID)
    }
}

/// Serial port access for the board.
pub struct SerialLink;

impl SerialLink {
    /// Open the serial port at `path` with default link parameters.
    pub fn open(path: impl AsRef<Path>) -> Result<BoardStream> {
        Self::open_with_config(path, &LinkConfig::default())
    }

    /// Open the serial port at `path` with explicit link parameters.
    pub fn open_with_config(path: impl AsRef<Path>, config: &LinkConfig) -> Result<BoardStream> {
        let path = path.as_ref();
        let name = path.to_string_lossy();

        let port = serialport::new(name.as_ref(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let stream = BoardStream::from_serial(port);
        if config.clear_on_open {
            stream.clear_buffers()?;
        }

        info!(?path, baud = config.baud_rate, "opened serial link");
        Ok(stream)
    }

    /// List every serial port on this host.
    pub fn available_ports() -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;

        let infos: Vec<PortInfo> = ports
            .into_iter()
            .map(|port| match port.port_type {
                SerialPortType::UsbPort(usb) => PortInfo {
                    name: port.port_name,
                    vid: Some(usb.vid),
                    pid: Some(usb.pid),
                    manufacturer: usb.manufacturer,
                    product: usb.product,
                    serial_number: usb.serial_number,
                },
                _ => PortInfo {
                    name: port.port_name,
                    vid: None,
                    pid: None,
                    manufacturer: None,
                    product: None,
                    serial_number: None,
                },
            })
            .collect();

        debug!(count = infos.len(), "enumerated serial ports");
        Ok(infos)
    }

    /// List the serial ports whose USB ids match an EiBotBoard.
    pub fn board_ports() -> Result<Vec<PortInfo>> {
        Ok(Self::available_ports()?
            .into_iter()
            .filter(PortInfo::is_board)
            .collect())
    }
}
