use eibot_transport::SerialLink;

use crate::cmd::PortsArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let ports = if args.boards {
        SerialLink::board_ports()
    } else {
        SerialLink::available_ports()
    }
    .map_err(|err| transport_error("port enumeration failed", err))?;

    print_ports(&ports, format);
    Ok(SUCCESS)
}
