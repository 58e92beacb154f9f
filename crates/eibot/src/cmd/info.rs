use eibot_board::{CurrentReading, Ebb, Result};
use serde::Serialize;
use tracing::debug;

use crate::cmd::InfoArgs;
use crate::exit::{board_error, CliResult, SUCCESS};
use crate::output::{to_json, OutputFormat};

#[derive(Serialize)]
struct EbbStatus {
    current: CurrentReading,
    pen_up: bool,
    button_pressed: bool,
    node_count: u64,
    layer: u8,
}

#[derive(Serialize)]
struct InfoOutput {
    port: String,
    version: String,
    ebb: Option<EbbStatus>,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let mut ebb = args.connect.open()?;

    let version = ebb
        .version()
        .map_err(|err| board_error("version query failed", err))?;

    // Plain UBW firmware rejects the EBB queries.
    let status = if is_ebb_firmware(&version) {
        Some(ebb_status(&mut ebb).map_err(|err| board_error("status query failed", err))?)
    } else {
        debug!(%version, "not an EBB firmware, skipping status queries");
        None
    };

    ebb.close().map_err(|err| board_error("close failed", err))?;

    let out = InfoOutput {
        port: args.connect.port.display().to_string(),
        version,
        ebb: status,
    };
    print_info(&out, format);
    Ok(SUCCESS)
}

fn is_ebb_firmware(version: &str) -> bool {
    version.to_ascii_uppercase().contains("EBB")
}

fn ebb_status(ebb: &mut Ebb) -> Result<EbbStatus> {
    Ok(EbbStatus {
        current: ebb.query_current()?,
        pen_up: ebb.query_pen()?,
        button_pressed: ebb.query_button()?,
        node_count: ebb.query_node_count()?,
        layer: ebb.query_layer()?,
    })
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(out)),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Board Info:");
            println!("  Port:        {}", out.port);
            println!("  Firmware:    {}", out.version);
            if let Some(status) = &out.ebb {
                println!(
                    "  Current:     ra0={} v+={}",
                    status.current.ra0, status.current.vplus
                );
                println!(
                    "  Pen:         {}",
                    if status.pen_up { "up" } else { "down" }
                );
                println!("  Button:      {}", status.button_pressed);
                println!("  Node count:  {}", status.node_count);
                println!("  Layer:       {}", status.layer);
            }
        }
        OutputFormat::Raw => println!("{}", out.version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_ebb_firmware() {
        assert!(is_ebb_firmware("EBBv13_and_above EB Firmware Version 2.4.2"));
        assert!(!is_ebb_firmware("UBW FW D Version 1.4.3"));
    }
}
