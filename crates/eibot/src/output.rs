use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use eibot_board::{PushKind, PushPacket};
use eibot_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    #[serde(flatten)]
    port: &'a PortInfo,
    board: bool,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|port| PortOutput {
                    port,
                    board: port.is_board(),
                })
                .collect();
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "USB ID", "PRODUCT", "SERIAL", "BOARD"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    usb_id(port),
                    port.product.clone().unwrap_or_default(),
                    port.serial_number.clone().unwrap_or_default(),
                    if port.is_board() { "yes" } else { "" }.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for port in ports {
                println!(
                    "{} usb={} product={}{}",
                    port.name,
                    usb_id(port),
                    port.product.as_deref().unwrap_or("-"),
                    if port.is_board() { " [board]" } else { "" }
                );
            }
        }
        OutputFormat::Raw => {
            for port in ports {
                println!("{}", port.name);
            }
        }
    }
}

/// One command line and every reply line it produced.
#[derive(Debug, Serialize)]
pub struct Exchange {
    pub command: String,
    pub replies: Vec<String>,
}

pub fn print_exchanges(exchanges: &[Exchange], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(exchanges)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "REPLY"]);
            for exchange in exchanges {
                table.add_row(vec![exchange.command.clone(), exchange.replies.join("\n")]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for exchange in exchanges {
                println!("> {}", exchange.command);
                for reply in &exchange.replies {
                    println!("< {reply}");
                }
            }
        }
        OutputFormat::Raw => {
            for exchange in exchanges {
                for reply in &exchange.replies {
                    println!("{reply}");
                }
            }
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    #[serde(flatten)]
    packet: &'a PushPacket,
    timestamp: String,
}

pub fn print_packet(packet: &PushPacket, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                packet,
                timestamp: now_unix_millis(),
            };
            println!("{}", to_json(&out));
        }
        // One line per packet in both human formats.
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{} {}", kind_name(packet.kind), join_values(&packet.values));
        }
        OutputFormat::Raw => {
            println!("{},{}", packet.kind.tag(), join_values(&packet.values));
        }
    }
}

fn kind_name(kind: PushKind) -> &'static str {
    match kind {
        PushKind::Digital => "digital",
        PushKind::Analog => "analog",
    }
}

fn join_values(values: &[u32]) -> String {
    values
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn usb_id(port: &PortInfo) -> String {
    match (port.vid, port.pid) {
        (Some(vid), Some(pid)) => format!("{vid:04x}:{pid:04x}"),
        _ => String::new(),
    }
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn now_unix_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(vid: Option<u16>, pid: Option<u16>) -> PortInfo {
        PortInfo {
            name: "/dev/ttyACM0".into(),
            vid,
            pid,
            manufacturer: None,
            product: Some("EiBotBoard".into()),
            serial_number: None,
        }
    }

    #[test]
    fn usb_id_is_lower_hex() {
        assert_eq!(usb_id(&port(Some(0x04d8), Some(0xfd92))), "04d8:fd92");
        assert_eq!(usb_id(&port(None, None)), "");
    }

    #[test]
    fn port_json_carries_board_flag() {
        let info = port(Some(eibot_transport::EBB_VID), Some(eibot_transport::EBB_PID));
        let json = to_json(&PortOutput {
            port: &info,
            board: info.is_board(),
        });
        assert!(json.contains("\"name\":\"/dev/ttyACM0\""));
        assert!(json.contains("\"board\":true"));
    }

    #[test]
    fn exchange_json_lists_replies() {
        let json = to_json(&[Exchange {
            command: "QC".into(),
            replies: vec!["0394,0300".into(), "OK".into()],
        }]);
        assert_eq!(json, r#"[{"command":"QC","replies":["0394,0300","OK"]}]"#);
    }

    #[test]
    fn values_are_comma_joined() {
        assert_eq!(join_values(&[1, 22, 333]), "1,22,333");
        assert_eq!(join_values(&[]), "");
    }
}
