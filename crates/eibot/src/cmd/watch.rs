use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use eibot_board::{PushPacket, TimerMode};
use tracing::info;

use crate::cmd::WatchArgs;
use crate::exit::{board_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_packet, OutputFormat};

const TICK: Duration = Duration::from_millis(200);

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let mut ebb = args.connect.open()?;
    let mode = TimerMode::from(args.mode);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (tx, rx) = mpsc::channel::<PushPacket>();
    ebb.subscribe_push(args.interval, mode, move |packet: PushPacket| {
        let _ = tx.send(packet);
    })
    .map_err(|err| board_error("subscribe failed", err))?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let packet = match rx.recv_timeout(TICK) {
            Ok(packet) => packet,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        print_packet(&packet, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    info!(printed, "stopping input timer");
    ebb.cancel_push(mode)
        .map_err(|err| board_error("cancel failed", err))?;
    ebb.close().map_err(|err| board_error("close failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
