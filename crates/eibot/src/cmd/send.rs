use eibot_board::Ebb;

use crate::cmd::SendArgs;
use crate::exit::{board_error, CliResult, SUCCESS};
use crate::output::{print_exchanges, Exchange, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let mut ebb = args.connect.open()?;
    let mut exchanges = Vec::with_capacity(args.commands.len());

    for command in &args.commands {
        match exchange(&mut ebb, command, args.lines) {
            Ok(replies) => exchanges.push(Exchange {
                command: command.clone(),
                replies,
            }),
            Err(err) => {
                // Show what the board already answered before failing.
                if !exchanges.is_empty() {
                    print_exchanges(&exchanges, format);
                }
                return Err(err);
            }
        }
    }

    ebb.close().map_err(|err| board_error("close failed", err))?;
    print_exchanges(&exchanges, format);
    Ok(SUCCESS)
}

fn exchange(ebb: &mut Ebb, command: &str, lines: usize) -> CliResult<Vec<String>> {
    let context = format!("{command} failed");
    let mut replies = vec![ebb
        .execute_raw(command)
        .map_err(|err| board_error(&context, err))?];
    for _ in 1..lines {
        replies.push(
            ebb.read_response()
                .map_err(|err| board_error(&context, err))?,
        );
    }
    Ok(replies)
}
