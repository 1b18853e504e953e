//! The console session: feed typed lines to the scheduler and keep polling it.

use std::thread;
use std::time::Duration;

use engine_logging::engine_debug;
use export_core::Command;
use export_engine::{Clock, Scheduler};

use crate::console::{Console, Input};
use crate::simulated::SimulatedAuctionHouse;

const LOOP_INTERVAL: Duration = Duration::from_millis(20);

pub type ExportScheduler<C> = Scheduler<SimulatedAuctionHouse, C>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub fn print_help() {
    println!("Commands:");
    println!("  run      request a bulk scan, read it, enrich item info, final pass");
    println!("  scan     request a bulk scan and wait for the data");
    println!("  read     read the current scan data");
    println!("  enrich   fill missing item info in the stored scan");
    println!("  cancel   stop the active job");
    println!("  clear    drop the stored scan");
    println!("  status   show the active job and the stored scan");
    println!("  open     open the auction house view");
    println!("  close    close the auction house view");
    println!("  help     show this list");
    println!("  quit     exit");
}

/// Handle one typed line. Start failures are already reported to the user
/// by the scheduler.
pub fn handle_line<C: Clock>(scheduler: &mut ExportScheduler<C>, line: &str) -> Control {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "" => {}
        "quit" | "exit" => return Control::Quit,
        "help" | "?" => print_help(),
        "open" => {
            scheduler.host().set_view_open(true);
            println!("Auction house view opened.");
        }
        "close" => {
            scheduler.host().set_view_open(false);
            println!("Auction house view closed.");
        }
        _ => match line.parse::<Command>() {
            Ok(command) => {
                if let Err(err) = scheduler.execute(command) {
                    engine_debug!("{command} refused: {err}");
                }
            }
            Err(err) => println!("{err}"),
        },
    }
    Control::Continue
}

/// Run `startup` lines, then read the console until `quit`.
///
/// With `exit_when_idle` the session ends as soon as no job is active. Closed
/// input (end of a piped script) also ends the session once the last job
/// finishes.
pub fn run_session<C: Clock>(
    scheduler: &mut ExportScheduler<C>,
    console: &Console,
    startup: &[String],
    exit_when_idle: bool,
) {
    for line in startup {
        println!("> {line}");
        if handle_line(scheduler, line) == Control::Quit {
            return;
        }
    }

    let mut input_open = true;
    loop {
        while input_open {
            match console.try_line() {
                Input::Line(line) => {
                    if handle_line(scheduler, &line) == Control::Quit {
                        return;
                    }
                }
                Input::Empty => break,
                Input::Closed => input_open = false,
            }
        }

        scheduler.poll();

        let idle = scheduler.active_kind().is_none();
        if idle && (exit_when_idle || !input_open) {
            return;
        }
        thread::sleep(LOOP_INTERVAL);
    }
}
