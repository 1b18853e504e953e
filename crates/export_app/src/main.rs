mod app;
mod console;
mod logging;
mod settings;
mod simulated;

use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use engine_logging::{engine_info, engine_warn};
use export_engine::{ensure_data_dir, JsonFileStore, Scheduler, SystemClock};
use log::LevelFilter;

use crate::console::Console;
use crate::logging::LogDestination;
use crate::settings::{load_settings, DEFAULT_SETTINGS_FILE};
use crate::simulated::{SimulatedAuctionHouse, SimulationConfig};

const LOG_FILE: &str = "auction_export.log";

/// Export auction house listings with item info filled in.
#[derive(Parser, Debug)]
#[command(name = "auction-export", version)]
struct Cli {
    /// RON settings file; missing keys use their defaults
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    /// Directory for the saved scan and the log file
    #[arg(long, env = "AUCTION_EXPORT_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Where log output goes
    #[arg(long, value_enum, default_value_t = LogDestination::File)]
    log: LogDestination,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Listings in the simulated auction house
    #[arg(long, default_value_t = 2000)]
    auctions: usize,

    /// Seconds the simulated server needs to deliver a bulk scan
    #[arg(long, default_value_t = 3.0)]
    scan_delay: f64,

    /// Simulate a client without the item lookup service
    #[arg(long)]
    no_lookups: bool,

    /// Answer yes to every confirmation
    #[arg(short, long)]
    yes: bool,

    /// Exit once the startup commands have finished
    #[arg(long)]
    once: bool,

    /// Commands to run before reading the console
    commands: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    ensure_data_dir(&cli.data_dir)
        .with_context(|| format!("cannot use data directory {:?}", cli.data_dir))?;
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(cli.log, level, &cli.data_dir.join(LOG_FILE));

    let scan_delay = Duration::try_from_secs_f64(cli.scan_delay)
        .with_context(|| format!("invalid --scan-delay {}", cli.scan_delay))?;
    let settings = load_settings(&cli.settings);

    let console = Rc::new(Console::spawn());
    let config = SimulationConfig {
        auctions: cli.auctions,
        scan_delay,
        lookups_available: !cli.no_lookups,
        auto_confirm: cli.yes,
        ..SimulationConfig::default()
    };
    let (host, server) = SimulatedAuctionHouse::new(config, Some(Rc::clone(&console)));
    let mut scheduler = Scheduler::new(host, SystemClock, settings)
        .with_snapshot_store(Box::new(JsonFileStore::new(cli.data_dir.clone())));
    match scheduler.restore_from_store() {
        Ok(true) => println!("Restored the last saved scan."),
        Ok(false) => {}
        Err(err) => engine_warn!("Ignoring the saved scan: {}", err),
    }
    server.spawn(scheduler.event_sender());

    engine_info!(
        "auction-export started with {} listings",
        scheduler.host().listings().len()
    );
    if !cli.once {
        app::print_help();
    }
    app::run_session(&mut scheduler, &console, &cli.commands, cli.once);
    engine_info!("auction-export exiting");
    Ok(())
}
