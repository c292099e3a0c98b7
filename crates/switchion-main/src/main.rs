// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of SwitchION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

mod authority;
mod config;
mod led;
mod rf;
mod store;
mod version;
mod watchdog;

use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use switchion_core::{BaselineStore, Scheduler, SystemClock, TimeProvider, make_source};

fn main() -> Result<()> {
    // Handle command line arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" => {
                println!("SwitchION - Price-Switched Load Controller");
                println!("Version: {}", version::VERSION);
                println!();
                println!("Usage: switchion [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help    Print this help message");
                println!("  -v, --version Print version");
                return Ok(());
            }
            "--version" | "-v" => {
                println!("{}", version::VERSION);
                return Ok(());
            }
            _ => {}
        }
    }

    // Initialize tracing with env filter support
    // Respects RUST_LOG environment variable
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = config::load()?;

    info!("Starting SwitchION v{}", version::VERSION);
    info!("Configuration summary:");
    info!("   Feed: {} ({})", config.source.kind, config.source.timezone);
    info!(
        "   Policy: floor {} / ceiling {} $/kWh, window {}d, percentile {}",
        config.policy.floor_price,
        config.policy.ceiling_price,
        config.policy.window_days,
        config.policy.percentile
    );
    info!("   Device: {} via {}", config.device.device_id, config.device.codes_path);
    info!(
        "   Schedule: tick {}s, watchdog {}s",
        config.schedule.tick_secs, config.schedule.watchdog_timeout_secs
    );

    let request_timeout = Duration::from_secs(config.source.request_timeout_secs);

    let mut clock = SystemClock::new(&config.source.timezone)?;
    let time_authority = authority::HttpTimeAuthority::new(request_timeout)?;
    if let Err(e) = clock.resync(&time_authority) {
        warn!("Initial clock resync failed, running on system time: {e}");
    }

    let source = make_source(config.source.kind, clock.timezone(), request_timeout)?;

    let file_store = store::FileStore::open(&config.device.state_path)?;
    let baseline = BaselineStore::load(file_store);
    info!(
        "Baseline loaded with {} of 7 weekday slots populated",
        baseline.entry_count()
    );

    let relay = rf::RfTransmitter::from_codes_file(&config.device.codes_path, &config.device.device_id)?;
    let soft_watchdog =
        watchdog::SoftWatchdog::spawn(Duration::from_secs(config.schedule.watchdog_timeout_secs))?;

    let mut scheduler = Scheduler::new(
        clock,
        source,
        baseline,
        Box::new(relay),
        Box::new(led::LogLed::default()),
        Box::new(soft_watchdog),
        Box::new(time_authority),
        config.policy.clone(),
        config.schedule.clone(),
    );

    scheduler.run()
}
