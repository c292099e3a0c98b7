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

//! Software watchdog.
//!
//! The control loop must feed it at least once per window. A monitor
//! thread checks at a quarter of the window; on starvation it terminates
//! the process so the service supervisor restarts us into a clean state.
//! A wedged loop holding the relay ON during expensive hours is the
//! failure this guards against.

use anyhow::{Context, Result};
use std::process;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::error;

use switchion_core::Watchdog;

pub struct SoftWatchdog {
    last_fed: Arc<Mutex<Instant>>,
}

/// Starvation predicate, kept free of clock and thread plumbing.
fn starved(since_last_feed: Duration, window: Duration) -> bool {
    since_last_feed >= window
}

impl SoftWatchdog {
    /// Start the monitor thread.
    pub fn spawn(window: Duration) -> Result<Self> {
        let last_fed = Arc::new(Mutex::new(Instant::now()));
        let monitor = last_fed.clone();

        thread::Builder::new()
            .name("watchdog".to_owned())
            .spawn(move || {
                loop {
                    thread::sleep(window / 4);
                    // A poisoned lock means the loop thread panicked, which
                    // is starvation by another name.
                    let elapsed = match monitor.lock() {
                        Ok(guard) => guard.elapsed(),
                        Err(_) => window,
                    };
                    if starved(elapsed, window) {
                        error!(
                            "Watchdog starved: control loop silent for {:.0}s (window {:.0}s), restarting",
                            elapsed.as_secs_f64(),
                            window.as_secs_f64()
                        );
                        process::exit(1);
                    }
                }
            })
            .context("cannot spawn watchdog thread")?;

        Ok(Self { last_fed })
    }

    #[cfg(test)]
    fn since_last_feed(&self) -> Duration {
        self.last_fed.lock().map(|g| g.elapsed()).unwrap_or_default()
    }
}

impl Watchdog for SoftWatchdog {
    fn feed(&mut self) {
        if let Ok(mut guard) = self.last_fed.lock() {
            *guard = Instant::now();
        }
    }
}
