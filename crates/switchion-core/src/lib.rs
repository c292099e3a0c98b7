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

//! SwitchION core: hourly price acquisition, baseline tracking and the
//! supervisory control loop for a single price-switched load.

pub mod align;
pub mod baseline;
pub mod clock;
pub mod decision;
pub mod devices;
pub mod scheduler;
pub mod source;

pub use align::{align, effective_date};
pub use baseline::{BaselineError, BaselineStore};
pub use clock::{FixedClock, SystemClock, TimeProvider};
pub use decision::{Decision, LoadState, decide, decide_price};
pub use devices::{KvStore, LedColor, Relay, RelayCode, StatusLed, TimeAuthority, Watchdog};
pub use scheduler::Scheduler;
pub use source::{PriceSource, SourceError, make_source};
