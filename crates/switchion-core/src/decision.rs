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

//! The per-hour ON/OFF decision. Pure functions of their inputs; the
//! scheduler owns all state and threads it through as arguments.

use serde::{Deserialize, Serialize};
use switchion_types::PriceTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    On,
    Off,
}

/// Outcome of one hourly evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub state: LoadState,
    /// Human-readable rationale, logged and surfaced unchanged.
    pub reason: &'static str,
    /// Set when the fall-through rule fired: floor/ceiling/cutoff are
    /// mutually inconsistent (or the cutoff is not a number). Never ON.
    pub anomaly: bool,
}

/// Decide for a known hourly price. First matching rule wins.
pub fn decide_price(price: f64, cutoff: f64, floor: f64, ceiling: f64) -> Decision {
    if price <= floor {
        Decision {
            state: LoadState::On,
            reason: "below absolute floor",
            anomaly: false,
        }
    } else if price <= cutoff {
        Decision {
            state: LoadState::On,
            reason: "at/below adjusted cutoff",
            anomaly: false,
        }
    } else if price > ceiling {
        Decision {
            state: LoadState::Off,
            reason: "above absolute ceiling",
            anomaly: false,
        }
    } else if price > cutoff {
        Decision {
            state: LoadState::Off,
            reason: "above adjusted cutoff",
            anomaly: false,
        }
    } else {
        // Unreachable with consistent finite thresholds. A NaN cutoff (e.g.
        // arithmetic on a corrupted baseline) lands here and must stay OFF.
        Decision {
            state: LoadState::Off,
            reason: "inconsistent floor/ceiling/cutoff configuration",
            anomaly: true,
        }
    }
}

/// Decide for an aligned hour index in `table`.
///
/// `None` when the table has no entry for that index (misaligned or partial
/// data); the caller decides how to fail safe.
pub fn decide(
    table: &PriceTable,
    hour_index: i8,
    cutoff: f64,
    floor: f64,
    ceiling: f64,
) -> Option<Decision> {
    table
        .price_at(hour_index)
        .map(|price| decide_price(price, cutoff, floor, ceiling))
}
