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

//! Rolling weekly baseline of daily mean prices.
//!
//! One slot per weekday (0-6). Writing a slot overwrites last week's value,
//! so the record can never grow past seven entries and old days age out by
//! slot reuse rather than by timestamp. The record is one JSON mapping under
//! a fixed key in the durable store and survives reboot.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::devices::KvStore;
use switchion_types::PriceTable;

/// Fixed key the record is persisted under.
pub const BASELINE_KEY: &str = "baseline_daily_means_v1";

#[derive(Debug, Error)]
pub enum BaselineError {
    /// First-ever run: no daily mean recorded yet. Resolved by seeding with
    /// the current day's mean before the first decision.
    #[error("no baseline data recorded yet")]
    Unavailable,

    #[error("cannot record an empty price table")]
    EmptyTable,

    #[error("baseline persistence failed: {0}")]
    Store(#[source] anyhow::Error),
}

/// Weekday slot (0-6, Sunday = 0) for a calendar date.
pub fn weekday_slot(date: NaiveDate) -> usize {
    date.weekday().num_days_from_sunday() as usize
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BaselineRecord {
    slots: [Option<f64>; 7],
}

/// Persistent rolling record plus the percentile-adjusted cutoff derivation.
#[derive(Debug)]
pub struct BaselineStore<S: KvStore> {
    store: S,
    record: BaselineRecord,
}

impl<S: KvStore> BaselineStore<S> {
    /// Load the record from the store. A corrupt persisted record is
    /// discarded and reseeded rather than taking the loop down.
    pub fn load(store: S) -> Self {
        let record = match store.get(BASELINE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Discarding corrupt baseline record: {e}");
                    BaselineRecord::default()
                }
            },
            Ok(None) => BaselineRecord::default(),
            Err(e) => {
                warn!("Baseline store unreadable, starting empty: {e}");
                BaselineRecord::default()
            }
        };
        Self { store, record }
    }

    /// Record today's mean price into its weekday slot and persist.
    ///
    /// Overwrites any prior value for that slot. Returns the recorded mean.
    pub fn record_daily(
        &mut self,
        table: &PriceTable,
        weekday_slot: usize,
    ) -> Result<f64, BaselineError> {
        debug_assert!(weekday_slot < 7);
        let mean = table.daily_mean().ok_or(BaselineError::EmptyTable)?;
        self.record.slots[weekday_slot % 7] = Some(mean);

        let encoded = serde_json::to_string(&self.record)
            .map_err(|e| BaselineError::Store(e.into()))?;
        self.store
            .put(BASELINE_KEY, &encoded)
            .map_err(BaselineError::Store)?;

        debug!("Recorded daily mean {mean:.4} into weekday slot {weekday_slot}");
        Ok(mean)
    }

    /// Percentile-adjusted decision cutoff over the most recent entries.
    ///
    /// Reads up to `window` populated slots counting backward from the
    /// current weekday (wrapping mod 7), averages them and applies
    /// `avg + avg * (percentile - 50) / 100`. Percentile 50 is a no-op.
    pub fn cutoff(
        &self,
        today_slot: usize,
        window: usize,
        percentile: f64,
    ) -> Result<f64, BaselineError> {
        debug_assert!((1..=7).contains(&window));
        let mut recent = Vec::with_capacity(window);
        for back in 0..7 {
            if recent.len() == window {
                break;
            }
            let slot = (today_slot + 7 - back) % 7;
            if let Some(mean) = self.record.slots[slot] {
                recent.push(mean);
            }
        }

        if recent.is_empty() {
            return Err(BaselineError::Unavailable);
        }

        let avg: f64 = recent.iter().sum::<f64>() / recent.len() as f64;
        Ok(avg + avg * (percentile - 50.0) / 100.0)
    }

    /// Number of populated weekday slots (never more than 7).
    pub fn entry_count(&self) -> usize {
        self.record.slots.iter().filter(|s| s.is_some()).count()
    }
}
