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

//! Local civil time with a resynchronizable offset.
//!
//! The device has no battery-backed clock, so the wall-clock offset learned
//! from a time authority is process state. Every time-dependent computation
//! reads through [`TimeProvider`] so backtests can inject a frozen instant.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::{OffsetComponents, Tz};
use tracing::info;

use crate::devices::TimeAuthority;

/// Whether Daylight Saving Time is in effect at `instant`.
pub fn is_dst(instant: DateTime<Tz>) -> bool {
    instant.offset().dst_offset() != Duration::zero()
}

/// Supplies current local civil time for all other components.
pub trait TimeProvider {
    fn now(&self) -> DateTime<Tz>;

    fn dst_in_effect(&self) -> bool {
        is_dst(self.now())
    }

    /// Resynchronize against an external time authority.
    ///
    /// Default is a no-op; only the real clock carries an offset.
    fn resync(&mut self, _authority: &dyn TimeAuthority) -> Result<()> {
        Ok(())
    }
}

/// Real clock: system time plus the last-resynchronized offset, rendered in
/// the site's timezone.
#[derive(Debug, Clone)]
pub struct SystemClock {
    tz: Tz,
    offset: Duration,
}

impl SystemClock {
    pub fn new(timezone: &str) -> Result<Self> {
        let tz: Tz = timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid timezone {timezone:?}: {e}"))?;
        Ok(Self {
            tz,
            offset: Duration::zero(),
        })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl TimeProvider for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        (Utc::now() + self.offset).with_timezone(&self.tz)
    }

    fn resync(&mut self, authority: &dyn TimeAuthority) -> Result<()> {
        let reported = authority
            .utc_now()
            .context("time authority unreachable")?;
        self.offset = reported - Utc::now();
        info!(
            "Clock resynchronized, offset now {} ms",
            self.offset.num_milliseconds()
        );
        Ok(())
    }
}

/// Frozen clock for tests and offline backtesting.
#[derive(Debug, Clone)]
pub struct FixedClock {
    pub instant: DateTime<Tz>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Tz>) -> Self {
        Self { instant }
    }
}

impl TimeProvider for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        self.instant
    }
}
