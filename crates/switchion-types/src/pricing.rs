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

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which remote price feed to use.
///
/// All three feeds publish the same 24 hourly prices for a calendar day,
/// just in different wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// MISO day-ahead ex-post LMP report (fixed-width CSV line)
    Csv,
    /// Ameren RTP hourly prices API (JSON POST)
    Json,
    /// Ameren retail-energy page (HTML table)
    Html,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Csv => write!(f, "csv"),
            SourceKind::Json => write!(f, "json"),
            SourceKind::Html => write!(f, "html"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(SourceKind::Csv),
            "json" => Ok(SourceKind::Json),
            "html" => Ok(SourceKind::Html),
            other => Err(format!("unknown price source kind: {other}")),
        }
    }
}

/// Unparsed response body from a price feed, tagged with the calendar date
/// it was requested for. Consumed exactly once by `PriceSource::parse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPayload {
    pub body: String,
    pub requested_for: NaiveDate,
}

impl RawPayload {
    pub fn new(body: impl Into<String>, requested_for: NaiveDate) -> Self {
        Self {
            body: body.into(),
            requested_for,
        }
    }
}

/// Hourly price table for one source reporting day ($/kWh, non-negative).
///
/// Keys are local hour indices after Hour-Ending/DST alignment: 0..=23 while
/// DST is in effect, -1..=22 under standard time. Index -1 is the civil hour
/// 23:00 that the source attributes to the following reporting day.
///
/// Built once per calendar day (or on explicit re-fetch) and never mutated
/// afterwards; the scheduler replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    prices: BTreeMap<i8, f64>,
}

impl PriceTable {
    pub fn from_entries(entries: impl IntoIterator<Item = (i8, f64)>) -> Self {
        Self {
            prices: entries.into_iter().collect(),
        }
    }

    /// Price for an aligned hour index, if present.
    pub fn price_at(&self, hour_index: i8) -> Option<f64> {
        self.prices.get(&hour_index).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Arithmetic mean over all hours. `None` for an empty table.
    ///
    /// The daily mean feeds the rolling baseline; it is deliberately not
    /// outlier-trimmed so cheap and expensive days move the cutoff.
    pub fn daily_mean(&self) -> Option<f64> {
        if self.prices.is_empty() {
            return None;
        }
        let sum: f64 = self.prices.values().sum();
        Some(sum / self.prices.len() as f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i8, f64)> + '_ {
        self.prices.iter().map(|(h, p)| (*h, *p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_roundtrip() {
        for kind in [SourceKind::Csv, SourceKind::Json, SourceKind::Html] {
            let parsed: SourceKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("xml".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_daily_mean() {
        let table = PriceTable::from_entries([(0, 0.02), (1, 0.04), (2, 0.06)]);
        assert!((table.daily_mean().unwrap() - 0.04).abs() < 1e-12);
        assert!(PriceTable::default().daily_mean().is_none());
    }

    #[test]
    fn test_price_at_synthetic_slot() {
        let table = PriceTable::from_entries([(-1, 0.031), (0, 0.025)]);
        assert_eq!(table.price_at(-1), Some(0.031));
        assert_eq!(table.price_at(23), None);
    }
}
