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

//! Price feed backends.
//!
//! Three wire formats, one contract: fetch a day's raw payload, parse it
//! into the aligned hourly table, and check a cached payload's embedded
//! date without re-fetching. Switching backends must not change decision
//! behavior for equivalent price data, so all backends normalize to the
//! same index range: 0..=23 while DST is in effect, -1..=22 under standard
//! time (see `crate::align`).

mod ameren_html;
mod ameren_json;
mod miso_csv;

pub use ameren_html::AmerenHtmlSource;
pub use ameren_json::AmerenJsonSource;
pub use miso_csv::MisoCsvSource;

use anyhow::Result as AnyResult;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use reqwest::blocking::Client;
use std::time::Duration;
use thiserror::Error;

use crate::clock::is_dst;
use switchion_types::{PriceTable, RawPayload, SourceKind};

/// Identifies this project to the upstream feeds, as they ask of scrapers.
pub const USER_AGENT: &str = "https://github.com/SolarE-cz/switchion";

#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport failure or timeout. Transient; retried next tick.
    #[error("price feed unavailable: {0}")]
    Unavailable(String),

    /// The remote refuses to serve data for this date (typically a future
    /// date requested before the daily publication cutoff).
    #[error("feed refused date {date}: {reason}")]
    DateRejected { date: NaiveDate, reason: String },

    /// Payload present but the expected structural markers are absent.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        SourceError::Unavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// Common contract of the three interchangeable backends.
pub trait PriceSource {
    fn kind(&self) -> SourceKind;

    /// Fetch the raw payload for a calendar date.
    fn fetch(&self, date: NaiveDate) -> Result<RawPayload>;

    /// Parse a payload into the aligned price table.
    ///
    /// Deterministic for identical payload and DST context; `debug_instant`
    /// freezes the DST context for reproducible offline runs instead of
    /// consulting live time.
    fn parse(
        &self,
        payload: &RawPayload,
        debug_instant: Option<DateTime<Tz>>,
    ) -> Result<PriceTable>;

    /// Whether the payload's embedded date matches `date`. Structural check
    /// only, no side effects; lets the scheduler detect staleness without
    /// re-fetching.
    fn date_matches(&self, payload: &RawPayload, date: NaiveDate) -> bool;
}

/// Build the configured backend.
pub fn make_source(
    kind: SourceKind,
    tz: Tz,
    timeout: Duration,
) -> AnyResult<Box<dyn PriceSource>> {
    Ok(match kind {
        SourceKind::Csv => Box::new(MisoCsvSource::new(tz, timeout)?),
        SourceKind::Json => Box::new(AmerenJsonSource::new(tz, timeout)?),
        SourceKind::Html => Box::new(AmerenHtmlSource::new(tz, timeout)?),
    })
}

pub(crate) fn build_client(timeout: Duration) -> AnyResult<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// DST context for a parse: the frozen instant when given, live local time
/// otherwise.
pub(crate) fn dst_context(tz: Tz, debug_instant: Option<DateTime<Tz>>) -> bool {
    let instant = debug_instant.unwrap_or_else(|| Utc::now().with_timezone(&tz));
    is_dst(instant)
}

/// Table key for the n-th of the day's 24 prices (n = Hour Ending - 1).
///
/// Hour-Ending removes one; standard time removes one more because the
/// civil zone then trails the feed's fixed reporting zone by an hour.
pub(crate) fn aligned_key(position: usize, dst: bool) -> i8 {
    debug_assert!(position < 24);
    if dst {
        position as i8
    } else {
        position as i8 - 1
    }
}

/// Substring between two structural markers, if both are present in order.
pub(crate) fn between<'a>(haystack: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = haystack.find(start)? + start.len();
    let len = haystack[from..].find(end)?;
    Some(&haystack[from..from + len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_key_ranges() {
        assert_eq!(aligned_key(0, true), 0);
        assert_eq!(aligned_key(23, true), 23);
        assert_eq!(aligned_key(0, false), -1);
        assert_eq!(aligned_key(23, false), 22);
    }

    #[test]
    fn test_between() {
        assert_eq!(between("a<x>mid</x>b", "<x>", "</x>"), Some("mid"));
        assert_eq!(between("no markers", "<x>", "</x>"), None);
        assert_eq!(between("<x>unclosed", "<x>", "</x>"), None);
    }
}
