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

//! Ameren retail-energy page scraper.
//!
//! Fallback for when the JSON endpoint is down. The page carries a single
//! `<tbody>` with one row per Hour-Ending, each cell tagged with a stable
//! `id` attribute. Marker scanning is deliberate; a full HTML parser buys
//! nothing against a page this rigid and would be far heavier.

use anyhow::Result as AnyResult;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT as UA_HEADER;
use std::time::Duration;
use tracing::debug;

use super::{
    PriceSource, Result, SourceError, USER_AGENT, aligned_key, between, build_client, dst_context,
};
use switchion_types::{PriceTable, RawPayload, SourceKind};

const DEFAULT_BASE_URL: &str = "https://www.ameren.com";
const PAGE_PATH: &str = "/account/retail-energy";

const HOUR_CELL: &str = "<td id=\"Hour\">";
const PRICE_CELL: &str = "<td id=\"Price\">";
const DATE_CELL: &str = "<td id=\"Date\">";
const CELL_END: &str = "</td>";

pub struct AmerenHtmlSource {
    client: Client,
    tz: Tz,
    base_url: String,
}

impl AmerenHtmlSource {
    pub fn new(tz: Tz, timeout: Duration) -> AnyResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            tz,
            base_url: DEFAULT_BASE_URL.to_owned(),
        })
    }

    /// Point at a different host. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn embedded_date(payload: &RawPayload) -> Option<NaiveDate> {
        let cell = between(&payload.body, DATE_CELL, CELL_END)?;
        let trimmed = cell.trim();
        NaiveDate::parse_from_str(trimmed.get(..10)?, "%Y-%m-%d").ok()
    }
}

impl PriceSource for AmerenHtmlSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Html
    }

    fn fetch(&self, date: NaiveDate) -> Result<RawPayload> {
        let url = format!("{}{}", self.base_url, PAGE_PATH);
        debug!("Scraping hourly prices from {url}");

        let response = self.client.get(&url).header(UA_HEADER, USER_AGENT).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!("HTTP {status} for {url}")));
        }

        let payload = RawPayload::new(response.text()?, date);

        // The page only flips to the next day around 16:00 local; before
        // that it still shows the current day.
        if let Some(embedded) = Self::embedded_date(&payload)
            && embedded != date
        {
            return Err(SourceError::DateRejected {
                date,
                reason: format!(
                    "page still shows {embedded}; next-day prices publish around 16:00"
                ),
            });
        }

        Ok(payload)
    }

    fn parse(
        &self,
        payload: &RawPayload,
        debug_instant: Option<DateTime<Tz>>,
    ) -> Result<PriceTable> {
        let dst = dst_context(self.tz, debug_instant);

        let table_body = between(&payload.body, "<tbody>", "</tbody>")
            .ok_or_else(|| SourceError::Malformed("no <tbody> in page".to_owned()))?;

        let mut entries = Vec::with_capacity(24);
        let mut rest = table_body;
        while let Some(hour_at) = rest.find(HOUR_CELL) {
            let after_hour = &rest[hour_at + HOUR_CELL.len()..];
            let hour_text = between(&rest[hour_at..], HOUR_CELL, CELL_END).ok_or_else(|| {
                SourceError::Malformed("unterminated Hour cell".to_owned())
            })?;
            let hour: u32 = hour_text.trim().parse().map_err(|_| {
                SourceError::Malformed(format!("unparseable Hour cell {hour_text:?}"))
            })?;
            if !(1..=24).contains(&hour) {
                return Err(SourceError::Malformed(format!(
                    "Hour-Ending {hour} out of range"
                )));
            }

            let price_text = between(after_hour, PRICE_CELL, CELL_END).ok_or_else(|| {
                SourceError::Malformed(format!("no Price cell after Hour-Ending {hour}"))
            })?;
            let price: f64 = price_text.trim().parse().map_err(|_| {
                SourceError::Malformed(format!("unparseable Price cell {price_text:?}"))
            })?;

            entries.push((aligned_key((hour - 1) as usize, dst), price));
            let price_at = after_hour.find(PRICE_CELL).unwrap_or(0);
            rest = &after_hour[price_at + PRICE_CELL.len()..];
        }

        if entries.len() != 24 {
            return Err(SourceError::Malformed(format!(
                "found {} hourly rows, expected 24",
                entries.len()
            )));
        }

        let table = PriceTable::from_entries(entries);
        if table.len() != 24 {
            return Err(SourceError::Malformed(format!(
                "hourly rows repeat Hour-Ending values, {} distinct of 24",
                table.len()
            )));
        }
        Ok(table)
    }

    fn date_matches(&self, payload: &RawPayload, date: NaiveDate) -> bool {
        Self::embedded_date(payload) == Some(date)
    }
}
