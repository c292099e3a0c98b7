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

//! Ameren hourly-prices JSON endpoint.
//!
//! A POST with the requested calendar date returns an `hourlyPriceDetails`
//! array of 24 Hour-Ending entries. The endpoint is loose with types (hour
//! and price arrive as strings or numbers depending on backend mood), so
//! both shapes are accepted.

use anyhow::Result as AnyResult;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT as UA_HEADER;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::{PriceSource, Result, SourceError, USER_AGENT, aligned_key, build_client, dst_context};
use switchion_types::{PriceTable, RawPayload, SourceKind};

const DEFAULT_BASE_URL: &str = "https://www.ameren.com";
const ENDPOINT_PATH: &str = "/api/ameren/promotion/RtpHourlyPricesbyDate";

pub struct AmerenJsonSource {
    client: Client,
    tz: Tz,
    base_url: String,
}

impl AmerenJsonSource {
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
        let root: Value = serde_json::from_str(&payload.body).ok()?;
        let first = root.get("hourlyPriceDetails")?.as_array()?.first()?;
        let stamp = first.get("date")?.as_str()?;
        NaiveDate::parse_from_str(stamp.get(..10)?, "%Y-%m-%d").ok()
    }
}

/// Hour-Ending number, tolerating `"14"` as well as `14`.
fn field_as_hour(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn field_as_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl PriceSource for AmerenJsonSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Json
    }

    fn fetch(&self, date: NaiveDate) -> Result<RawPayload> {
        let url = format!("{}{}", self.base_url, ENDPOINT_PATH);
        debug!("Requesting hourly prices for {date} from {url}");

        let response = self
            .client
            .post(&url)
            .header(UA_HEADER, USER_AGENT)
            .json(&json!({ "SelectedDate": date.format("%Y-%m-%d").to_string() }))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!("HTTP {status} for {url}")));
        }

        let payload = RawPayload::new(response.text()?, date);

        // The endpoint answers a too-early request for tomorrow with today's
        // prices instead of an error.
        if let Some(embedded) = Self::embedded_date(&payload)
            && embedded != date
        {
            return Err(SourceError::DateRejected {
                date,
                reason: format!("feed answered with prices for {embedded}"),
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

        let root: Value = serde_json::from_str(&payload.body)
            .map_err(|e| SourceError::Malformed(format!("invalid JSON: {e}")))?;
        let details = root
            .get("hourlyPriceDetails")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SourceError::Malformed("missing hourlyPriceDetails array".to_owned())
            })?;
        if details.len() < 24 {
            return Err(SourceError::Malformed(format!(
                "hourlyPriceDetails has {} entries, expected 24",
                details.len()
            )));
        }

        let mut entries = Vec::with_capacity(24);
        for item in &details[..24] {
            let hour = item
                .get("hour")
                .and_then(field_as_hour)
                .filter(|h| (1..=24).contains(h))
                .ok_or_else(|| {
                    SourceError::Malformed(format!("bad hour field in {item}"))
                })?;
            let price = item.get("price").and_then(field_as_price).ok_or_else(|| {
                SourceError::Malformed(format!("bad price field in {item}"))
            })?;
            entries.push((aligned_key((hour - 1) as usize, dst), price));
        }

        let table = PriceTable::from_entries(entries);
        if table.len() != 24 {
            return Err(SourceError::Malformed(format!(
                "hourlyPriceDetails repeats hour values, {} distinct of 24",
                table.len()
            )));
        }
        Ok(table)
    }

    fn date_matches(&self, payload: &RawPayload, date: NaiveDate) -> bool {
        Self::embedded_date(payload) == Some(date)
    }
}
