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

//! MISO day-ahead ex-post LMP market report.
//!
//! One huge CSV per day at a date-addressed URL. Only two lines matter: a
//! bare `MM/DD/YYYY` date line near the top and the load-zone line carrying
//! the 24 hourly prices in $/MWh (millidollars per kWh). A byte-range
//! header keeps the download small enough for the device.

use anyhow::Result as AnyResult;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use reqwest::blocking::Client;
use reqwest::header::{RANGE, USER_AGENT as UA_HEADER};
use std::time::Duration;
use tracing::debug;

use super::{PriceSource, Result, SourceError, USER_AGENT, aligned_key, build_client, dst_context};
use switchion_types::{PriceTable, RawPayload, SourceKind};

const DEFAULT_BASE_URL: &str = "https://docs.misoenergy.org";

/// Only the first ~40 kB contain the lines we need.
const BYTE_RANGE: &str = "bytes=0-40000";

/// Markers selecting the one line of the report that prices our load zone.
const ZONE_MARKERS: [&str; 3] = ["AMIL.BGS5", "Loadzone", "LMP"];

pub struct MisoCsvSource {
    client: Client,
    tz: Tz,
    base_url: String,
}

impl MisoCsvSource {
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

    fn report_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/marketreports/{}_da_expost_lmp.csv",
            self.base_url,
            date.format("%Y%m%d")
        )
    }

    fn embedded_date(payload: &RawPayload) -> Option<NaiveDate> {
        payload
            .body
            .lines()
            .find_map(|line| NaiveDate::parse_from_str(line.trim(), "%m/%d/%Y").ok())
    }
}

impl PriceSource for MisoCsvSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Csv
    }

    fn fetch(&self, date: NaiveDate) -> Result<RawPayload> {
        let url = self.report_url(date);
        debug!("Fetching MISO report from {url}");

        let response = self
            .client
            .get(&url)
            .header(RANGE, BYTE_RANGE)
            .header(UA_HEADER, USER_AGENT)
            .send()?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::DateRejected {
                date,
                reason: "report not yet published".to_owned(),
            });
        }
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!("HTTP {status} for {url}")));
        }

        Ok(RawPayload::new(response.text()?, date))
    }

    fn parse(
        &self,
        payload: &RawPayload,
        debug_instant: Option<DateTime<Tz>>,
    ) -> Result<PriceTable> {
        let dst = dst_context(self.tz, debug_instant);

        let zone_line = payload
            .body
            .lines()
            .find(|line| ZONE_MARKERS.iter().all(|m| line.contains(m)))
            .ok_or_else(|| {
                SourceError::Malformed("no load-zone LMP line in report".to_owned())
            })?;

        // Zone line layout: node,Loadzone,LMP,HE1..HE24
        let fields: Vec<&str> = zone_line.split(',').collect();
        if fields.len() < 27 {
            return Err(SourceError::Malformed(format!(
                "load-zone line has {} fields, expected 27",
                fields.len()
            )));
        }

        let mut entries = Vec::with_capacity(24);
        for (position, field) in fields[3..27].iter().enumerate() {
            let millidollars: f64 = field.trim().parse().map_err(|_| {
                SourceError::Malformed(format!("unparseable price field {field:?}"))
            })?;
            entries.push((aligned_key(position, dst), millidollars / 1000.0));
        }

        Ok(PriceTable::from_entries(entries))
    }

    fn date_matches(&self, payload: &RawPayload, date: NaiveDate) -> bool {
        Self::embedded_date(payload) == Some(date)
    }
}
