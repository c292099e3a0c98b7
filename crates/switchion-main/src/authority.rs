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

//! HTTP wall-clock authority for the daily resync.
//!
//! Failures are tolerated upstream; the clock just keeps its last offset.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

use switchion_core::TimeAuthority;

const DEFAULT_URL: &str = "https://worldtimeapi.org/api/timezone/Etc/UTC";

#[derive(Debug, Deserialize)]
struct TimeResponse {
    unixtime: i64,
}

pub struct HttpTimeAuthority {
    client: Client,
    url: String,
}

impl HttpTimeAuthority {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: DEFAULT_URL.to_owned(),
        })
    }

    /// Point at a different endpoint. Used by tests.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

impl TimeAuthority for HttpTimeAuthority {
    fn utc_now(&self) -> Result<DateTime<Utc>> {
        let response: TimeResponse = self
            .client
            .get(&self.url)
            .send()
            .context("time authority request failed")?
            .error_for_status()
            .context("time authority returned an error status")?
            .json()
            .context("time authority response is not the expected JSON")?;

        DateTime::from_timestamp(response.unixtime, 0)
            .with_context(|| format!("unixtime {} out of range", response.unixtime))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_unixtime() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/time")
            .with_status(200)
            .with_body(r#"{"unixtime": 1700000000, "timezone": "Etc/UTC"}"#)
            .create();

        let authority = HttpTimeAuthority::new(Duration::from_secs(5))
            .unwrap()
            .with_url(format!("{}/time", server.url()));
        let now = authority.utc_now().unwrap();
        assert_eq!(now.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_error_status_is_error() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/time").with_status(503).create();

        let authority = HttpTimeAuthority::new(Duration::from_secs(5))
            .unwrap()
            .with_url(format!("{}/time", server.url()));
        assert!(authority.utc_now().is_err());
    }

    #[test]
    fn test_non_json_body_is_error() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/time")
            .with_status(200)
            .with_body("<html>captive portal</html>")
            .create();

        let authority = HttpTimeAuthority::new(Duration::from_secs(5))
            .unwrap()
            .with_url(format!("{}/time", server.url()));
        assert!(authority.utc_now().is_err());
    }
}
