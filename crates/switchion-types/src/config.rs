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

use serde::{Deserialize, Serialize};

use crate::pricing::SourceKind;

/// Main application configuration - SwitchION
///
/// Loaded once at startup from TOML; immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Price feed configuration
    pub source: SourceConfig,

    /// Decision policy (floor/ceiling/baseline window/percentile)
    pub policy: PolicyConfig,

    /// Tick cadence and fixed-hour triggers
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Relay codes, device identity and durable state location
    pub device: DeviceConfig,
}

/// Price feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Which remote format to use (csv | json | html)
    pub kind: SourceKind,

    /// IANA timezone of the controlled site (the feed itself reports on a
    /// DST-naive Eastern standard-time grid)
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Per-request timeout; a timeout is treated as the feed being down
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Decision policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Always-ON threshold ($/kWh): at or below this price the load runs
    /// regardless of the baseline
    pub floor_price: f64,

    /// Always-OFF threshold ($/kWh): above this price the load never runs
    pub ceiling_price: f64,

    /// How many most-recent daily means feed the rolling baseline (1-7)
    #[serde(default = "default_window_days")]
    pub window_days: usize,

    /// Percentile adjustment around the 50% no-op point (0-100).
    /// Above 50 raises the cutoff (more permissive ON), below 50 lowers it.
    #[serde(default = "default_percentile")]
    pub percentile: f64,
}

/// Tick cadence and fixed-hour triggers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Supervisory tick period in seconds
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Local civil hour at which the rolling baseline is refreshed
    #[serde(default = "default_baseline_refresh_hour")]
    pub baseline_refresh_hour: u32,

    /// Local civil hour at which the clock is resynchronized (best effort)
    #[serde(default = "default_clock_resync_hour")]
    pub clock_resync_hour: u32,

    /// Watchdog starvation window in seconds
    #[serde(default = "default_watchdog_timeout_secs")]
    pub watchdog_timeout_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            baseline_refresh_hour: default_baseline_refresh_hour(),
            clock_resync_hour: default_clock_resync_hour(),
            watchdog_timeout_secs: default_watchdog_timeout_secs(),
        }
    }
}

/// Relay codes, device identity and durable state location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Path to the JSON asset holding RF transmit codes per device id.
    /// Absence of this asset is a fatal startup error.
    pub codes_path: String,

    /// Device identifier keying into the codes asset
    pub device_id: String,

    /// Path of the durable JSON state file (rolling baseline record)
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

impl AppConfig {
    /// Validate ranges the decision policy depends on.
    ///
    /// Returns every problem found, not just the first, so a broken config
    /// can be fixed in one pass.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(1..=7).contains(&self.policy.window_days) {
            errors.push(format!(
                "policy.window_days must be 1-7, got {}",
                self.policy.window_days
            ));
        }
        if !(0.0..=100.0).contains(&self.policy.percentile) {
            errors.push(format!(
                "policy.percentile must be 0-100, got {}",
                self.policy.percentile
            ));
        }
        if self.policy.floor_price < 0.0 {
            errors.push(format!(
                "policy.floor_price must be non-negative, got {}",
                self.policy.floor_price
            ));
        }
        if self.policy.ceiling_price < self.policy.floor_price {
            errors.push(format!(
                "policy.ceiling_price ({}) is below policy.floor_price ({})",
                self.policy.ceiling_price, self.policy.floor_price
            ));
        }
        if self.schedule.baseline_refresh_hour > 23 {
            errors.push(format!(
                "schedule.baseline_refresh_hour must be 0-23, got {}",
                self.schedule.baseline_refresh_hour
            ));
        }
        if self.schedule.clock_resync_hour > 23 {
            errors.push(format!(
                "schedule.clock_resync_hour must be 0-23, got {}",
                self.schedule.clock_resync_hour
            ));
        }
        if self.schedule.tick_secs == 0 {
            errors.push("schedule.tick_secs must be positive".to_owned());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn default_timezone() -> String {
    "America/Chicago".to_owned()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_window_days() -> usize {
    7
}

fn default_percentile() -> f64 {
    50.0
}

fn default_tick_secs() -> u64 {
    60
}

fn default_baseline_refresh_hour() -> u32 {
    1
}

fn default_clock_resync_hour() -> u32 {
    2
}

fn default_watchdog_timeout_secs() -> u64 {
    600
}

fn default_state_path() -> String {
    "/data/switchion_state.json".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> AppConfig {
        AppConfig {
            source: SourceConfig {
                kind: SourceKind::Csv,
                timezone: default_timezone(),
                request_timeout_secs: 30,
            },
            policy: PolicyConfig {
                floor_price: 0.04,
                ceiling_price: 0.09,
                window_days: 7,
                percentile: 50.0,
            },
            schedule: ScheduleConfig::default(),
            device: DeviceConfig {
                codes_path: "/data/codes.json".to_owned(),
                device_id: "dewenwils-rc042".to_owned(),
                state_path: default_state_path(),
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_inverted_floor_ceiling_rejected() {
        let mut config = sample_config();
        config.policy.floor_price = 0.10;
        config.policy.ceiling_price = 0.05;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("ceiling_price")));
    }

    #[test]
    fn test_out_of_range_window_and_percentile() {
        let mut config = sample_config();
        config.policy.window_days = 0;
        config.policy.percentile = 120.0;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let toml = r#"
            [source]
            kind = "json"

            [policy]
            floor_price = 0.04
            ceiling_price = 0.09

            [device]
            codes_path = "/data/codes.json"
            device_id = "dewenwils-rc042"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.source.timezone, "America/Chicago");
        assert_eq!(config.policy.window_days, 7);
        assert_eq!(config.schedule.tick_secs, 60);
        assert_eq!(config.schedule.baseline_refresh_hour, 1);
        assert!(config.validate().is_ok());
    }
}
