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

//! Collaborator seams for the physical device side.
//!
//! The scheduler only talks to these traits; the binary wires in the real
//! RF transmitter, status LED, state file and time authority.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fmt;

/// Code the relay collaborator transmits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCode {
    On,
    Off,
}

impl RelayCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayCode::On => "on",
            RelayCode::Off => "off",
        }
    }
}

impl fmt::Display for RelayCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The switched load behind an RF relay.
pub trait Relay {
    fn transmit(&mut self, code: RelayCode) -> Result<()>;
}

/// Status LED colors. Purely observational, no feedback into decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    /// Load energized
    Green,
    /// Load off on price grounds
    Yellow,
    /// Fault: feed failing, stale data or anomalous configuration
    Red,
    /// Idle, no decision made yet
    Off,
}

pub trait StatusLed {
    fn set_color(&mut self, color: LedColor);
}

/// Liveness watchdog. Must be fed at least once per timeout window or the
/// process restarts itself as a fail-safe against a wedged loop.
pub trait Watchdog {
    fn feed(&mut self);
}

/// Durable key-value persistence surviving reboot.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&mut self, key: &str, value: &str) -> Result<()>;
}

/// External wall-clock authority for daily resync. Best effort.
pub trait TimeAuthority {
    fn utc_now(&self) -> Result<DateTime<Utc>>;
}
