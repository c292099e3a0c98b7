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

//! 433 MHz relay transmitter.
//!
//! Transmit codes are sniffed per physical outlet and shipped as a JSON
//! asset; the codes for the configured device id are resolved once at
//! startup. Sending writes the code word to the transmitter character
//! device, one line per transmission. The link is one-way: there is no
//! acknowledgment, which is why the scheduler re-sends every hour.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use switchion_core::{Relay, RelayCode};

/// Shape of the codes asset.
#[derive(Debug, Deserialize)]
struct CodesFile {
    /// Character device (or FIFO) the RF driver listens on.
    transmitter: PathBuf,
    /// Per-outlet code pairs keyed by device id.
    devices: std::collections::HashMap<String, CodePair>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct CodePair {
    on: u32,
    off: u32,
}

#[derive(Debug)]
pub struct RfTransmitter {
    device_id: String,
    transmitter: PathBuf,
    codes: CodePair,
}

impl RfTransmitter {
    /// Resolve the configured device's codes from the asset.
    ///
    /// A missing asset or unknown device id is fatal: without codes the
    /// controller cannot actuate anything and must not pretend to run.
    pub fn from_codes_file(codes_path: impl AsRef<Path>, device_id: &str) -> Result<Self> {
        let codes_path = codes_path.as_ref();
        let raw = fs::read_to_string(codes_path)
            .with_context(|| format!("cannot read RF codes asset {}", codes_path.display()))?;
        let file: CodesFile = serde_json::from_str(&raw)
            .with_context(|| format!("invalid RF codes asset {}", codes_path.display()))?;

        let Some(codes) = file.devices.get(device_id).copied() else {
            bail!(
                "device id {device_id:?} not present in {} (known: {})",
                codes_path.display(),
                file.devices.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        };

        Ok(Self {
            device_id: device_id.to_owned(),
            transmitter: file.transmitter,
            codes,
        })
    }

    fn code_word(&self, code: RelayCode) -> u32 {
        match code {
            RelayCode::On => self.codes.on,
            RelayCode::Off => self.codes.off,
        }
    }
}

impl Relay for RfTransmitter {
    fn transmit(&mut self, code: RelayCode) -> Result<()> {
        let word = self.code_word(code);
        let mut device = fs::OpenOptions::new()
            .append(true)
            .open(&self.transmitter)
            .with_context(|| {
                format!("cannot open RF transmitter {}", self.transmitter.display())
            })?;
        writeln!(device, "{word}")
            .with_context(|| format!("transmit of {code} to {} failed", self.device_id))?;
        debug!("Transmitted {code} ({word}) to {}", self.device_id);
        Ok(())
    }
}
