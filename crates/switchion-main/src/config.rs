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

//! Configuration loading.
//!
//! `SWITCHION_CONFIG` wins when set; otherwise the deployment options file
//! at /data/options.json, then ./config.toml for development. JSON or TOML
//! is chosen by extension. A config that parses but fails validation is a
//! startup error listing every problem at once.

use anyhow::{Context, Result, bail};
use std::path::Path;
use tracing::info;

use switchion_types::AppConfig;

const DEPLOY_OPTIONS: &str = "/data/options.json";
const DEV_CONFIG: &str = "config.toml";

pub fn load() -> Result<AppConfig> {
    if let Ok(path) = std::env::var("SWITCHION_CONFIG") {
        return load_from(&path);
    }
    for candidate in [DEPLOY_OPTIONS, DEV_CONFIG] {
        if Path::new(candidate).exists() {
            return load_from(candidate);
        }
    }
    bail!(
        "no configuration found: set SWITCHION_CONFIG or provide {DEPLOY_OPTIONS} or ./{DEV_CONFIG}"
    );
}

pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration {}", path.display()))?;

    let config: AppConfig = if path.extension().is_some_and(|e| e == "json") {
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON configuration {}", path.display()))?
    } else {
        toml::from_str(&raw)
            .with_context(|| format!("invalid TOML configuration {}", path.display()))?
    };

    if let Err(problems) = config.validate() {
        bail!(
            "configuration {} is invalid:\n  - {}",
            path.display(),
            problems.join("\n  - ")
        );
    }

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
