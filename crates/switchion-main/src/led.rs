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

//! Status LED rendered into the log stream.
//!
//! Green while the load runs, yellow when price-idled, red on any fault.
//! Only transitions are logged; the scheduler re-asserts the color every
//! hour.

use tracing::info;

use switchion_core::{LedColor, StatusLed};

#[derive(Debug, Default)]
pub struct LogLed {
    current: Option<LedColor>,
}

impl StatusLed for LogLed {
    fn set_color(&mut self, color: LedColor) {
        if self.current != Some(color) {
            info!("Status LED {:?} -> {color:?}", self.current);
            self.current = Some(color);
        }
    }
}
