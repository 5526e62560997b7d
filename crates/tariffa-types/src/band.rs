// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Tariffa.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use serde::{Deserialize, Serialize};
use std::fmt;

/// Regulatory time-of-use tariff band ("fascia") of the Italian day-ahead
/// market.
///
/// `F1`/`F2`/`F3` are populated directly from source data. `F23` and `Mono`
/// are derived composites, and `Hourly` is the raw per-hour series container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Band {
    #[serde(rename = "MONO")]
    Mono,
    #[serde(rename = "F1")]
    F1,
    #[serde(rename = "F2")]
    F2,
    #[serde(rename = "F3")]
    F3,
    #[serde(rename = "F23")]
    F23,
    #[serde(rename = "ORARIA")]
    Hourly,
}

impl Band {
    /// The bands a classifier may assign to an hour of the day.
    pub const SOURCE_BANDS: [Band; 3] = [Band::F1, Band::F2, Band::F3];

    /// True for bands that are recomputed from the raw series and never
    /// filled from source documents.
    pub fn is_derived(self) -> bool {
        matches!(self, Band::Mono | Band::F23)
    }

    pub fn label(self) -> &'static str {
        match self {
            Band::Mono => "MONO",
            Band::F1 => "F1",
            Band::F2 => "F2",
            Band::F3 => "F3",
            Band::F23 => "F23",
            Band::Hourly => "ORARIA",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
