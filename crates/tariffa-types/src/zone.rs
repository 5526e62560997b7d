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
use std::str::FromStr;

/// Electricity market zone. The serialized form is the element name used in
/// the market operator's XML documents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Zone {
    #[serde(rename = "CALA")]
    Calabria,
    #[serde(rename = "CNOR")]
    CentroNord,
    #[serde(rename = "CSUD")]
    CentroSud,
    /// The single national price (PUN), a virtual zone without its own grid.
    #[serde(rename = "NAT")]
    Nazionale,
    #[serde(rename = "NORD")]
    Nord,
    #[serde(rename = "SARD")]
    Sardegna,
    #[serde(rename = "SICI")]
    Sicilia,
    #[serde(rename = "SUD")]
    Sud,
}

impl Zone {
    pub const ALL: [Zone; 8] = [
        Zone::Calabria,
        Zone::CentroNord,
        Zone::CentroSud,
        Zone::Nazionale,
        Zone::Nord,
        Zone::Sardegna,
        Zone::Sicilia,
        Zone::Sud,
    ];

    /// XML element name carrying this zone's price.
    pub fn code(self) -> &'static str {
        match self {
            Zone::Calabria => "CALA",
            Zone::CentroNord => "CNOR",
            Zone::CentroSud => "CSUD",
            Zone::Nazionale => "NAT",
            Zone::Nord => "NORD",
            Zone::Sardegna => "SARD",
            Zone::Sicilia => "SICI",
            Zone::Sud => "SUD",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Zone::Calabria => "Calabria",
            Zone::CentroNord => "Centro Nord",
            Zone::CentroSud => "Centro Sud",
            Zone::Nazionale => "Italia (senza vincoli)",
            Zone::Nord => "Nord",
            Zone::Sardegna => "Sardegna",
            Zone::Sicilia => "Sicilia",
            Zone::Sud => "Sud",
        }
    }

    /// Whether the zone maps to a physical grid area. Virtual zones carry no
    /// consumption figures of their own.
    pub fn is_physical(self) -> bool {
        !matches!(self, Zone::Nazionale)
    }

    /// XML element name carrying this zone's consumption quantity. Virtual
    /// zones fall back to the national aggregate.
    pub fn consumption_key(self) -> &'static str {
        if self.is_physical() {
            self.code()
        } else {
            "Totale"
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown market zone code: {0}")]
pub struct UnknownZone(pub String);

impl FromStr for Zone {
    type Err = UnknownZone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Zone::ALL
            .iter()
            .copied()
            .find(|z| z.code() == s)
            .ok_or_else(|| UnknownZone(s.to_owned()))
    }
}
