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

//! Coordinator configuration as supplied by the host at construction time.

use crate::band::Band;
use crate::zone::Zone;
use serde::{Deserialize, Serialize};

/// Which price series the coordinator tracks. The national variant follows
/// the single national price; the zonal variant follows one zone's clearing
/// price and additionally fetches the consumption archive so band averages
/// can be consumption-weighted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    National,
    Zonal,
}

impl Variant {
    /// Whether the secondary consumption archive is downloaded alongside the
    /// price archive.
    pub fn fetches_consumption(self) -> bool {
        matches!(self, Variant::Zonal)
    }
}

/// Contract shape: how many tariff bands the supply contract distinguishes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Contract {
    /// Single flat rate.
    Mono,
    /// Peak plus combined off-peak (F1 + F23).
    Dual,
    /// Full three-band contract.
    #[default]
    Triple,
}

impl Contract {
    pub fn band_count(self) -> u8 {
        match self {
            Contract::Mono => 1,
            Contract::Dual => 2,
            Contract::Triple => 3,
        }
    }

    /// The aggregated bands a presentation layer should surface for this
    /// contract.
    pub fn relevant_bands(self) -> &'static [Band] {
        match self {
            Contract::Mono => &[Band::Mono],
            Contract::Dual => &[Band::F1, Band::F23],
            Contract::Triple => &[Band::F1, Band::F2, Band::F3],
        }
    }
}

fn default_scan_hour() -> u8 {
    1
}

fn default_true() -> bool {
    true
}

/// Static configuration for one coordinator instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub variant: Variant,

    /// Market zone to extract. The national variant requires the virtual
    /// national zone.
    #[serde(default = "default_zone")]
    pub zone: Zone,

    /// Hour of day (0-23) at which the daily fetch cycle starts.
    #[serde(default = "default_scan_hour")]
    pub scan_hour: u8,

    /// Minute within the scan hour. `None` means "not yet drawn": the
    /// coordinator picks one at random and reports it back through its
    /// handle so the host can persist it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_minute: Option<u8>,

    /// When set, never extend the fetch window into the previous month at
    /// the start of a new one.
    #[serde(default)]
    pub actual_data_only: bool,

    #[serde(default)]
    pub contract: Contract,

    /// Average over the month so far instead of today only (zonal variant).
    #[serde(default = "default_true")]
    pub month_average: bool,
}

fn default_zone() -> Zone {
    Zone::Nazionale
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            variant: Variant::National,
            zone: Zone::Nazionale,
            scan_hour: 1,
            scan_minute: None,
            actual_data_only: false,
            contract: Contract::Triple,
            month_average: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("scan hour {0} out of range 0-23")]
    ScanHourRange(u8),

    #[error("scan minute {0} out of range 0-59")]
    ScanMinuteRange(u8),

    #[error("zone {zone} requires the zonal variant")]
    ZoneVariantMismatch { zone: Zone },
}

impl CoordinatorConfig {
    /// Reject configurations the scheduler must never start with. This is a
    /// fatal setup condition, not a retryable one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan_hour > 23 {
            return Err(ConfigError::ScanHourRange(self.scan_hour));
        }
        if let Some(minute) = self.scan_minute
            && minute > 59
        {
            return Err(ConfigError::ScanMinuteRange(minute));
        }
        if self.variant == Variant::National && self.zone != Zone::Nazionale {
            return Err(ConfigError::ZoneVariantMismatch { zone: self.zone });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CoordinatorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_scan_hour_range() {
        let config = CoordinatorConfig {
            scan_hour: 24,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ScanHourRange(24)));
    }

    #[test]
    fn test_scan_minute_range() {
        let config = CoordinatorConfig {
            scan_minute: Some(60),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ScanMinuteRange(60)));
    }

    #[test]
    fn test_national_variant_rejects_physical_zone() {
        let config = CoordinatorConfig {
            zone: Zone::Nord,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZoneVariantMismatch { .. })
        ));
    }

    #[test]
    fn test_zonal_variant_accepts_any_zone() {
        for zone in Zone::ALL {
            let config = CoordinatorConfig {
                variant: Variant::Zonal,
                zone,
                ..Default::default()
            };
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_contract_bands() {
        assert_eq!(Contract::Mono.relevant_bands(), &[Band::Mono]);
        assert_eq!(Contract::Dual.relevant_bands(), &[Band::F1, Band::F23]);
        assert_eq!(Contract::Triple.band_count(), 3);
    }
}
