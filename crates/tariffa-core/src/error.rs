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

//! Error types for the update cycle

use tariffa_types::{ConfigError, Zone};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("request failed with status {0}")]
    Network(u16),

    #[error("network transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("downloaded archive is not a valid ZIP: {0}")]
    MalformedArchive(String),

    #[error("no prices for zone {zone} in any document of the archive")]
    MissingZoneData { zone: Zone },

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl UpdateError {
    /// Whether a failed cycle should be retried through the backoff table.
    /// Configuration problems are fatal setup conditions and never retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UpdateError::Configuration(_))
    }
}

impl From<zip::result::ZipError> for UpdateError {
    fn from(err: zip::result::ZipError) -> Self {
        UpdateError::MalformedArchive(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UpdateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_split() {
        assert!(UpdateError::Network(404).is_retryable());
        assert!(UpdateError::MalformedArchive("eocd not found".to_owned()).is_retryable());
        assert!(
            UpdateError::MissingZoneData {
                zone: Zone::Sicilia
            }
            .is_retryable()
        );
        assert!(!UpdateError::Configuration(ConfigError::ScanHourRange(24)).is_retryable());
    }
}
