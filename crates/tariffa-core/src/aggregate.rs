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

//! Reduction of the raw series into one representative price per band.
//!
//! A value of 0.0 means "no data available" for that band, never an actual
//! price of zero; presentation layers key availability off it.

use crate::archive::RawSeries;
use serde::Serialize;
use tariffa_types::Band;

/// F2 share of the combined off-peak band when no consumption weights are
/// available. Empirically derived upstream, not a regulatory constant.
pub const F23_F2_WEIGHT: f64 = 0.46;
/// F3 share of the combined off-peak band, complement of [`F23_F2_WEIGHT`].
pub const F23_F3_WEIGHT: f64 = 0.54;

/// One scalar per band. `f23` and `mono` are always recomputed from the raw
/// series, never carried over.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AggregatedValues {
    pub mono: f64,
    pub f1: f64,
    pub f2: f64,
    pub f3: f64,
    pub f23: f64,
    /// The current local hour's spot value.
    pub hourly: f64,
}

impl AggregatedValues {
    pub fn get(&self, band: Band) -> f64 {
        match band {
            Band::Mono => self.mono,
            Band::F1 => self.f1,
            Band::F2 => self.f2,
            Band::F3 => self.f3,
            Band::F23 => self.f23,
            Band::Hourly => self.hourly,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Reduce `raw` into band aggregates. `current_hour` selects the hourly
/// exposure slot (market-local hour of day, 0-23).
pub fn aggregate(raw: &RawSeries, current_hour: usize) -> AggregatedValues {
    let f1 = mean(&raw.f1);
    let f2 = mean(&raw.f2);
    let f3 = mean(&raw.f3);

    let off_peak_available = !raw.f2.is_empty() && !raw.f3.is_empty();

    let (f23, mono) = match raw.consumption {
        Some(weights) if weights.off_peak_total() > 0.0 => {
            let f23 = if off_peak_available {
                (f2 * weights.f2 + f3 * weights.f3) / weights.off_peak_total()
            } else {
                0.0
            };
            // Weighted mean over all three bands; reduces to the source's
            // "/ 24" when the weights are one day's hour counts.
            let mono = if weights.total() > 0.0 {
                (f1 * weights.f1 + f2 * weights.f2 + f3 * weights.f3) / weights.total()
            } else {
                0.0
            };
            (f23, mono)
        }
        // Without weights, mono stays at the unavailable sentinel; the
        // source computes it only in the weighted path.
        Some(_) | None => {
            let f23 = if off_peak_available {
                F23_F2_WEIGHT * f2 + F23_F3_WEIGHT * f3
            } else {
                0.0
            };
            (f23, 0.0)
        }
    };

    let hourly = raw.hourly.get(current_hour).copied().unwrap_or(0.0);

    AggregatedValues {
        mono,
        f1,
        f2,
        f3,
        f23,
        hourly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::BandWeights;

    fn series(f1: &[f64], f2: &[f64], f3: &[f64]) -> RawSeries {
        RawSeries {
            f1: f1.to_vec(),
            f2: f2.to_vec(),
            f3: f3.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_simple_band_means() {
        let raw = series(&[0.10, 0.20], &[0.30, 0.50], &[0.10, 0.30]);
        let values = aggregate(&raw, 0);
        assert!((values.f1 - 0.15).abs() < 1e-12);
        assert!((values.f2 - 0.40).abs() < 1e-12);
        assert!((values.f3 - 0.20).abs() < 1e-12);
    }

    #[test]
    fn test_f23_fixed_split() {
        let raw = series(&[0.1], &[0.30, 0.50], &[0.10, 0.30]);
        let values = aggregate(&raw, 0);
        let expected = F23_F2_WEIGHT * 0.40 + F23_F3_WEIGHT * 0.20;
        assert!((values.f23 - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_band_is_unavailable() {
        let raw = series(&[], &[0.3], &[0.2]);
        let values = aggregate(&raw, 0);
        assert_eq!(values.f1, 0.0);
        // F23 still computable from F2/F3
        assert!(values.f23 > 0.0);
    }

    #[test]
    fn test_f23_requires_both_inputs() {
        let raw = series(&[0.1], &[0.3], &[]);
        let values = aggregate(&raw, 0);
        assert_eq!(values.f23, 0.0);
    }

    #[test]
    fn test_mono_unavailable_without_weights() {
        let raw = series(&[0.1], &[0.2], &[0.3]);
        assert_eq!(aggregate(&raw, 0).mono, 0.0);
    }

    #[test]
    fn test_weighted_aggregation() {
        let mut raw = series(&[0.10], &[0.20], &[0.40]);
        raw.consumption = Some(BandWeights {
            f1: 11.0,
            f2: 6.0,
            f3: 7.0,
        });
        let values = aggregate(&raw, 0);

        let f23 = (0.20 * 6.0 + 0.40 * 7.0) / 13.0;
        let mono = (0.10 * 11.0 + 0.20 * 6.0 + 0.40 * 7.0) / 24.0;
        assert!((values.f23 - f23).abs() < 1e-12);
        assert!((values.mono - mono).abs() < 1e-12);
    }

    #[test]
    fn test_zero_weights_fall_back_to_fixed_split() {
        let mut raw = series(&[0.1], &[0.3], &[0.2]);
        raw.consumption = Some(BandWeights::default());
        let values = aggregate(&raw, 0);
        let expected = F23_F2_WEIGHT * 0.3 + F23_F3_WEIGHT * 0.2;
        assert!((values.f23 - expected).abs() < 1e-12);
        assert_eq!(values.mono, 0.0);
    }

    #[test]
    fn test_hourly_slot_selection() {
        let mut raw = series(&[], &[], &[]);
        raw.hourly[14] = 0.123;
        assert_eq!(aggregate(&raw, 14).hourly, 0.123);
        assert_eq!(aggregate(&raw, 2).hourly, 0.0);
    }
}
