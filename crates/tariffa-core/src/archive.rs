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

//! Archive extraction: a ZIP of per-day XML market documents becomes the
//! raw per-hour, per-band price series for one zone.
//!
//! Each document carries one calendar day as repeated hour rows. A document
//! that lacks the date, the hour rows or the zone's value is excluded from
//! the average (the valid-file denominator shrinks); it never contributes
//! zeros and never fails the whole cycle.

use crate::bands::band_for_hour;
use crate::calendar::HolidayCalendar;
use crate::error::{Result, UpdateError};
use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tariffa_types::{Band, Zone};
use tracing::{debug, warn};

/// Raw value series for one zone, accumulated over all valid documents of
/// one extraction pass.
///
/// `hourly` slots hold the per-hour average across valid files (summed
/// during the pass, divided by the valid-file count at the end). The band
/// collections are append-only: one entry per matching hour observed across
/// all parsed days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawSeries {
    pub hourly: [f64; 24],
    pub f1: Vec<f64>,
    pub f2: Vec<f64>,
    pub f3: Vec<f64>,
    /// Consumption weights when the secondary archive was available and
    /// usable; `None` degrades aggregation to the simple mode.
    pub consumption: Option<BandWeights>,
    pub valid_price_files: usize,
}

impl Default for RawSeries {
    fn default() -> Self {
        Self {
            hourly: [0.0; 24],
            f1: Vec::new(),
            f2: Vec::new(),
            f3: Vec::new(),
            consumption: None,
            valid_price_files: 0,
        }
    }
}

impl RawSeries {
    /// The raw collection backing a source band. Derived bands have no raw
    /// collection.
    pub fn band_values(&self, band: Band) -> &[f64] {
        match band {
            Band::F1 => &self.f1,
            Band::F2 => &self.f2,
            Band::F3 => &self.f3,
            Band::Hourly => &self.hourly,
            Band::Mono | Band::F23 => &[],
        }
    }
}

/// Per-band consumption totals used as weights for the derived bands.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BandWeights {
    pub f1: f64,
    pub f2: f64,
    pub f3: f64,
}

impl BandWeights {
    pub fn total(&self) -> f64 {
        self.f1 + self.f2 + self.f3
    }

    pub fn off_peak_total(&self) -> f64 {
        self.f2 + self.f3
    }
}

/// Extract the raw series for `zone` from a price archive and an optional
/// consumption archive.
///
/// Hard failures: a body that is not a ZIP, a ZIP without documents, or a
/// zone absent from every document. Everything else degrades per-day.
pub fn extract_archive(
    prices: &[u8],
    consumption: Option<&[u8]>,
    zone: Zone,
    calendar: &HolidayCalendar,
) -> Result<RawSeries> {
    let documents = unpack_documents(prices)?;
    if documents.is_empty() {
        return Err(UpdateError::MalformedArchive(
            "archive contains no documents".to_owned(),
        ));
    }
    debug!("{} documents in price archive", documents.len());

    let mut series = RawSeries::default();
    let price_keys = [zone.code()];
    let mut valid_files = 0_usize;

    for (name, xml) in &documents {
        let Some(day) = parse_day_document(xml, &price_keys) else {
            warn!("document {name} has no usable prices for zone {zone}, excluding it");
            continue;
        };
        valid_files += 1;

        let holiday = calendar.is_holiday(day.date);
        for (hour, raw) in &day.values {
            // EUR/MWh with Italian separators -> EUR/kWh
            let price = raw / 1000.0;
            series.hourly[*hour] += price;
            match band_for_hour(day.date, holiday, *hour as u32) {
                Band::F1 => series.f1.push(price),
                Band::F2 => series.f2.push(price),
                Band::F3 => series.f3.push(price),
                Band::Mono | Band::F23 | Band::Hourly => {}
            }
        }
    }

    if valid_files == 0 {
        return Err(UpdateError::MissingZoneData { zone });
    }

    for slot in &mut series.hourly {
        *slot /= valid_files as f64;
    }
    series.valid_price_files = valid_files;

    if let Some(bytes) = consumption {
        series.consumption = extract_consumption(bytes, zone, calendar);
    }

    Ok(series)
}

/// Consumption archive pass. Failures here only cost the weighting: the
/// cycle falls back to simple averaging, price extraction is unaffected.
fn extract_consumption(
    bytes: &[u8],
    zone: Zone,
    calendar: &HolidayCalendar,
) -> Option<BandWeights> {
    let documents = match unpack_documents(bytes) {
        Ok(documents) => documents,
        Err(err) => {
            warn!("consumption archive unreadable ({err}), falling back to simple averaging");
            return None;
        }
    };

    let keys = [zone.consumption_key(), "Totale"];
    let mut weights = BandWeights::default();
    let mut valid_files = 0_usize;

    for (name, xml) in &documents {
        let Some(day) = parse_day_document(xml, &keys) else {
            warn!("document {name} has no usable consumption for zone {zone}, excluding it");
            continue;
        };
        valid_files += 1;

        let holiday = calendar.is_holiday(day.date);
        for (hour, quantity) in &day.values {
            match band_for_hour(day.date, holiday, *hour as u32) {
                Band::F1 => weights.f1 += quantity,
                Band::F2 => weights.f2 += quantity,
                Band::F3 => weights.f3 += quantity,
                Band::Mono | Band::F23 | Band::Hourly => {}
            }
        }
    }

    if valid_files == 0 {
        warn!("no usable consumption documents, falling back to simple averaging");
        return None;
    }

    // Consumption files are counted independently of price files.
    weights.f1 /= valid_files as f64;
    weights.f2 /= valid_files as f64;
    weights.f3 /= valid_files as f64;
    Some(weights)
}

/// Open the ZIP and return its documents sorted by filename. Filenames
/// embed the date, so lexicographic order is chronological order.
fn unpack_documents(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    let mut names: Vec<String> = archive
        .file_names()
        .filter(|name| !name.ends_with('/'))
        .map(str::to_owned)
        .collect();
    names.sort();

    let mut documents = Vec::with_capacity(names.len());
    for name in names {
        let mut file = archive.by_name(&name)?;
        let mut contents = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut contents)
            .map_err(|err| UpdateError::MalformedArchive(err.to_string()))?;
        documents.push((name, contents));
    }
    Ok(documents)
}

/// One parsed day: its date and the (0-indexed hour, raw value) rows.
struct ParsedDay {
    date: NaiveDate,
    values: Vec<(usize, f64)>,
}

/// Parse a per-day document. `value_keys` are tried in order for every hour
/// row (zone code first, aggregate fallback second for consumption).
/// Returns `None` when the day is unusable: no date, no hour rows, or a row
/// without a parsable value for any of the keys.
fn parse_day_document(xml: &[u8], value_keys: &[&str]) -> Option<ParsedDay> {
    let rows = parse_rows(xml)?;

    let date_field = rows
        .iter()
        .find(|row| row.contains_key("Data") && row.contains_key("Ora"))
        .and_then(|row| row.get("Data"))?;
    let date = parse_compact_date(date_field)?;

    let mut values = Vec::with_capacity(24);
    for row in &rows {
        let Some(hour_field) = row.get("Ora") else {
            continue;
        };
        let Ok(hour) = hour_field.trim().parse::<usize>() else {
            debug!("ignoring row with non-numeric hour {hour_field:?}");
            continue;
        };
        if !(1..=24).contains(&hour) {
            // DST long days number a 25th hour; it has no slot to land in.
            debug!("ignoring out-of-range hour {hour}");
            continue;
        }

        let raw = value_keys.iter().find_map(|key| row.get(*key))?;
        let value = parse_market_decimal(raw)?;
        values.push((hour - 1, value));
    }

    if values.is_empty() {
        return None;
    }
    Some(ParsedDay { date, values })
}

/// Flatten the document into one string map per row element. The market
/// documents are two levels deep: a root, row elements, scalar children.
fn parse_rows(xml: &[u8]) -> Option<Vec<HashMap<String, String>>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut rows = Vec::new();
    let mut depth = 0_usize;
    let mut row: Option<HashMap<String, String>> = None;
    let mut field: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => {
                depth += 1;
                if depth == 2 {
                    row = Some(HashMap::new());
                } else if depth == 3 {
                    field = Some(String::from_utf8_lossy(start.name().as_ref()).into_owned());
                }
            }
            Ok(Event::Text(text)) => {
                if depth == 3
                    && let (Some(row), Some(field)) = (row.as_mut(), field.as_ref())
                    && let Ok(value) = text.unescape()
                {
                    row.insert(field.clone(), value.into_owned());
                }
            }
            Ok(Event::End(_)) => {
                if depth == 3 {
                    field = None;
                } else if depth == 2
                    && let Some(finished) = row.take()
                {
                    rows.push(finished);
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                debug!("XML parse error: {err}");
                return None;
            }
        }
        buf.clear();
    }

    Some(rows)
}

/// `YYYYMMDD` date field.
fn parse_compact_date(field: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(field.trim(), "%Y%m%d").ok()
}

/// Decimal in the market's locale: `.` as thousands separator, `,` as
/// decimal separator.
fn parse_market_decimal(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replace('.', "").replace(',', ".");
    normalized.parse().ok()
}
