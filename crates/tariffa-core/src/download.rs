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

//! HTTP client for the market operator's archive download endpoint.

use crate::error::{Result, UpdateError};
use chrono::{Datelike, Duration, NaiveDate};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use serde::Serialize;
use tariffa_types::CoordinatorConfig;
use tracing::{debug, error};

const GME_BASE_URL: &str = "https://gme.mercatoelettrico.org";
const DOWNLOAD_PATH: &str = "/DesktopModules/GmeDownload/API/ExcelDownload/downloadzipfile";

/// Which archive the endpoint should serve. The request differs only in the
/// sector query parameter and the referer the site expects with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Prices,
    Consumption,
}

impl ArchiveKind {
    fn sector(self) -> &'static str {
        match self {
            ArchiveKind::Prices => "Prezzi",
            ArchiveKind::Consumption => "Fabbisogno",
        }
    }
}

/// Inclusive date range of a fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// The window to request for an update running on `today`: the current
    /// month so far, today only when month-averaging is off, and extended
    /// three days into the previous month during days 1-3 unless the
    /// configuration restricts it to actual data.
    pub fn for_update(today: NaiveDate, config: &CoordinatorConfig) -> Self {
        let mut start = if config.month_average {
            today.with_day(1).unwrap_or(today)
        } else {
            today
        };

        if !config.actual_data_only && today.day() < 4 {
            start -= Duration::days(3);
        }

        Self { start, end: today }
    }
}

/// Thin wrapper around `reqwest::Client` carrying the endpoint, the header
/// set the site expects, and a test-overridable base URL.
#[derive(Debug, Clone)]
pub struct MarketClient {
    client: reqwest::Client,
    base_url: String,
}

impl MarketClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(GME_BASE_URL)
    }

    /// Point the client at a different host (tests use a local mock server).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Download one ZIP archive for the date range. Any non-200 status is a
    /// `Network` error; the body is returned as raw bytes for extraction.
    pub async fn fetch_archive(&self, range: DateRange, kind: ArchiveKind) -> Result<Vec<u8>> {
        let start = range.start.format("%Y%m%d");
        let end = range.end.format("%Y%m%d");
        let url = format!(
            "{}{}?DataInizio={start}&DataFine={end}&Date={end}&Mercato=MGP&Settore={}&FiltroDate=InizioFine",
            self.base_url,
            DOWNLOAD_PATH,
            kind.sector()
        );

        debug!("downloading {} archive: {url}", kind.sector());

        let response = self.client.get(&url).headers(request_headers(kind)).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            error!("archive request failed with status {status}");
            return Err(UpdateError::Network(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        debug!("received {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

/// The download endpoint refuses plain API calls; it wants to see the
/// browser download page as referer plus the module/tab identifiers that
/// page would send.
fn request_headers(kind: ArchiveKind) -> HeaderMap {
    let referer = format!(
        "{GME_BASE_URL}/en-us/Home/Results/Electricity/MGP/Download?valore={}",
        kind.sector()
    );

    let mut headers = HeaderMap::new();
    headers.insert("moduleid", HeaderValue::from_static("12103"));
    if let Ok(value) = HeaderValue::from_str(&referer) {
        headers.insert(REFERER, value);
    }
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("sec-ch-ua-platform", HeaderValue::from_static("Windows"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
    headers.insert("sec-gpc", HeaderValue::from_static("1"));
    headers.insert("tabid", HeaderValue::from_static("1749"));
    headers.insert("userid", HeaderValue::from_static("-1"));
    headers
}
