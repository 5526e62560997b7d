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

//! The price-update coordinator: one task owning the fetch schedule, the
//! band/hour refresh timers and the published snapshot.
//!
//! All mutation happens inside the coordinator's own run loop; collaborators
//! hold a [`CoordinatorHandle`] with read-only snapshot access and a
//! broadcast subscription. One parametrized scheduler serves both the
//! national and the zonal price series; the variant only selects the retry
//! table and whether the consumption archive is fetched.

use crate::aggregate::{AggregatedValues, aggregate};
use crate::archive::{RawSeries, extract_archive};
use crate::bands::{MARKET_TZ, current_band, next_occurrence};
use crate::calendar;
use crate::download::{ArchiveKind, DateRange, MarketClient};
use crate::error::{Result, UpdateError};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tariffa_types::{Band, CoordinatorConfig, CoordinatorEvent, Variant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Fixed delay before the first fetch, so the host finishes initializing.
const STARTUP_FETCH_DELAY_SECS: i64 = 10;
/// Delay before the fetch triggered by a configuration change.
const RECONFIGURE_FETCH_DELAY_SECS: i64 = 5;

/// Backoff delays in minutes, consumed front-to-back on consecutive
/// failures and reloaded on any success.
const WEB_RETRIES_MINUTES: &[i64] = &[1, 10, 60, 120, 180];
const WEB_RETRIES_MINUTES_ZONAL: &[i64] = &[1, 10, 30, 60, 120, 180, 240];

fn retry_table(variant: Variant) -> &'static [i64] {
    match variant {
        Variant::National => WEB_RETRIES_MINUTES,
        Variant::Zonal => WEB_RETRIES_MINUTES_ZONAL,
    }
}

/// Current and upcoming tariff band, with two transitions of lookahead.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BandState {
    pub current: Option<Band>,
    pub next: Option<Band>,
    pub next_change: Option<DateTime<Tz>>,
    pub following_change: Option<DateTime<Tz>>,
}

/// The shared read-only view collaborators re-read on every event.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PriceSnapshot {
    pub raw: RawSeries,
    pub values: AggregatedValues,
    pub band: BandState,
    /// Date range of the last successful fetch.
    pub last_range: Option<DateRange>,
}

/// What the scheduler decided after a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    /// Another delay was available in the queue.
    Backoff { minutes: i64, at: DateTime<Tz> },
    /// Queue exhausted: try again at the next day's scan time.
    NextDay { at: DateTime<Tz> },
}

/// Retry queue plus the single armed deadline. Pure bookkeeping over
/// injected "now" values; the run loop owns the actual sleeping.
#[derive(Debug)]
pub struct ScheduleState {
    defaults: &'static [i64],
    retries: VecDeque<i64>,
    next_run: Option<DateTime<Tz>>,
}

impl ScheduleState {
    pub fn new(variant: Variant) -> Self {
        let defaults = retry_table(variant);
        Self {
            defaults,
            retries: defaults.iter().copied().collect(),
            next_run: None,
        }
    }

    pub fn next_run(&self) -> Option<DateTime<Tz>> {
        self.next_run
    }

    /// Cancel the armed deadline. Cancelling an empty slot is a no-op.
    pub fn cancel(&mut self) {
        self.next_run = None;
    }

    /// Arm the deadline, replacing whatever was armed before.
    pub fn arm_at(&mut self, at: DateTime<Tz>) {
        self.next_run = Some(at);
    }

    pub fn reload_retries(&mut self) {
        self.retries = self.defaults.iter().copied().collect();
    }

    pub fn remaining_retries(&self) -> usize {
        self.retries.len()
    }

    /// After a successful cycle: reload the retry queue and arm the next
    /// run at the scan time, rolling to tomorrow when today's has passed.
    pub fn arm_after_success(
        &mut self,
        now: DateTime<Tz>,
        scan_hour: u32,
        scan_minute: u32,
        calendar: &calendar::HolidayCalendar,
    ) -> DateTime<Tz> {
        self.reload_retries();
        let mut at = next_occurrence(now, scan_hour, scan_minute, 0, false, calendar);
        if at <= now {
            at = next_occurrence(now, scan_hour, scan_minute, 1, false, calendar);
        }
        self.next_run = Some(at);
        at
    }

    /// After a failed cycle: pop the next backoff delay, or fall through to
    /// the next calendar day once the queue is exhausted.
    pub fn arm_after_failure(
        &mut self,
        now: DateTime<Tz>,
        scan_hour: u32,
        scan_minute: u32,
        calendar: &calendar::HolidayCalendar,
    ) -> RetryDecision {
        if let Some(minutes) = self.retries.pop_front() {
            let at = now + Duration::minutes(minutes);
            self.next_run = Some(at);
            RetryDecision::Backoff { minutes, at }
        } else {
            let at = next_occurrence(now, scan_hour, scan_minute, 1, false, calendar);
            self.next_run = Some(at);
            RetryDecision::NextDay { at }
        }
    }
}

#[derive(Debug)]
enum Command {
    Reconfigure(CoordinatorConfig),
    Shutdown,
}

enum Wakeup {
    Command(Option<Command>),
    Fetch,
    Band,
    Hour,
}

/// Cloneable collaborator-side access: snapshot reads, event subscription,
/// reconfiguration and shutdown.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    snapshot: Arc<RwLock<PriceSnapshot>>,
    events: broadcast::Sender<CoordinatorEvent>,
    commands: mpsc::Sender<Command>,
    scan_minute: Arc<AtomicU8>,
}

impl CoordinatorHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> PriceSnapshot {
        self.snapshot.read().clone()
    }

    pub fn prices(&self) -> AggregatedValues {
        self.snapshot.read().values
    }

    pub fn band_state(&self) -> BandState {
        self.snapshot.read().band
    }

    /// The minute within the scan hour this installation fetches at. Drawn
    /// once at random when the configuration carried none; the host should
    /// persist it so every restart keeps the same slot.
    pub fn scan_minute(&self) -> u8 {
        self.scan_minute.load(Ordering::Relaxed)
    }

    /// Replace the configuration. The coordinator cancels its pending
    /// fetch, reloads the retry queue and fetches again within seconds.
    pub async fn reconfigure(&self, config: CoordinatorConfig) -> bool {
        self.commands.send(Command::Reconfigure(config)).await.is_ok()
    }

    pub async fn shutdown(&self) -> bool {
        self.commands.send(Command::Shutdown).await.is_ok()
    }
}

/// The coordinator task. Construct with [`PriceCoordinator::new`], hand the
/// [`CoordinatorHandle`] to collaborators and drive the loop with
/// [`PriceCoordinator::run`].
#[derive(Debug)]
pub struct PriceCoordinator {
    config: CoordinatorConfig,
    scan_minute: Arc<AtomicU8>,
    tz: Tz,
    client: MarketClient,
    schedule: ScheduleState,
    snapshot: Arc<RwLock<PriceSnapshot>>,
    events: broadcast::Sender<CoordinatorEvent>,
    commands: mpsc::Receiver<Command>,
    next_band_change: Option<DateTime<Tz>>,
    next_hour_tick: Option<DateTime<Tz>>,
}

impl PriceCoordinator {
    pub fn new(config: CoordinatorConfig) -> Result<(Self, CoordinatorHandle)> {
        let client = MarketClient::new()?;
        Self::with_client(config, client)
    }

    /// Construct with a caller-supplied client (tests point it at a mock
    /// server).
    pub fn with_client(
        config: CoordinatorConfig,
        client: MarketClient,
    ) -> Result<(Self, CoordinatorHandle)> {
        config.validate().map_err(UpdateError::Configuration)?;

        let minute = config
            .scan_minute
            .unwrap_or_else(|| rand::thread_rng().gen_range(0..60));
        let scan_minute = Arc::new(AtomicU8::new(minute));

        let snapshot = Arc::new(RwLock::new(PriceSnapshot::default()));
        let (events, _) = broadcast::channel(16);
        let (command_tx, command_rx) = mpsc::channel(8);

        let handle = CoordinatorHandle {
            snapshot: Arc::clone(&snapshot),
            events: events.clone(),
            commands: command_tx,
            scan_minute: Arc::clone(&scan_minute),
        };

        let coordinator = Self {
            schedule: ScheduleState::new(config.variant),
            scan_minute,
            tz: MARKET_TZ,
            client,
            snapshot,
            events,
            commands: command_rx,
            next_band_change: None,
            next_hour_tick: None,
            config,
        };

        info!(
            "coordinator initialized for zone {} (actual data only = {})",
            coordinator.config.zone, coordinator.config.actual_data_only
        );

        Ok((coordinator, handle))
    }

    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// Run until shutdown. Band and hour state are primed immediately; the
    /// first archive fetch waits a fixed startup delay.
    pub async fn run(mut self) {
        self.update_hour();
        self.update_band();
        self.schedule
            .arm_at(self.now() + Duration::seconds(STARTUP_FETCH_DELAY_SECS));

        loop {
            let fetch_at = self.schedule.next_run();
            let band_at = self.next_band_change;
            let hour_at = self.next_hour_tick;

            let wakeup = tokio::select! {
                command = self.commands.recv() => Wakeup::Command(command),
                () = sleep_until(fetch_at), if fetch_at.is_some() => Wakeup::Fetch,
                () = sleep_until(band_at), if band_at.is_some() => Wakeup::Band,
                () = sleep_until(hour_at), if hour_at.is_some() => Wakeup::Hour,
            };

            match wakeup {
                Wakeup::Command(Some(Command::Reconfigure(config))) => self.reconfigure(config),
                Wakeup::Command(Some(Command::Shutdown) | None) => {
                    self.schedule.cancel();
                    info!("coordinator shutting down");
                    break;
                }
                Wakeup::Fetch => self.update_prices().await,
                Wakeup::Band => self.update_band(),
                Wakeup::Hour => self.update_hour(),
            }
        }
    }

    /// Run one fetch-extract-aggregate cycle immediately, without touching
    /// the schedule. The run loop's timer path wraps this in retry handling.
    pub async fn refresh_once(&mut self) -> Result<DateRange> {
        let now = self.now();
        let range = DateRange::for_update(now.date_naive(), &self.config);
        debug!("starting archive download for {range:?}");

        let prices = self.client.fetch_archive(range, ArchiveKind::Prices).await?;
        let consumption = if self.config.variant.fetches_consumption() {
            match self
                .client
                .fetch_archive(range, ArchiveKind::Consumption)
                .await
            {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    warn!("consumption archive unavailable ({err}), aggregating unweighted");
                    None
                }
            }
        } else {
            None
        };

        let calendar = calendar::shared(now.year());
        let raw = extract_archive(&prices, consumption.as_deref(), self.config.zone, &calendar)?;
        let values = aggregate(&raw, now.hour() as usize);

        debug!(
            "aggregated prices for {}: {:.5} (F1), {:.5} (F2), {:.5} (F3), {:.5} (F23), {:.5} (MONO)",
            self.config.zone, values.f1, values.f2, values.f3, values.f23, values.mono
        );

        let mut snapshot = self.snapshot.write();
        snapshot.raw = raw;
        snapshot.values = values;
        snapshot.last_range = Some(range);
        Ok(range)
    }

    /// Timer-fired fetch cycle with success/failure scheduling.
    async fn update_prices(&mut self) {
        // Explicit cancel before any re-arm; at most one deadline is armed.
        self.schedule.cancel();

        match self.refresh_once().await {
            Ok(range) => {
                let _ = self.events.send(CoordinatorEvent::PricesUpdated);

                let now = self.now();
                let cal = calendar::shared(now.year());
                let next = self.schedule.arm_after_success(
                    now,
                    u32::from(self.config.scan_hour),
                    u32::from(self.scan_minute.load(Ordering::Relaxed)),
                    &cal,
                );
                debug!(
                    "prices updated for {} - {}; next web update: {}",
                    range.start,
                    range.end,
                    next.format("%d/%m/%Y %H:%M:%S %z")
                );
            }
            Err(err) if !err.is_retryable() => {
                error!("fatal configuration problem, not retrying: {err}");
            }
            Err(err) => {
                let now = self.now();
                let cal = calendar::shared(now.year());
                let decision = self.schedule.arm_after_failure(
                    now,
                    u32::from(self.config.scan_hour),
                    u32::from(self.scan_minute.load(Ordering::Relaxed)),
                    &cal,
                );
                match decision {
                    RetryDecision::Backoff { minutes, at } => warn!(
                        "price update failed ({err}), retrying in {minutes} minute(s) at {}",
                        at.format("%H:%M:%S %z")
                    ),
                    RetryDecision::NextDay { at } => error!(
                        "price update failed ({err}) and retries are exhausted, next attempt {}",
                        at.format("%d/%m/%Y %H:%M:%S %z")
                    ),
                }
            }
        }
    }

    /// Recompute the current band and re-arm exactly at the next boundary.
    fn update_band(&mut self) {
        let now = self.now();
        debug!(
            "current market-local time: {}",
            now.format("%a %d/%m/%Y %H:%M:%S %z")
        );

        let cal = calendar::shared(now.year());
        let (current, next_change) = current_band(now, &cal);
        let (next_band, following_change) = current_band(next_change, &cal);

        {
            let mut snapshot = self.snapshot.write();
            snapshot.band = BandState {
                current: Some(current),
                next: Some(next_band),
                next_change: Some(next_change),
                following_change: Some(following_change),
            };
        }

        info!(
            "current band: {current} (next: {next_band} at {})",
            next_change.format("%a %d/%m/%Y %H:%M:%S %z")
        );
        let _ = self.events.send(CoordinatorEvent::BandUpdated);

        self.next_band_change = Some(next_change);
    }

    /// Republish the current hour's spot value and re-arm at the top of the
    /// next hour. Skipped (except for the re-arm) until a band has been
    /// computed at least once.
    fn update_hour(&mut self) {
        let now = self.now();

        let published = {
            let mut snapshot = self.snapshot.write();
            if snapshot.band.current.is_some() {
                snapshot.values.hourly = snapshot.raw.hourly[now.hour() as usize];
                true
            } else {
                false
            }
        };
        if published {
            let _ = self.events.send(CoordinatorEvent::HourUpdated);
        }

        let cal = calendar::shared(now.year());
        let next_hour = (now.hour() + 1) % 24;
        let day_offset = i64::from(now.hour() == 23);
        self.next_hour_tick = Some(next_occurrence(now, next_hour, 0, day_offset, false, &cal));
    }

    /// Apply a configuration change: cancel the pending fetch, reload the
    /// retry queue and fetch again after a short delay.
    fn reconfigure(&mut self, config: CoordinatorConfig) {
        if let Err(err) = config.validate() {
            error!("rejecting reconfiguration: {err}");
            return;
        }

        if config.variant != self.config.variant {
            self.schedule = ScheduleState::new(config.variant);
        }

        // A scan-hour change redraws the minute unless the host pinned one.
        let minute = match config.scan_minute {
            Some(minute) => minute,
            None if config.scan_hour != self.config.scan_hour => {
                rand::thread_rng().gen_range(0..60)
            }
            None => self.scan_minute.load(Ordering::Relaxed),
        };
        self.scan_minute.store(minute, Ordering::Relaxed);
        self.config = config;

        self.schedule.cancel();
        self.schedule.reload_retries();
        self.schedule
            .arm_at(self.now() + Duration::seconds(RECONFIGURE_FETCH_DELAY_SECS));
        info!("configuration updated, fetching again in {RECONFIGURE_FETCH_DELAY_SECS} s");
    }
}

/// Sleep until a market-local deadline. `None` pends forever; callers guard
/// with the select precondition, this is just the safe default.
async fn sleep_until(deadline: Option<DateTime<Tz>>) {
    let Some(deadline) = deadline else {
        return std::future::pending().await;
    };
    let remaining = (deadline.with_timezone(&Utc) - Utc::now())
        .to_std()
        .unwrap_or(std::time::Duration::ZERO);
    tokio::time::sleep(remaining).await;
}
