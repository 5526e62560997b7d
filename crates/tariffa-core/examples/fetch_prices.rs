use chrono::{Datelike, Utc};
use tariffa_core::bands::{MARKET_TZ, current_band};
use tariffa_core::calendar;
use tariffa_core::coordinator::PriceCoordinator;
use tariffa_types::{Band, CoordinatorConfig, Variant, Zone};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up logging
    tracing_subscriber::fmt::init();

    let config = CoordinatorConfig {
        variant: Variant::Zonal,
        zone: Zone::Nord,
        scan_minute: Some(0),
        ..Default::default()
    };

    let (mut coordinator, handle) = PriceCoordinator::new(config)?;

    println!("Fetching current month prices for zone NORD...");
    let range = coordinator.refresh_once().await?;
    println!("Fetched archive for {} - {}", range.start, range.end);

    let values = handle.prices();
    for band in [Band::F1, Band::F2, Band::F3, Band::F23, Band::Mono] {
        println!("  {band}: {:.5} EUR/kWh", values.get(band));
    }

    let now = Utc::now().with_timezone(&MARKET_TZ);
    let cal = calendar::shared(now.year());
    let (band, next_change) = current_band(now, &cal);
    println!(
        "Current band: {band} until {}",
        next_change.format("%d/%m/%Y %H:%M")
    );

    let snapshot = handle.snapshot();
    println!("\nHourly prices (EUR/kWh):");
    for (hour, price) in snapshot.raw.hourly.iter().enumerate() {
        println!("  {hour:02}:00  {price:.5}");
    }

    Ok(())
}
