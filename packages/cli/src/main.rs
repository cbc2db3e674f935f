#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Admin CLI for the crime-risk scoring engine (§6, §10.7): runs
//! migrations, ingests a month of crime events, rebuilds the safety
//! grid, and checks grid consistency.

use clap::{Parser, Subcommand};
use saferoute_database_models::{EngineConfig, Month};
use saferoute_feed::HttpCrimeFeed;
use saferoute_scoring_models::HarmWeightTable;

#[derive(Parser)]
#[command(name = "saferoute_cli", about = "SafeRoute engine admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pending database migrations.
    Migrate,
    /// Ingest the current calendar month from the crime feed, then
    /// re-aggregate it.
    IngestLatest,
    /// Ingest a specific `(year, month)` from the crime feed, then
    /// re-aggregate it.
    IngestMonth {
        year: i32,
        month: u32,
    },
    /// Rebuild the safety grid over the last `months` months from
    /// whatever is already in the event store.
    RebuildGrid {
        #[arg(long, default_value_t = 12)]
        months: u8,
    },
    /// Re-checks `SafetyCell` invariants (I1/I2) for every cell covering
    /// the operational bounding box over the default lookback window.
    ValidateGridHealth,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let config = EngineConfig::from_env();

    match cli.command {
        Commands::Migrate => {
            log::info!("running database migrations...");
            let db = saferoute_database::db::connect_from_env().await?;
            saferoute_database::run_migrations(db.as_ref()).await?;
            log::info!("migrations complete.");
        }
        Commands::IngestLatest => {
            let now = chrono::Utc::now();
            run_ingest(&config, chrono::Datelike::year(&now), chrono::Datelike::month(&now)).await?;
        }
        Commands::IngestMonth { year, month } => {
            run_ingest(&config, year, month).await?;
        }
        Commands::RebuildGrid { months } => {
            let db = saferoute_database::db::connect_from_env().await?;
            saferoute_database::run_migrations(db.as_ref()).await?;
            let harm_weights = load_harm_weights(&config);
            let current_month = current_month();

            log::info!("rebuilding grid over the last {months} month(s)...");
            let report = saferoute_aggregator::rebuild::rebuild(
                db.as_ref(),
                &harm_weights,
                months,
                current_month,
            )
            .await?;
            log::info!(
                "rebuild complete: {} months, {} events scanned, {} cells upserted, version={}",
                report.months_processed,
                report.events_scanned,
                report.cells_upserted,
                report.grid_version
            );
        }
        Commands::ValidateGridHealth => {
            validate_grid_health(&config).await?;
        }
    }

    Ok(())
}

async fn run_ingest(config: &EngineConfig, year: i32, month: u32) -> Result<(), Box<dyn std::error::Error>> {
    let db = saferoute_database::db::connect_from_env().await?;
    saferoute_database::run_migrations(db.as_ref()).await?;
    let harm_weights = load_harm_weights(config);
    let feed_base_url = std::env::var("SAFEROUTE_CRIME_FEED_URL")
        .unwrap_or_else(|_| "https://data.police.uk/api/crimes-street/all-crime".to_string());
    let feed = HttpCrimeFeed::new(feed_base_url);
    let bbox_tiles = [config.operational_bbox];

    log::info!("ingesting {year:04}-{month:02}...");
    let report = saferoute_aggregator::ingest::ingest_month(
        db.as_ref(),
        &feed,
        &bbox_tiles,
        &harm_weights,
        year,
        month,
    )
    .await?;
    log::info!(
        "ingest complete: fetched={} upserted={} skipped={} cells={} version={}",
        report.fetched,
        report.upserted,
        report.skipped,
        report.cells_upserted,
        report.grid_version
    );
    Ok(())
}

async fn validate_grid_health(config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db = saferoute_database::db::connect_from_env().await?;
    let harm_weights = load_harm_weights(config);
    let months = current_month().last_n(config.default_lookback.get());

    let cells = saferoute_database::cells::cells_in_bbox_for_months(db.as_ref(), &config.operational_bbox, &months).await?;
    log::info!("checking invariants for {} cell(s)...", cells.len());

    let mut failures = 0u64;
    for cell in &cells {
        if let Err(e) = cell.check_invariants(&harm_weights) {
            failures += 1;
            log::error!("cell {} failed invariant check: {e}", cell.cell_id);
        }
    }

    if failures == 0 {
        log::info!("grid health: {} cell(s) checked, no inconsistencies found", cells.len());
    } else {
        log::warn!("grid health: {failures}/{} cell(s) failed invariant checks", cells.len());
        return Err(format!("{failures} inconsistent cell(s) found").into());
    }
    Ok(())
}

fn current_month() -> Month {
    let now = chrono::Utc::now();
    Month::new(chrono::Datelike::year(&now), chrono::Datelike::month(&now))
        .expect("system clock's current month is always valid")
}

/// Loads the harm weight table, applying the operator override file at
/// `EngineConfig::harm_weight_table_path` if one is configured.
fn load_harm_weights(config: &EngineConfig) -> HarmWeightTable {
    let Some(path) = &config.harm_weight_table_path else {
        return HarmWeightTable::defaults();
    };

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<HarmWeightTable>(&contents) {
            Ok(table) => table,
            Err(e) => {
                log::warn!("failed to parse harm weight table at {path}: {e}, using defaults");
                HarmWeightTable::defaults()
            }
        },
        Err(e) => {
            log::warn!("failed to read harm weight table at {path}: {e}, using defaults");
            HarmWeightTable::defaults()
        }
    }
}
