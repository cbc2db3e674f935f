//! `ingest_month(year, month)` (§4.4): fetch/import events for one month
//! from the crime feed, upsert them, then re-aggregate that month only.
//!
//! Unlike `rebuild`, different months may ingest concurrently (§5); only
//! the month being ingested is locked.

use saferoute_database::{cells, events, locks, version};
use saferoute_database_models::{BoundingBox, Month};
use saferoute_feed::CrimeFeed;
use saferoute_scoring_models::HarmWeightTable;
use switchy_database::Database;

use crate::AggregatorError;
use crate::fold::fold_events_into_cells;

/// How many skipped `external_id`s to surface in the error sample.
const MALFORMED_SAMPLE_SIZE: usize = 5;

/// Summary of a completed month ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub year: i32,
    pub month: u32,
    pub fetched: u64,
    pub upserted: u64,
    pub skipped: u64,
    pub cells_upserted: u64,
    pub grid_version: u64,
}

/// Fetches, upserts, and re-aggregates one month (§4.4 `ingest_month`).
///
/// # Errors
///
/// Returns [`AggregatorError::Busy`] if a concurrent ingest already
/// holds this month's advisory lock, [`AggregatorError::TooManyMalformed`]
/// if more than [`MALFORMED_THRESHOLD`] of the fetched batch was
/// malformed, or a feed/database/grid error otherwise.
pub async fn ingest_month(
    db: &dyn Database,
    feed: &dyn CrimeFeed,
    bbox_tiles: &[BoundingBox],
    harm_weights: &HarmWeightTable,
    year: i32,
    month: u32,
) -> Result<IngestReport, AggregatorError> {
    let lock_key = locks::month_lock_key(year, month);
    if !locks::try_acquire(db, lock_key).await? {
        return Err(AggregatorError::Busy(format!(
            "ingest for {year:04}-{month:02} is already running"
        )));
    }

    let result = ingest_month_locked(db, feed, bbox_tiles, harm_weights, year, month).await;

    locks::release(db, lock_key).await?;

    result
}

async fn ingest_month_locked(
    db: &dyn Database,
    feed: &dyn CrimeFeed,
    bbox_tiles: &[BoundingBox],
    harm_weights: &HarmWeightTable,
    year: i32,
    month: u32,
) -> Result<IngestReport, AggregatorError> {
    let target_month = Month::new(year, month).map_err(|e| {
        AggregatorError::Feed(saferoute_feed::FeedError::Malformed(format!(
            "invalid year/month passed to ingest_month: {e}"
        )))
    })?;

    let fetched_events = feed.fetch(year, month, bbox_tiles).await?;
    let fetched = fetched_events.len() as u64;

    let (upserted, skipped) = events::upsert_events(db, &fetched_events).await?;

    if events::exceeds_malformed_threshold(skipped, fetched) {
        let sample: Vec<String> = fetched_events
            .iter()
            .filter(|e| !e.lon.is_finite() || !e.lat.is_finite() || e.external_id.is_empty())
            .take(MALFORMED_SAMPLE_SIZE)
            .map(|e| e.external_id.clone())
            .collect();
        return Err(AggregatorError::TooManyMalformed {
            skipped,
            total: fetched,
            sample,
        });
    }

    let month_events = events::events_in_month(db, target_month).await?;
    let month_cells = fold_events_into_cells(&month_events, target_month, harm_weights)?;

    for cell in &month_cells {
        cells::upsert_cell(db, cell).await?;
    }

    let grid_version = version::bump_version(db).await?;

    log::info!(
        "ingest_month {year:04}-{month:02}: fetched={fetched} upserted={upserted} \
         skipped={skipped} cells={} version={grid_version}",
        month_cells.len()
    );

    Ok(IngestReport {
        year,
        month,
        fetched,
        upserted,
        skipped,
        cells_upserted: month_cells.len() as u64,
        grid_version,
    })
}
