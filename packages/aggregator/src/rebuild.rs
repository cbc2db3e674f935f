//! `rebuild(N)` (§4.4): a deterministic rebuild of the grid over the
//! last `N` months from whatever events are already in the Event Store.
//!
//! Takes the process-wide aggregation lock for the whole operation (§5:
//! "`rebuild(N)` takes a process-wide lock on the aggregation table
//! (coarse and correct; finer locking is future work)").

use saferoute_database::{cells, events, locks, version};
use saferoute_database_models::Month;
use saferoute_scoring_models::HarmWeightTable;
use switchy_database::Database;

use crate::AggregatorError;
use crate::fold::fold_events_into_cells;

/// Summary of a completed rebuild, returned for logging/admin surfacing.
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildReport {
    pub months_processed: usize,
    pub events_scanned: u64,
    pub cells_upserted: u64,
    pub grid_version: u64,
}

/// Rebuilds `SafetyCell` aggregates for the `months` most recent months
/// ending at `current_month` (§4.4 `rebuild`).
///
/// Idempotent: running twice against the same Event Store contents
/// yields identical `SafetyCell` states (P2). Cells whose `(h3, month)`
/// key falls outside the rebuilt window are left untouched — stale, not
/// deleted (§4.4 step 4).
///
/// # Errors
///
/// Returns [`AggregatorError::Busy`] if a concurrent rebuild already
/// holds the process-wide lock, or a database/grid error if the
/// underlying operations fail.
pub async fn rebuild(
    db: &dyn Database,
    harm_weights: &HarmWeightTable,
    months: u8,
    current_month: Month,
) -> Result<RebuildReport, AggregatorError> {
    if !locks::try_acquire(db, locks::REBUILD_LOCK_KEY).await? {
        return Err(AggregatorError::Busy(
            "a rebuild is already running".to_string(),
        ));
    }

    let result = rebuild_locked(db, harm_weights, months, current_month).await;

    locks::release(db, locks::REBUILD_LOCK_KEY).await?;

    result
}

async fn rebuild_locked(
    db: &dyn Database,
    harm_weights: &HarmWeightTable,
    months: u8,
    current_month: Month,
) -> Result<RebuildReport, AggregatorError> {
    let month_set = current_month.last_n(months);

    let mut events_scanned = 0u64;
    let mut cells_upserted = 0u64;

    for month in &month_set {
        let month_events = events::events_in_month(db, *month).await?;
        events_scanned += month_events.len() as u64;

        let month_cells = fold_events_into_cells(&month_events, *month, harm_weights)?;
        for cell in &month_cells {
            cells::upsert_cell(db, cell).await?;
            cells_upserted += 1;
        }

        log::info!(
            "rebuild: month {month} — {} events -> {} cells",
            month_events.len(),
            month_cells.len()
        );
    }

    let grid_version = version::bump_version(db).await?;

    log::info!(
        "rebuild complete: {} months, {events_scanned} events, {cells_upserted} cells, version={grid_version}",
        month_set.len()
    );

    Ok(RebuildReport {
        months_processed: month_set.len(),
        events_scanned,
        cells_upserted,
        grid_version,
    })
}
