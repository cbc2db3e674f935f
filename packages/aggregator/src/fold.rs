//! The in-memory fold at the heart of §4.4 step 2: scan events for one
//! month and accumulate `(h3, month)` buckets with weighted counts and
//! category histograms.
//!
//! `weighted` here is the **base** weighted count (§4.4): recency and
//! time-of-day are query-time multipliers applied in `saferoute_snapshot`
//! and `saferoute_routing`, never baked in here (§9).

use std::collections::BTreeMap;

use chrono::Utc;
use h3o::CellIndex;
use saferoute_database_models::{CrimeEvent, Month, SafetyCell};
use saferoute_scoring_models::{CrimeCategory, HarmWeightTable};

use crate::AggregatorError;

/// One `(h3, month)` accumulator, pre-materialization.
#[derive(Debug, Default, Clone)]
struct Bucket {
    count: u32,
    weighted: f64,
    stats: BTreeMap<CrimeCategory, u32>,
}

/// Folds `events` (all assumed to belong to `month`) into `(h3, month)`
/// buckets and materializes one [`SafetyCell`] per non-empty bucket.
///
/// # Errors
///
/// Returns [`AggregatorError::Grid`] if an event's coordinates cannot be
/// encoded as an H3 cell.
pub fn fold_events_into_cells(
    events: &[CrimeEvent],
    month: Month,
    harm_weights: &HarmWeightTable,
) -> Result<Vec<SafetyCell>, AggregatorError> {
    let mut buckets: BTreeMap<CellIndex, Bucket> = BTreeMap::new();

    for event in events {
        // I5: category is normalized to `other` before aggregation. The
        // feed client already does this at ingest time, but the fold is
        // the authoritative enforcement point the spec names.
        let category = CrimeCategory::from_feed_slug(event.category.as_ref());

        let cell = saferoute_grid::cell_of(event.lat, event.lon)?;

        let bucket = buckets.entry(cell).or_default();
        bucket.count += 1;
        *bucket.stats.entry(category).or_insert(0) += 1;
        bucket.weighted += harm_weights.get(category);
    }

    let now = Utc::now();
    let mut cells = Vec::with_capacity(buckets.len());

    for (cell, bucket) in buckets {
        let h3_index = cell.to_string();
        let geom = saferoute_grid::boundary_of(cell);

        cells.push(SafetyCell {
            cell_id: SafetyCell::cell_id_for(&h3_index, month),
            h3_index,
            month,
            crime_count_total: bucket.count,
            crime_count_weighted: bucket.weighted,
            stats: bucket.stats,
            geom,
            updated_at: now,
        });
    }

    Ok(cells)
}

#[cfg(test)]
mod tests {
    use saferoute_database_models::DescriptiveFields;

    use super::*;

    fn event(external_id: &str, category: CrimeCategory, lon: f64, lat: f64, month: Month) -> CrimeEvent {
        CrimeEvent {
            external_id: external_id.to_string(),
            month,
            category,
            lon,
            lat,
            descriptive_fields: DescriptiveFields::default(),
        }
    }

    #[test]
    fn single_event_single_cell() {
        let month = Month::new(2026, 7).unwrap();
        let weights = HarmWeightTable::defaults();
        let events = vec![event("e1", CrimeCategory::ViolentCrime, -1.4044, 50.9097, month)];

        let cells = fold_events_into_cells(&events, month, &weights).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].crime_count_total, 1);
        assert!((cells[0].crime_count_weighted - 3.0).abs() < 1e-9);
        assert_eq!(cells[0].stats.get(&CrimeCategory::ViolentCrime), Some(&1));
    }

    #[test]
    fn invariant_i1_holds_after_fold() {
        let month = Month::new(2026, 7).unwrap();
        let weights = HarmWeightTable::defaults();
        let events = vec![
            event("e1", CrimeCategory::Burglary, -1.4044, 50.9097, month),
            event("e2", CrimeCategory::Burglary, -1.40441, 50.90971, month),
            event("e3", CrimeCategory::ViolentCrime, -1.60, 51.05, month),
        ];

        let cells = fold_events_into_cells(&events, month, &weights).unwrap();
        for cell in &cells {
            let stats_total: u32 = cell.stats.values().sum();
            assert_eq!(stats_total, cell.crime_count_total);
            assert!(cell.check_invariants(&weights).is_ok());
        }
    }

    #[test]
    fn fold_is_deterministic() {
        let month = Month::new(2026, 7).unwrap();
        let weights = HarmWeightTable::defaults();
        let events = vec![
            event("e1", CrimeCategory::Burglary, -1.4044, 50.9097, month),
            event("e2", CrimeCategory::ViolentCrime, -1.60, 51.05, month),
        ];

        let first = fold_events_into_cells(&events, month, &weights).unwrap();
        let second = fold_events_into_cells(&events, month, &weights).unwrap();
        assert_eq!(first, second);
    }
}
