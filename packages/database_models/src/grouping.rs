//! The in-memory grouping fold shared by the Snapshot Service and the
//! Route Scorer (§4.5 step 3, §4.6 step 3).
//!
//! Both call sites group raw `(h3, month)` `SafetyCell` rows into one
//! recency- and time-of-day-weighted value per `h3_index`. The spec
//! fails verification if this fold is duplicated (§4.1, §9: "the
//! in-memory fold in §4.5 step 3 is the contract") — so it lives here,
//! below both call sites, rather than in either of them.

use std::collections::BTreeMap;

use saferoute_scoring_models::{CategoryOverrides, CrimeCategory, HarmWeightTable, TimeOfDay, recency_weight};

use crate::{EngineError, Month, SafetyCell};

/// One `h3_index`'s worth of cells within the query window, folded into
/// a single recency-/tod-weighted value plus merged totals.
#[derive(Debug, Clone, PartialEq)]
pub struct CellGroup {
    pub h3_index: String,
    /// Closed polygon ring, shared across every month for this `h3_index`.
    pub geom: Vec<(f64, f64)>,
    pub crime_count_total: u32,
    pub w_group: f64,
    pub stats: BTreeMap<CrimeCategory, u32>,
}

/// Folds `cells` into one [`CellGroup`] per `h3_index` (§4.5 step 3).
///
/// `time_of_day`, when present, re-derives each cell's contribution from
/// its category histogram and the per-category time-of-day multiplier
/// rather than using the pre-materialized `crime_count_weighted` (§9:
/// recency and time-of-day are query-time multipliers, never baked into
/// storage). `category_overrides`, when non-empty, applies as a further
/// multiplicative modifier *after* the harm weight (§4.6 "Input"); the
/// snapshot call site always passes an empty map, since §4.5 has no
/// such input. Cells that fail the I1/I2 invariant check are logged and
/// excluded rather than failing the whole query (§7 `Inconsistent`).
#[must_use]
pub fn group_weighted_cells(
    cells: &[SafetyCell],
    current_month: Month,
    time_of_day: Option<TimeOfDay>,
    category_overrides: &CategoryOverrides,
    harm_weights: &HarmWeightTable,
) -> BTreeMap<String, CellGroup> {
    let mut groups: BTreeMap<String, CellGroup> = BTreeMap::new();

    for cell in cells {
        if let Err(err) = cell.check_invariants(harm_weights) {
            log::warn!("excluding inconsistent cell {}: {err}", cell.cell_id);
            continue;
        }

        let months_ago = cell.month.months_ago(current_month).max(0) as u32;
        let w_cell = cell_weight(cell, time_of_day, category_overrides, harm_weights);
        let contribution = w_cell * recency_weight(months_ago);

        let group = groups.entry(cell.h3_index.clone()).or_insert_with(|| CellGroup {
            h3_index: cell.h3_index.clone(),
            geom: cell.geom.clone(),
            crime_count_total: 0,
            w_group: 0.0,
            stats: BTreeMap::new(),
        });

        group.crime_count_total += cell.crime_count_total;
        group.w_group += contribution;
        for (&category, &count) in &cell.stats {
            *group.stats.entry(category).or_insert(0) += count;
        }
    }

    groups
}

/// A single cell's base weighted value for this query, before the
/// recency multiplier (§4.5 step 3, §4.6 "Input"):
///
/// - with `time_of_day` and/or non-empty `category_overrides`:
///   `Σ stats[cat] · harm_weight(cat) · tod(cat)[time_of_day] · override(cat)`,
///   where either factor defaults to `1.0` when absent.
/// - with neither: the pre-materialized `crime_count_weighted`.
fn cell_weight(
    cell: &SafetyCell,
    time_of_day: Option<TimeOfDay>,
    category_overrides: &CategoryOverrides,
    harm_weights: &HarmWeightTable,
) -> f64 {
    if time_of_day.is_none() && category_overrides.is_empty() {
        return cell.crime_count_weighted;
    }

    cell.stats
        .iter()
        .map(|(&category, &count)| {
            let tod_multiplier = time_of_day.map_or(1.0, |tod| category.default_tod_multipliers().get(tod));
            let override_multiplier = category_overrides.get(&category).copied().unwrap_or(1.0);
            harm_weights.get(category) * f64::from(count) * tod_multiplier * override_multiplier
        })
        .sum()
}

/// Validates a raw `time_of_day` query parameter against the closed
/// enumeration (§9), returning [`EngineError::InvalidInput`] otherwise.
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if `raw` is not one of `night`,
/// `morning`, `day`, `evening`.
pub fn parse_time_of_day(raw: &str) -> Result<TimeOfDay, EngineError> {
    raw.parse()
        .map_err(|_| EngineError::InvalidInput(format!("unknown time_of_day: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DescriptiveFields;

    fn cell(h3: &str, month: Month, category: CrimeCategory, count: u32) -> SafetyCell {
        let mut stats = BTreeMap::new();
        stats.insert(category, count);
        let weights = HarmWeightTable::defaults();
        SafetyCell {
            cell_id: SafetyCell::cell_id_for(h3, month),
            h3_index: h3.to_string(),
            month,
            crime_count_total: count,
            crime_count_weighted: weights.get(category) * f64::from(count),
            stats,
            geom: vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (0.0, 0.0)],
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn single_cell_current_month_no_tod() {
        let current = Month::new(2026, 7).unwrap();
        let cells = vec![cell("abc", current, CrimeCategory::ViolentCrime, 1)];
        let weights = HarmWeightTable::defaults();
        let overrides = CategoryOverrides::default();

        let groups = group_weighted_cells(&cells, current, None, &overrides, &weights);
        let group = groups.get("abc").unwrap();
        assert!((group.w_group - 3.0).abs() < 1e-9);
        assert_eq!(group.crime_count_total, 1);
    }

    #[test]
    fn night_filter_applies_tod_multiplier() {
        let current = Month::new(2026, 7).unwrap();
        let cells = vec![cell("abc", current, CrimeCategory::ViolentCrime, 1)];
        let weights = HarmWeightTable::defaults();
        let overrides = CategoryOverrides::default();

        let groups = group_weighted_cells(&cells, current, Some(TimeOfDay::Night), &overrides, &weights);
        let group = groups.get("abc").unwrap();
        // 3.0 harm * 2.5 night multiplier * 1.00 recency = 7.5
        assert!((group.w_group - 7.5).abs() < 1e-9);
    }

    #[test]
    fn recency_decay_applies_across_months() {
        let current = Month::new(2026, 7).unwrap();
        let past = Month::new(2025, 7).unwrap();
        let cells = vec![cell("abc", past, CrimeCategory::ViolentCrime, 1)];
        let weights = HarmWeightTable::defaults();
        let overrides = CategoryOverrides::default();

        let groups = group_weighted_cells(&cells, current, None, &overrides, &weights);
        let group = groups.get("abc").unwrap();
        // 3.0 * recency_weight(12) = 3.0 * 0.35 = 1.05
        assert!((group.w_group - 1.05).abs() < 1e-9);
    }

    #[test]
    fn multiple_months_sum_with_recency() {
        let current = Month::new(2026, 7).unwrap();
        let last_month = Month::new(2026, 6).unwrap();
        let cells = vec![
            cell("abc", current, CrimeCategory::Burglary, 2),
            cell("abc", last_month, CrimeCategory::Burglary, 1),
        ];
        let weights = HarmWeightTable::defaults();
        let overrides = CategoryOverrides::default();

        let groups = group_weighted_cells(&cells, current, None, &overrides, &weights);
        let group = groups.get("abc").unwrap();
        assert_eq!(group.crime_count_total, 3);
        // (2.0*2)*1.00 + (2.0*1)*0.95 = 4.0 + 1.9 = 5.9
        assert!((group.w_group - 5.9).abs() < 1e-9);
    }

    #[test]
    fn category_override_multiplies_after_harm_weight() {
        let current = Month::new(2026, 7).unwrap();
        let cells = vec![cell("abc", current, CrimeCategory::Burglary, 2)];
        let weights = HarmWeightTable::defaults();
        let mut overrides = CategoryOverrides::default();
        overrides.insert(CrimeCategory::Burglary, 2.0);

        let groups = group_weighted_cells(&cells, current, None, &overrides, &weights);
        let group = groups.get("abc").unwrap();
        // 2.0 harm * 2 count * 2.0 override * 1.00 recency = 8.0
        assert!((group.w_group - 8.0).abs() < 1e-9);
    }

    #[test]
    fn category_override_and_tod_multiplier_compose() {
        let current = Month::new(2026, 7).unwrap();
        let cells = vec![cell("abc", current, CrimeCategory::ViolentCrime, 1)];
        let weights = HarmWeightTable::defaults();
        let mut overrides = CategoryOverrides::default();
        overrides.insert(CrimeCategory::ViolentCrime, 0.5);

        let groups = group_weighted_cells(&cells, current, Some(TimeOfDay::Night), &overrides, &weights);
        let group = groups.get("abc").unwrap();
        // 3.0 harm * 2.5 night multiplier * 0.5 override * 1.00 recency = 3.75
        assert!((group.w_group - 3.75).abs() < 1e-9);
    }

    #[test]
    fn inconsistent_cell_is_excluded_not_fatal() {
        let current = Month::new(2026, 7).unwrap();
        let mut broken = cell("abc", current, CrimeCategory::ViolentCrime, 1);
        broken.crime_count_total = 99; // violates I1
        let weights = HarmWeightTable::defaults();
        let overrides = CategoryOverrides::default();

        let groups = group_weighted_cells(&[broken], current, None, &overrides, &weights);
        assert!(groups.is_empty());
    }

    #[test]
    fn parse_time_of_day_rejects_unknown() {
        assert!(parse_time_of_day("midnight").is_err());
        assert_eq!(parse_time_of_day("night").unwrap(), TimeOfDay::Night);
    }
}
