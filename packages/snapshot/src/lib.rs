#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The Snapshot Service (§4.5): a bounding-box + time-window query over
//! the safety grid, returning one risk/safety-scored hexagon per
//! `h3_index` plus a summary.
//!
//! Grouping and weighting are delegated to
//! `saferoute_database_models::grouping`, the same fold the Route
//! Scorer uses (§4.1, §9) — this crate only adds the bbox/window query
//! and the output shaping in §4.5 steps 4-5.

use std::collections::BTreeMap;

use saferoute_database_models::grouping::CellGroup;
use saferoute_database_models::{BoundingBox, EngineError, Month};
use saferoute_scoring_models::{CrimeCategory, HarmWeightTable, LookbackMonths, RiskClass, TimeOfDay, risk, risk_class, safety_score};
use serde::{Deserialize, Serialize};
use switchy_database::Database;

/// Everything needed to evaluate one snapshot query (§4.5 "Input").
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotQuery {
    pub bbox: BoundingBox,
    pub lookback_months: LookbackMonths,
    pub time_of_day: Option<TimeOfDay>,
}

/// One scored hexagon in a snapshot response (§4.5 step 4, "Output
/// contract").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCell {
    pub h3_index: String,
    /// Closed polygon ring, `(lon, lat)` pairs, first == last (GeoJSON
    /// `Polygon`-shaped).
    pub geom: Vec<(f64, f64)>,
    pub crime_count_total: u32,
    /// Rounded to 3 decimals.
    pub risk_score: f64,
    /// Rounded to 1 decimal.
    pub safety_score: f64,
    pub risk_class: RiskClass,
    /// Category histogram with zero-count categories omitted.
    pub crime_breakdown: BTreeMap<CrimeCategory, u32>,
}

/// Snapshot-wide summary (§4.5 step 5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub cell_count: usize,
    pub total_crime_count: u64,
    pub mean_safety_score: f64,
    pub highest_risk_h3: Option<String>,
    pub lowest_risk_h3: Option<String>,
}

/// Request-echoing metadata (§6 `GET /safety/snapshot`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    pub bbox: BoundingBox,
    pub cell_size_m: u32,
    pub grid_type: String,
    pub months_included: Vec<String>,
}

/// The full snapshot response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub cells: Vec<SnapshotCell>,
    pub summary: SnapshotSummary,
    pub meta: SnapshotMeta,
}

/// Resolution-10 H3 edge length, echoed in [`SnapshotMeta`] (§2, §6).
const CELL_SIZE_M: u32 = 73;

/// Runs a bounding-box snapshot query (§4.5).
///
/// # Errors
///
/// Returns [`EngineError::InvalidInput`] if `query.bbox` is degenerate
/// or out of range, or [`EngineError::UpstreamUnavailable`] if the
/// underlying database query fails.
pub async fn snapshot(
    db: &dyn Database,
    harm_weights: &HarmWeightTable,
    query: &SnapshotQuery,
    current_month: Month,
) -> Result<SnapshotResponse, EngineError> {
    query.bbox.validate()?;

    let months = current_month.last_n(query.lookback_months.get());

    let raw_cells = saferoute_database::cells::cells_in_bbox_for_months(db, &query.bbox, &months)
        .await
        .map_err(EngineError::from)?;

    let groups = saferoute_database_models::group_weighted_cells(
        &raw_cells,
        current_month,
        query.time_of_day,
        &saferoute_scoring_models::CategoryOverrides::default(),
        harm_weights,
    );

    let mut cells: Vec<SnapshotCell> = groups.values().map(render_cell).collect();
    // BTreeMap iteration is already lexicographic by h3_index, but make
    // the contract explicit for callers that re-sort (P4 determinism).
    cells.sort_by(|a, b| a.h3_index.cmp(&b.h3_index));

    let summary = summarize(&groups);

    Ok(SnapshotResponse {
        cells,
        summary,
        meta: SnapshotMeta {
            bbox: query.bbox,
            cell_size_m: CELL_SIZE_M,
            grid_type: "h3_hexagonal".to_string(),
            months_included: months.iter().copied().map(Month::yyyymm).collect(),
        },
    })
}

fn render_cell(group: &CellGroup) -> SnapshotCell {
    let w = group.w_group;
    let crime_breakdown = group.stats.iter().filter(|&(_, &count)| count > 0).map(|(&c, &n)| (c, n)).collect();

    SnapshotCell {
        h3_index: group.h3_index.clone(),
        geom: group.geom.clone(),
        crime_count_total: group.crime_count_total,
        risk_score: round_to(risk(w), 3),
        safety_score: safety_score(w),
        risk_class: risk_class(w),
        crime_breakdown,
    }
}

/// §4.5 step 5: cell count, raw crime total, mean safety, and the
/// argmax/argmin `h3_index` over risk, ties broken lexicographically.
fn summarize(groups: &BTreeMap<String, CellGroup>) -> SnapshotSummary {
    let cell_count = groups.len();
    let total_crime_count: u64 = groups.values().map(|g| u64::from(g.crime_count_total)).sum();

    let mean_safety_score = if cell_count == 0 {
        100.0
    } else {
        let sum: f64 = groups.values().map(|g| safety_score(g.w_group)).sum();
        round_to(sum / cell_count as f64, 1)
    };

    // BTreeMap iterates in h3_index order, so the first extremum found
    // while scanning in order is automatically the lexicographically
    // smallest h3_index among ties.
    let mut highest_risk_h3: Option<(String, f64)> = None;
    let mut lowest_risk_h3: Option<(String, f64)> = None;
    for group in groups.values() {
        let r = risk(group.w_group);
        if highest_risk_h3.as_ref().is_none_or(|(_, best)| r > *best) {
            highest_risk_h3 = Some((group.h3_index.clone(), r));
        }
        if lowest_risk_h3.as_ref().is_none_or(|(_, best)| r < *best) {
            lowest_risk_h3 = Some((group.h3_index.clone(), r));
        }
    }

    SnapshotSummary {
        cell_count,
        total_crime_count,
        mean_safety_score,
        highest_risk_h3: highest_risk_h3.map(|(h3, _)| h3),
        lowest_risk_h3: lowest_risk_h3.map(|(h3, _)| h3),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap as Map;

    use saferoute_database_models::grouping::CellGroup;

    use super::*;

    fn group(h3: &str, w: f64) -> CellGroup {
        CellGroup {
            h3_index: h3.to_string(),
            geom: vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (0.0, 0.0)],
            crime_count_total: 1,
            w_group: w,
            stats: Map::new(),
        }
    }

    #[test]
    fn scenario_single_cell_single_event() {
        let mut groups = Map::new();
        groups.insert("abc".to_string(), group("abc", 3.0));
        let cell = render_cell(groups.get("abc").unwrap());
        assert!((cell.risk_score - 0.12).abs() < 1e-3);
        assert!((cell.safety_score - 88.0).abs() < 0.1);
    }

    #[test]
    fn summary_picks_lexicographic_tiebreak() {
        let mut groups = Map::new();
        groups.insert("aaa".to_string(), group("aaa", 10.0));
        groups.insert("bbb".to_string(), group("bbb", 10.0));
        let summary = summarize(&groups);
        assert_eq!(summary.highest_risk_h3.as_deref(), Some("aaa"));
        assert_eq!(summary.lowest_risk_h3.as_deref(), Some("aaa"));
    }

    #[test]
    fn summary_on_empty_grid_is_fully_safe() {
        let groups: Map<String, CellGroup> = Map::new();
        let summary = summarize(&groups);
        assert_eq!(summary.cell_count, 0);
        assert!((summary.mean_safety_score - 100.0).abs() < 1e-9);
        assert!(summary.highest_risk_h3.is_none());
    }

    #[test]
    fn crime_breakdown_omits_zero_counts() {
        let mut g = group("abc", 5.0);
        g.stats.insert(CrimeCategory::Burglary, 2);
        g.stats.insert(CrimeCategory::Robbery, 0);
        let cell = render_cell(&g);
        assert_eq!(cell.crime_breakdown.len(), 1);
        assert_eq!(cell.crime_breakdown.get(&CrimeCategory::Burglary), Some(&2));
    }
}
