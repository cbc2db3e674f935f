//! Per-segment and per-route risk aggregation (§4.6 steps 2-6).

use std::collections::{BTreeMap, BTreeSet};

use saferoute_database_models::grouping::CellGroup;
use saferoute_routing_models::{Hotspot, HotspotRiskLevel, RouteCandidate, ScoredRoute, Segment};
use saferoute_scoring_models::{CrimeCategory, risk, risk_class, safety_score};

use crate::index::RouteIndex;
use crate::segment::segment_polyline;

/// Buffer distance, in meters, used when testing whether a cell's
/// geometry intersects a segment (§4.6 step 2).
pub const SEGMENT_BUFFER_M: f64 = 50.0;

/// Scores one route candidate against an already-built [`RouteIndex`]
/// (§4.6 steps 1-6). `groups` must be the same map the index was built
/// from, keyed by `h3_index`.
#[must_use]
pub fn score_candidate(
    candidate: &RouteCandidate,
    index: &RouteIndex,
    groups: &BTreeMap<String, CellGroup>,
) -> ScoredRoute {
    let spans = segment_polyline(&candidate.polyline);
    let mut touched_h3: BTreeSet<String> = BTreeSet::new();
    let mut segments = Vec::with_capacity(spans.len());
    let mut hotspots = Vec::new();

    for span in &spans {
        let hits = index.cells_for_segment(span.start, span.end, SEGMENT_BUFFER_M);
        let raw_weighted_sum: f64 = hits.iter().filter_map(|h3| groups.get(*h3)).map(|g| g.w_group).sum();
        let cell_count = hits.len();
        let segment_risk = if cell_count > 0 { raw_weighted_sum / cell_count as f64 } else { 0.0 };

        for h3 in &hits {
            touched_h3.insert((*h3).to_string());
        }

        if let Some(level) = HotspotRiskLevel::from_raw_weighted_sum(raw_weighted_sum) {
            hotspots.push(Hotspot {
                segment_index: span.index,
                midpoint: span.midpoint(),
                risk_level: level,
                description: hotspot_description(level, cell_count),
                risk_score: round_to(risk(raw_weighted_sum), 3),
            });
        }

        segments.push(Segment {
            index: span.index,
            start: span.start,
            end: span.end,
            midpoint: span.midpoint(),
            cell_count,
            raw_weighted_sum,
            risk: segment_risk,
        });
    }

    let w_route = if segments.is_empty() {
        0.0
    } else {
        segments.iter().map(|s| s.risk).sum::<f64>() / segments.len() as f64
    };

    let crime_breakdown = merge_crime_breakdown(&touched_h3, groups);

    ScoredRoute {
        distance_m: candidate.distance_m,
        duration_s: candidate.duration_s,
        segments,
        hotspots,
        w_route,
        risk_score: round_to(risk(w_route), 3),
        safety_score: safety_score(w_route),
        risk_class: risk_class(w_route),
        crime_breakdown,
        is_recommended: false,
    }
}

fn merge_crime_breakdown(touched_h3: &BTreeSet<String>, groups: &BTreeMap<String, CellGroup>) -> BTreeMap<CrimeCategory, u32> {
    let mut out: BTreeMap<CrimeCategory, u32> = BTreeMap::new();
    for h3 in touched_h3 {
        let Some(group) = groups.get(h3) else { continue };
        for (&category, &count) in &group.stats {
            if count > 0 {
                *out.entry(category).or_insert(0) += count;
            }
        }
    }
    out
}

fn hotspot_description(level: HotspotRiskLevel, cell_count: usize) -> String {
    match level {
        HotspotRiskLevel::High => format!("elevated crime risk across {cell_count} nearby cell(s)"),
        HotspotRiskLevel::Critical => format!("critical crime risk across {cell_count} nearby cell(s)"),
    }
}

/// Flags the single safest candidate among `routes` as recommended
/// (§4.6 step 4): highest `safety_score`, ties broken by shorter
/// distance, then shorter duration.
pub fn mark_recommended(routes: &mut [ScoredRoute]) {
    let Some(best_index) = (0..routes.len()).reduce(|best, i| if is_better(&routes[i], &routes[best]) { i } else { best })
    else {
        return;
    };

    for (i, route) in routes.iter_mut().enumerate() {
        route.is_recommended = i == best_index;
    }
}

fn is_better(candidate: &ScoredRoute, current_best: &ScoredRoute) -> bool {
    match candidate.safety_score.partial_cmp(&current_best.safety_score) {
        Some(std::cmp::Ordering::Greater) => true,
        Some(std::cmp::Ordering::Less) | None => false,
        Some(std::cmp::Ordering::Equal) => match candidate.distance_m.partial_cmp(&current_best.distance_m) {
            Some(std::cmp::Ordering::Less) => true,
            Some(std::cmp::Ordering::Greater) | None => false,
            Some(std::cmp::Ordering::Equal) => {
                matches!(candidate.duration_s.partial_cmp(&current_best.duration_s), Some(std::cmp::Ordering::Less))
            }
        },
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use saferoute_routing_models::{Mode, Polyline};

    use super::*;

    fn candidate(vertices: Vec<(f64, f64)>) -> RouteCandidate {
        RouteCandidate {
            polyline: Polyline::new(vertices).unwrap(),
            distance_m: 500.0,
            duration_s: 400.0,
        }
    }

    fn group(h3: &str, ring: Vec<(f64, f64)>, w: f64, category: CrimeCategory, count: u32) -> CellGroup {
        let mut stats = BTreeMap::new();
        stats.insert(category, count);
        CellGroup { h3_index: h3.to_string(), geom: ring, crime_count_total: count, w_group: w, stats }
    }

    #[test]
    fn route_with_no_nearby_cells_is_fully_safe() {
        let route = candidate(vec![(10.0, 10.0), (10.01, 10.01)]);
        let groups: BTreeMap<String, CellGroup> = BTreeMap::new();
        let index = RouteIndex::build(&[]);
        let scored = score_candidate(&route, &index, &groups);
        assert!((scored.safety_score - 100.0).abs() < 1e-9);
        assert!(scored.hotspots.is_empty());
    }

    #[test]
    fn route_through_a_hot_cell_flags_a_hotspot() {
        let ring = vec![(-1.41, 50.90), (-1.39, 50.90), (-1.39, 50.92), (-1.41, 50.92), (-1.41, 50.90)];
        let g = group("abc", ring, 80.0, CrimeCategory::ViolentCrime, 5);
        let mut groups = BTreeMap::new();
        groups.insert("abc".to_string(), g.clone());
        let index = RouteIndex::build(&[&g]);

        let route = candidate(vec![(-1.40, 50.905), (-1.40, 50.906)]);
        let scored = score_candidate(&route, &index, &groups);
        assert_eq!(scored.hotspots.len(), 1);
        assert_eq!(scored.hotspots[0].risk_level, HotspotRiskLevel::High);
        assert_eq!(scored.crime_breakdown.get(&CrimeCategory::ViolentCrime), Some(&5));
    }

    #[test]
    fn mark_recommended_prefers_higher_safety_then_shorter_distance() {
        let mut routes = vec![
            ScoredRoute {
                distance_m: 1000.0,
                duration_s: 800.0,
                segments: vec![],
                hotspots: vec![],
                w_route: 0.0,
                risk_score: 0.0,
                safety_score: 90.0,
                risk_class: risk_class(0.0),
                crime_breakdown: BTreeMap::new(),
                is_recommended: false,
            },
            ScoredRoute {
                distance_m: 500.0,
                duration_s: 400.0,
                segments: vec![],
                hotspots: vec![],
                w_route: 0.0,
                risk_score: 0.0,
                safety_score: 95.0,
                risk_class: risk_class(0.0),
                crime_breakdown: BTreeMap::new(),
                is_recommended: false,
            },
        ];
        mark_recommended(&mut routes);
        assert!(!routes[0].is_recommended);
        assert!(routes[1].is_recommended);
    }
}
