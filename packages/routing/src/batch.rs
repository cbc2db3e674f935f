//! Deadline-bounded scoring of a batch of route candidates (§5): cancels
//! outstanding candidates once the deadline elapses, returning whatever
//! scored so far, or `Timeout` if nothing completed in time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use saferoute_database_models::grouping::CellGroup;
use saferoute_database_models::{BoundingBox, Month};
use saferoute_routing_models::{RouteCandidate, RoutePreferences, RoutingError, ScoredRoute};
use saferoute_scoring_models::HarmWeightTable;
use switchy_database::Database;
use tokio::task::JoinSet;

use crate::index::RouteIndex;
use crate::scorer::{mark_recommended, score_candidate};

/// Padding added around the candidates' combined bounding box before
/// fetching grid cells, so segments near the edge of the tightest bbox
/// still see every intersecting cell (§4.6 step 2's buffer plus margin).
const BBOX_PADDING_M: f64 = 200.0;

/// Scores every candidate in `candidates` against the safety grid,
/// returning as many [`ScoredRoute`]s as completed within
/// `per_batch_deadline` of being called.
///
/// Fetches grid cells once for the union of all candidates' bounding
/// boxes, then scores each candidate independently in its own task so a
/// slow candidate cannot block the others; unfinished tasks are aborted
/// once the deadline elapses (§5).
///
/// # Errors
///
/// Returns [`RoutingError::InvalidInput`] if `candidates` is empty,
/// [`RoutingError::UpstreamUnavailable`] if the grid query fails, or
/// [`RoutingError::Timeout`] if the deadline elapses before any
/// candidate finishes scoring.
pub async fn score_batch(
    db: &dyn Database,
    harm_weights: &HarmWeightTable,
    candidates: Vec<RouteCandidate>,
    preferences: &RoutePreferences,
    current_month: Month,
    per_batch_deadline: Duration,
) -> Result<Vec<ScoredRoute>, RoutingError> {
    if candidates.is_empty() {
        return Err(RoutingError::InvalidInput("no route candidates supplied".to_string()));
    }

    let bbox = union_bbox(&candidates)?;
    let months = current_month.last_n(preferences.lookback_months.get());

    let raw_cells = saferoute_database::cells::cells_in_bbox_for_months(db, &bbox, &months)
        .await
        .map_err(|e| RoutingError::UpstreamUnavailable(e.to_string()))?;

    let groups = Arc::new(saferoute_database_models::group_weighted_cells(
        &raw_cells,
        current_month,
        preferences.time_of_day,
        &preferences.category_overrides,
        harm_weights,
    ));
    let group_refs: Vec<&CellGroup> = groups.values().collect();
    let index = Arc::new(RouteIndex::build(&group_refs));

    let deadline = Instant::now() + per_batch_deadline;
    let mut set = JoinSet::new();
    for (position, candidate) in candidates.into_iter().enumerate() {
        let index = Arc::clone(&index);
        let groups = Arc::clone(&groups);
        set.spawn(async move { (position, score_candidate(&candidate, &index, &groups)) });
    }

    let mut scored: Vec<(usize, ScoredRoute)> = Vec::new();
    while !set.is_empty() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, set.join_next()).await {
            Ok(Some(Ok(result))) => scored.push(result),
            Ok(Some(Err(join_err))) => {
                log::warn!("route scoring task failed: {join_err}");
            }
            Ok(None) | Err(_) => break,
        }
    }
    // Dropping `set` here aborts every still-running task (§5).

    if scored.is_empty() {
        return Err(RoutingError::Timeout);
    }

    scored.sort_by_key(|(position, _)| *position);
    let mut routes: Vec<ScoredRoute> = scored.into_iter().map(|(_, route)| route).collect();
    mark_recommended(&mut routes);
    Ok(routes)
}

fn union_bbox(candidates: &[RouteCandidate]) -> Result<BoundingBox, RoutingError> {
    let mut west = f64::MAX;
    let mut south = f64::MAX;
    let mut east = f64::MIN;
    let mut north = f64::MIN;

    for candidate in candidates {
        for &(lon, lat) in candidate.polyline.vertices() {
            west = west.min(lon);
            south = south.min(lat);
            east = east.max(lon);
            north = north.max(lat);
        }
    }

    let center_lat = (south + north) / 2.0;
    let (lon_pad, lat_pad) = crate::geometry::meters_to_degree_padding(BBOX_PADDING_M, center_lat);

    let bbox = BoundingBox::new(west - lon_pad, south - lat_pad, east + lon_pad, north + lat_pad);
    bbox.validate().map_err(|e| RoutingError::InvalidInput(e.to_string()))?;
    Ok(bbox)
}

#[cfg(test)]
mod tests {
    use saferoute_routing_models::Polyline;

    use super::*;

    fn candidate(vertices: Vec<(f64, f64)>) -> RouteCandidate {
        RouteCandidate { polyline: Polyline::new(vertices).unwrap(), distance_m: 500.0, duration_s: 400.0 }
    }

    #[test]
    fn union_bbox_covers_every_candidate_with_padding() {
        let candidates = vec![
            candidate(vec![(-1.41, 50.90), (-1.40, 50.905)]),
            candidate(vec![(-1.39, 50.91), (-1.38, 50.915)]),
        ];
        let bbox = union_bbox(&candidates).unwrap();
        assert!(bbox.west < -1.41);
        assert!(bbox.east > -1.38);
        assert!(bbox.south < 50.90);
        assert!(bbox.north > 50.915);
    }
}
