//! In-process R-tree index over a query's safety cells, used to find the
//! handful of cells each segment needs to test against (§4.6 step 2).
//!
//! Grounded in the boundary-attribution R-tree pattern used for census
//! tract/place lookups: an envelope-tagged entry type plus
//! `locate_in_envelope_intersecting`, rather than walking every cell for
//! every segment.

use rstar::{AABB, RTree, RTreeObject};
use saferoute_database_models::grouping::CellGroup;

use crate::geometry::meters_to_degree_padding;

/// One grid cell, tagged with its envelope for R-tree storage.
struct CellEntry {
    h3_index: String,
    envelope: AABB<[f64; 2]>,
    ring: Vec<(f64, f64)>,
}

impl RTreeObject for CellEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn ring_envelope(ring: &[(f64, f64)]) -> AABB<[f64; 2]> {
    let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
    let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
    for &(x, y) in ring {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    AABB::from_corners([min_x, min_y], [max_x, max_y])
}

/// A spatial index over the `CellGroup`s in scope for one route-scoring
/// query, keyed by the grouped (already recency-/tod-weighted) value per
/// `h3_index` rather than raw per-month cells.
pub struct RouteIndex {
    tree: RTree<CellEntry>,
}

impl RouteIndex {
    /// Builds an index over `groups` (the output of
    /// `saferoute_database_models::group_weighted_cells`).
    #[must_use]
    pub fn build(groups: &[&CellGroup]) -> Self {
        let entries = groups
            .iter()
            .map(|group| CellEntry {
                h3_index: group.h3_index.clone(),
                envelope: ring_envelope(&group.geom),
                ring: group.geom.clone(),
            })
            .collect();
        Self { tree: RTree::bulk_load(entries) }
    }

    /// Returns the `h3_index` of every cell whose geometry, buffered by
    /// `buffer_m`, intersects the segment `start`-`end` (§4.6 step 2).
    #[must_use]
    pub fn cells_for_segment(&self, start: (f64, f64), end: (f64, f64), buffer_m: f64) -> Vec<&str> {
        let (lon_pad, lat_pad) = meters_to_degree_padding(buffer_m, start.1);
        let query_env = AABB::from_corners(
            [start.0.min(end.0) - lon_pad, start.1.min(end.1) - lat_pad],
            [start.0.max(end.0) + lon_pad, start.1.max(end.1) + lat_pad],
        );

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| crate::geometry::segment_intersects_ring(start, end, &entry.ring, buffer_m))
            .map(|entry| entry.h3_index.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn group(h3: &str, ring: Vec<(f64, f64)>) -> CellGroup {
        CellGroup {
            h3_index: h3.to_string(),
            geom: ring,
            crime_count_total: 1,
            w_group: 5.0,
            stats: BTreeMap::new(),
        }
    }

    #[test]
    fn finds_cell_the_segment_passes_through() {
        let ring = vec![(-1.41, 50.90), (-1.39, 50.90), (-1.39, 50.92), (-1.41, 50.92), (-1.41, 50.90)];
        let g = group("abc", ring);
        let index = RouteIndex::build(&[&g]);
        let hits = index.cells_for_segment((-1.40, 50.905), (-1.40, 50.906), 50.0);
        assert_eq!(hits, vec!["abc"]);
    }

    #[test]
    fn ignores_cell_far_from_the_segment() {
        let ring = vec![(-1.41, 50.90), (-1.39, 50.90), (-1.39, 50.92), (-1.41, 50.92), (-1.41, 50.90)];
        let g = group("abc", ring);
        let index = RouteIndex::build(&[&g]);
        let hits = index.cells_for_segment((10.0, 10.0), (10.01, 10.01), 50.0);
        assert!(hits.is_empty());
    }
}
