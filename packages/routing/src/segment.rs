//! Polyline segmentation into ~100 m spans (§4.6 step 1).

use saferoute_routing_models::Polyline;

use crate::geometry::haversine_distance_m;

/// Target length of a scoring segment, in geodesic meters.
pub const TARGET_SEGMENT_LENGTH_M: f64 = 100.0;

/// One slice of a polyline, produced by walking its vertices and cutting
/// a new span every time accumulated geodesic distance crosses
/// [`TARGET_SEGMENT_LENGTH_M`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentSpan {
    pub index: usize,
    pub start: (f64, f64),
    pub end: (f64, f64),
}

impl SegmentSpan {
    #[must_use]
    pub fn midpoint(&self) -> (f64, f64) {
        ((self.start.0 + self.end.0) / 2.0, (self.start.1 + self.end.1) / 2.0)
    }
}

/// Splits `polyline` into spans of approximately [`TARGET_SEGMENT_LENGTH_M`],
/// cutting at the vertex nearest each target distance. Never produces a
/// zero-length span; a final short remainder is absorbed into the last
/// span rather than emitted on its own.
#[must_use]
pub fn segment_polyline(polyline: &Polyline) -> Vec<SegmentSpan> {
    let vertices = polyline.vertices();
    let mut spans = Vec::new();
    let mut span_start_idx = 0usize;
    let mut accumulated_m = 0.0;

    for i in 1..vertices.len() {
        accumulated_m += haversine_distance_m(vertices[i - 1], vertices[i]);

        let is_last_vertex = i == vertices.len() - 1;
        if accumulated_m >= TARGET_SEGMENT_LENGTH_M || is_last_vertex {
            spans.push(SegmentSpan {
                index: spans.len(),
                start: vertices[span_start_idx],
                end: vertices[i],
            });
            span_start_idx = i;
            accumulated_m = 0.0;
        }
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_point_polyline_is_a_single_span() {
        let polyline = Polyline::new(vec![(-1.40, 50.90), (-1.40, 50.901)]).unwrap();
        let spans = segment_polyline(&polyline);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start, (-1.40, 50.90));
    }

    #[test]
    fn long_straight_line_splits_into_multiple_spans() {
        // roughly 1km straight north, should split into several ~100m spans
        let vertices: Vec<(f64, f64)> = (0..=100).map(|i| (-1.40, 50.90 + f64::from(i) * 0.0001)).collect();
        let polyline = Polyline::new(vertices).unwrap();
        let spans = segment_polyline(&polyline);
        assert!(spans.len() > 1);
        for w in spans.windows(2) {
            assert_eq!(w[0].end, w[1].start);
        }
    }

    #[test]
    fn spans_cover_the_whole_polyline() {
        let vertices = vec![(-1.41, 50.90), (-1.405, 50.905), (-1.40, 50.91)];
        let polyline = Polyline::new(vertices.clone()).unwrap();
        let spans = segment_polyline(&polyline);
        assert_eq!(spans.first().unwrap().start, vertices[0]);
        assert_eq!(spans.last().unwrap().end, *vertices.last().unwrap());
    }
}
