#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data model for the route scorer (§4.6): polylines, per-segment risk,
//! hotspots, and the scored-route output contract.
//!
//! This crate is pure data — no H3, no spatial index, no database. The
//! segmentation and intersection algorithms live in `saferoute_routing`.

use std::collections::BTreeMap;

use saferoute_database_models::EngineError;
use saferoute_scoring_models::{CategoryOverrides, CrimeCategory, LookbackMonths, RiskClass, TimeOfDay};
use serde::{Deserialize, Serialize};

/// The closed enumeration of travel modes a routing provider candidate
/// was generated for (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    FootWalking,
    CyclingRegular,
}

/// An ordered sequence of `(lon, lat)` vertices, at least two long.
///
/// Validated at construction so that every downstream call site can
/// assume a non-degenerate input (§7: "polyline < 2 points" and "a
/// single pair of identical points" are both `InvalidInput`, recovered
/// at the boundary and never reaching the scorer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polyline(Vec<(f64, f64)>);

impl Polyline {
    /// # Errors
    ///
    /// Returns [`RoutingError::InvalidInput`] if `vertices` has fewer
    /// than two points, or is exactly two identical points (zero-length
    /// degenerate route).
    pub fn new(vertices: Vec<(f64, f64)>) -> Result<Self, RoutingError> {
        if vertices.len() < 2 {
            return Err(RoutingError::InvalidInput(format!(
                "polyline must have at least 2 vertices, got {}",
                vertices.len()
            )));
        }
        if vertices.len() == 2 && vertices[0] == vertices[1] {
            return Err(RoutingError::InvalidInput(
                "polyline endpoints are identical".to_string(),
            ));
        }
        Ok(Self(vertices))
    }

    #[must_use]
    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.0
    }
}

/// A candidate polyline supplied by the external routing provider (§6),
/// with its per-vertex distance/duration metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteCandidate {
    pub polyline: Polyline,
    pub distance_m: f64,
    pub duration_s: f64,
}

/// Query-time preferences for a route-score request (§4.6, §6).
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePreferences {
    pub lookback_months: LookbackMonths,
    pub time_of_day: Option<TimeOfDay>,
    pub category_overrides: CategoryOverrides,
}

impl Default for RoutePreferences {
    fn default() -> Self {
        Self {
            lookback_months: LookbackMonths::DEFAULT,
            time_of_day: None,
            category_overrides: CategoryOverrides::default(),
        }
    }
}

/// A ~100 m slice of a polyline (§4.6 step 1), the scoring atom for
/// routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub index: usize,
    pub start: (f64, f64),
    pub end: (f64, f64),
    pub midpoint: (f64, f64),
    /// Number of cells whose buffered-intersection test passed (§4.6
    /// step 2).
    pub cell_count: usize,
    /// `Σ w_cell_group` across intersecting cells, *before* dividing by
    /// `cell_count` (§4.6 step 3). This is the value hotspot detection
    /// (§4.6 step 5) thresholds against, distinct from the per-segment
    /// mean `risk` used in the route aggregate.
    pub raw_weighted_sum: f64,
    /// `raw_weighted_sum / cell_count`, or `0` if `cell_count == 0`.
    pub risk: f64,
}

/// `high` if a segment's raw weighted sum is in `[50, 100]`, `critical`
/// if `> 100` (§4.6 step 5; the exact boundary is a calibration knob per
/// §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotspotRiskLevel {
    High,
    Critical,
}

impl HotspotRiskLevel {
    /// Threshold above which a segment is reported as a hotspot at all
    /// (§4.6 step 5).
    pub const HOTSPOT_THRESHOLD: f64 = 50.0;
    /// Threshold separating `high` from `critical`.
    pub const CRITICAL_THRESHOLD: f64 = 100.0;

    #[must_use]
    pub const fn from_raw_weighted_sum(w: f64) -> Option<Self> {
        if w > Self::CRITICAL_THRESHOLD {
            Some(Self::Critical)
        } else if w >= Self::HOTSPOT_THRESHOLD {
            Some(Self::High)
        } else {
            None
        }
    }
}

/// A segment flagged for elevated risk (§4.6 step 5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub segment_index: usize,
    pub midpoint: (f64, f64),
    pub risk_level: HotspotRiskLevel,
    pub description: String,
    pub risk_score: f64,
}

/// The full per-candidate scoring output (§4.6 steps 4-6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredRoute {
    pub distance_m: f64,
    pub duration_s: f64,
    pub segments: Vec<Segment>,
    pub hotspots: Vec<Hotspot>,
    /// `mean(segment.risk over all segments)` (§4.6 step 4).
    pub w_route: f64,
    pub risk_score: f64,
    pub safety_score: f64,
    pub risk_class: RiskClass,
    pub crime_breakdown: BTreeMap<CrimeCategory, u32>,
    pub is_recommended: bool,
}

/// Errors raised by route scoring, ahead of composing into
/// [`EngineError`] at the public entry point.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("timed out before any candidate completed")]
    Timeout,
}

impl From<RoutingError> for EngineError {
    fn from(value: RoutingError) -> Self {
        match value {
            RoutingError::InvalidInput(msg) => Self::InvalidInput(msg),
            RoutingError::UpstreamUnavailable(msg) => Self::UpstreamUnavailable(msg),
            RoutingError::Timeout => Self::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polyline_rejects_single_vertex() {
        assert!(Polyline::new(vec![(0.0, 0.0)]).is_err());
    }

    #[test]
    fn polyline_rejects_identical_pair() {
        assert!(Polyline::new(vec![(1.0, 1.0), (1.0, 1.0)]).is_err());
    }

    #[test]
    fn polyline_accepts_two_distinct_points() {
        assert!(Polyline::new(vec![(0.0, 0.0), (0.0, 1.0)]).is_ok());
    }

    #[test]
    fn hotspot_level_thresholds() {
        assert_eq!(HotspotRiskLevel::from_raw_weighted_sum(49.9), None);
        assert_eq!(
            HotspotRiskLevel::from_raw_weighted_sum(50.0),
            Some(HotspotRiskLevel::High)
        );
        assert_eq!(
            HotspotRiskLevel::from_raw_weighted_sum(100.0),
            Some(HotspotRiskLevel::High)
        );
        assert_eq!(
            HotspotRiskLevel::from_raw_weighted_sum(100.1),
            Some(HotspotRiskLevel::Critical)
        );
    }
}
