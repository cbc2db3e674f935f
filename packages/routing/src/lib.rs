#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The Route Scorer (§4.6): segments a candidate polyline, finds the
//! grid cells intersecting each segment, and aggregates per-segment risk
//! into a route-level safety score, hotspot list, and recommendation
//! flag.
//!
//! The cell-weighting fold itself is shared with the Snapshot Service
//! via `saferoute_database_models::grouping` (§4.1, §9); this crate only
//! adds the geometry (segmentation, spatial intersection) and the
//! route-level aggregation.

pub mod batch;
pub mod geometry;
pub mod index;
pub mod scorer;
pub mod segment;

pub use batch::score_batch;
pub use index::RouteIndex;
pub use scorer::{SEGMENT_BUFFER_M, mark_recommended, score_candidate};
pub use segment::{SegmentSpan, TARGET_SEGMENT_LENGTH_M, segment_polyline};
