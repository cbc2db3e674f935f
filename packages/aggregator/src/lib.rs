#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The Aggregator (§4.4): folds events into `(cell, month)` buckets and
//! upserts `SafetyCell` rows. Two operations, both idempotent and both
//! bumping the cache-invalidation version counter on success (§4.7):
//!
//! - [`rebuild::rebuild`] — deterministic rebuild over the last `N`
//!   months from whatever is already in the Event Store.
//! - [`ingest::ingest_month`] — fetch one month from the crime feed,
//!   upsert it, then re-aggregate that month only.

pub mod fold;
pub mod ingest;
pub mod rebuild;

use saferoute_database_models::EngineError;

pub use ingest::IngestReport;
pub use rebuild::RebuildReport;

/// Errors raised by the aggregator, ahead of composing into
/// [`EngineError`] at the public entry point.
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("busy: {0}")]
    Busy(String),

    #[error(transparent)]
    Database(#[from] saferoute_database::DbError),

    #[error(transparent)]
    Grid(#[from] saferoute_grid::GridError),

    #[error(transparent)]
    Feed(#[from] saferoute_feed::FeedError),

    /// More than 10% of an ingested batch was malformed (§7); `sample`
    /// holds a handful of the skipped `external_id`s for diagnostics.
    #[error("{skipped}/{total} events malformed (sample: {sample:?})")]
    TooManyMalformed {
        skipped: u64,
        total: u64,
        sample: Vec<String>,
    },
}

impl From<AggregatorError> for EngineError {
    fn from(value: AggregatorError) -> Self {
        match value {
            AggregatorError::Busy(msg) => Self::Busy(msg),
            other => Self::UpstreamUnavailable(other.to_string()),
        }
    }
}
