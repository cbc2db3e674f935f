#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Clients for the two external collaborators named in §6: the
//! paginated crime feed (inbound, pull) and the third-party
//! geocoded-routing provider (inbound, request/response).
//!
//! Both are treated as black boxes: the engine only assumes their
//! documented shape (monthly point-event pages; candidate polylines for
//! an origin/destination/mode) and forwards any failure after retry as
//! [`EngineError::UpstreamUnavailable`].

pub mod crime_feed;
pub mod retry;
pub mod routing_provider;

pub use crime_feed::{CrimeFeed, HttpCrimeFeed};
pub use routing_provider::{HttpRoutingProvider, RoutingProvider};
use saferoute_database_models::EngineError;

/// Errors raised by the feed/provider clients, ahead of composing into
/// [`EngineError`] at the public entry point.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeedError {
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<FeedError> for EngineError {
    fn from(value: FeedError) -> Self {
        Self::UpstreamUnavailable(value.to_string())
    }
}
