//! The routing provider collaborator (§6): "given `origin`,
//! `destination`, `mode`, returns 1..N candidate polylines with
//! per-vertex distances and turn-by-turn instructions. The engine treats
//! this as a black box and forwards errors as `UpstreamUnavailable`."
//!
//! Turn-by-turn instructions are opaque to scoring and are dropped at
//! this boundary; only the polyline and its aggregate distance/duration
//! survive into [`RouteCandidate`].

use async_trait::async_trait;
use saferoute_routing_models::{Mode, Polyline, RouteCandidate};
use serde::Deserialize;

use crate::{FeedError, retry};

/// Abstraction over the routing provider, so the route scorer can be
/// tested against an in-memory fake instead of a live HTTP endpoint.
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Requests candidate polylines for `origin -> destination` under
    /// `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Upstream`] if the provider is unreachable
    /// after retry, or [`FeedError::Malformed`] if a returned candidate
    /// is degenerate (§7 forwards this as `InvalidInput`, not
    /// `UpstreamUnavailable` — the provider returned a response, just a
    /// bad one).
    async fn get_routes(
        &self,
        origin: (f64, f64),
        destination: (f64, f64),
        mode: Mode,
    ) -> Result<Vec<RouteCandidate>, FeedError>;
}

/// An HTTP-backed [`RoutingProvider`].
pub struct HttpRoutingProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRoutingProvider {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RoutingProvider for HttpRoutingProvider {
    async fn get_routes(
        &self,
        origin: (f64, f64),
        destination: (f64, f64),
        mode: Mode,
    ) -> Result<Vec<RouteCandidate>, FeedError> {
        let mode_param = match mode {
            Mode::FootWalking => "foot-walking",
            Mode::CyclingRegular => "cycling-regular",
        };

        let url = self.base_url.clone();
        let response = retry::send(|| {
            self.client.get(&url).query(&[
                ("origin_lon", origin.0.to_string()),
                ("origin_lat", origin.1.to_string()),
                ("dest_lon", destination.0.to_string()),
                ("dest_lat", destination.1.to_string()),
                ("mode", mode_param.to_string()),
            ])
        })
        .await?;

        let payload: ProviderResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Malformed(format!("failed to decode routes: {e}")))?;

        payload
            .routes
            .into_iter()
            .map(ProviderRoute::into_candidate)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    routes: Vec<ProviderRoute>,
}

#[derive(Debug, Deserialize)]
struct ProviderRoute {
    /// `[lon, lat]` pairs.
    geometry: Vec<[f64; 2]>,
    distance_m: f64,
    duration_s: f64,
}

impl ProviderRoute {
    fn into_candidate(self) -> Result<RouteCandidate, FeedError> {
        let vertices = self.geometry.into_iter().map(|[lon, lat]| (lon, lat)).collect();
        let polyline =
            Polyline::new(vertices).map_err(|e| FeedError::Malformed(e.to_string()))?;

        Ok(RouteCandidate {
            polyline,
            distance_m: self.distance_m,
            duration_s: self.duration_s,
        })
    }
}
