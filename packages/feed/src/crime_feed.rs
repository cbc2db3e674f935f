//! The crime feed collaborator (§6): "monthly batches of point events
//! per bounding-box tile... a function `fetch(year, month, bbox_tiles) ->
//! iterator<CrimeEvent>` with retry on transient HTTP errors and backoff
//! on 429. There is no streaming mode."

use async_trait::async_trait;
use saferoute_database_models::{BoundingBox, CrimeEvent, DescriptiveFields, Month};
use saferoute_scoring_models::CrimeCategory;
use serde::Deserialize;

use crate::{FeedError, retry};

/// Page size requested from the upstream feed per tile.
const PAGE_SIZE: u64 = 10_000;

/// Abstraction over the crime feed, so the aggregator can be tested
/// against an in-memory fake instead of a live HTTP endpoint.
#[async_trait]
pub trait CrimeFeed: Send + Sync {
    /// Fetches every event recorded for `(year, month)` across
    /// `bbox_tiles`, deduplicating by `external_id` across tiles.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Upstream`] if the feed is unreachable after
    /// retry.
    async fn fetch(
        &self,
        year: i32,
        month: u32,
        bbox_tiles: &[BoundingBox],
    ) -> Result<Vec<CrimeEvent>, FeedError>;
}

/// An HTTP-backed [`CrimeFeed`] against a paginated JSON API, offset
/// pagination, one page request per tile per offset.
pub struct HttpCrimeFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCrimeFeed {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CrimeFeed for HttpCrimeFeed {
    async fn fetch(
        &self,
        year: i32,
        month: u32,
        bbox_tiles: &[BoundingBox],
    ) -> Result<Vec<CrimeEvent>, FeedError> {
        let target_month = Month::new(year, month)
            .map_err(|e| FeedError::Malformed(format!("invalid year/month: {e}")))?;

        let mut events = Vec::new();
        let mut seen_ids = std::collections::HashSet::new();

        for tile in bbox_tiles {
            let mut offset: u64 = 0;
            loop {
                let url = self.base_url.clone();
                let response = retry::send(|| {
                    self.client.get(&url).query(&[
                        ("year", year.to_string()),
                        ("month", month.to_string()),
                        ("min_lon", tile.west.to_string()),
                        ("min_lat", tile.south.to_string()),
                        ("max_lon", tile.east.to_string()),
                        ("max_lat", tile.north.to_string()),
                        ("offset", offset.to_string()),
                        ("limit", PAGE_SIZE.to_string()),
                    ])
                })
                .await?;

                let page: FeedPage = response
                    .json()
                    .await
                    .map_err(|e| FeedError::Malformed(format!("failed to decode page: {e}")))?;

                let count = page.records.len() as u64;
                log::info!(
                    "crime feed: {year}-{month:02} tile=({},{},{},{}) offset={offset} -> {count} records",
                    tile.west, tile.south, tile.east, tile.north
                );

                for record in page.records {
                    if seen_ids.insert(record.external_id.clone()) {
                        events.push(record.into_event(target_month));
                    }
                }

                if !page.has_more || count == 0 {
                    break;
                }
                offset += count;
            }
        }

        Ok(events)
    }
}

#[derive(Debug, Deserialize)]
struct FeedPage {
    records: Vec<FeedRecord>,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct FeedRecord {
    external_id: String,
    category: String,
    lon: f64,
    lat: f64,
    #[serde(default)]
    force_id: Option<String>,
    #[serde(default)]
    output_area_code: Option<String>,
    #[serde(default)]
    location_description: Option<String>,
}

impl FeedRecord {
    /// Normalizes the feed-supplied category slug (§3 I5: unknown
    /// categories map to `other` before aggregation).
    fn into_event(self, month: Month) -> CrimeEvent {
        CrimeEvent {
            external_id: self.external_id,
            month,
            category: CrimeCategory::from_feed_slug(&self.category),
            lon: self.lon,
            lat: self.lat,
            descriptive_fields: DescriptiveFields {
                force_id: self.force_id,
                output_area_code: self.output_area_code,
                location_description: self.location_description,
            },
        }
    }
}
