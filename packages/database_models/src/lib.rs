#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared data model types (`CrimeEvent`, `SafetyCell`, query parameters)
//! and the cross-cutting [`EngineError`] taxonomy (§7) that every public
//! entry point ultimately returns.

pub mod config;
pub mod error;
pub mod grouping;

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use saferoute_scoring_models::CrimeCategory;
use serde::{Deserialize, Serialize};

pub use config::EngineConfig;
pub use error::EngineError;
pub use grouping::{CellGroup, group_weighted_cells, parse_time_of_day};

/// A WGS84 bounding box, `(min_lon, min_lat, max_lon, max_lat)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self { west, south, east, north }
    }

    /// Rejects degenerate or out-of-range boxes at the request boundary
    /// (§7: `InvalidInput` — "bbox degenerate").
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if the box has zero or
    /// negative area, or any coordinate is outside the WGS84 range.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(-180.0..=180.0).contains(&self.west) || !(-180.0..=180.0).contains(&self.east) {
            return Err(EngineError::InvalidInput(format!(
                "longitude out of range: west={}, east={}",
                self.west, self.east
            )));
        }
        if !(-90.0..=90.0).contains(&self.south) || !(-90.0..=90.0).contains(&self.north) {
            return Err(EngineError::InvalidInput(format!(
                "latitude out of range: south={}, north={}",
                self.south, self.north
            )));
        }
        if self.west >= self.east || self.south >= self.north {
            return Err(EngineError::InvalidInput(format!(
                "degenerate bounding box: west={}, south={}, east={}, north={}",
                self.west, self.south, self.east, self.north
            )));
        }
        Ok(())
    }

    #[must_use]
    pub const fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }
}

/// A first-of-month calendar month. The unit of temporal aggregation
/// throughout the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month(NaiveDate);

impl Month {
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if `month` is not in `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self, EngineError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(|| EngineError::InvalidInput(format!("invalid year/month: {year}-{month}")))
    }

    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(NaiveDate::from_ymd_opt(dt.year(), dt.month(), 1).unwrap_or(dt.date_naive()))
    }

    #[must_use]
    pub const fn year(self) -> i32 {
        self.0.year()
    }

    #[must_use]
    pub const fn month(self) -> u32 {
        self.0.month()
    }

    /// Renders as `YYYYMM`, the suffix used in [`crate::SafetyCell::cell_id`].
    #[must_use]
    pub fn yyyymm(self) -> String {
        format!("{:04}{:02}", self.year(), self.month())
    }

    /// Renders as an ISO `YYYY-MM-01` date, the representation used in
    /// the `DATE`-typed `month` database column.
    #[must_use]
    pub fn iso_date(self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    /// Number of whole months between `self` and `current` (positive if
    /// `self` is before `current`).
    #[must_use]
    pub const fn months_ago(self, current: Self) -> i64 {
        let months_self = self.0.year() as i64 * 12 + self.0.month() as i64;
        let months_current = current.0.year() as i64 * 12 + current.0.month() as i64;
        months_current - months_self
    }

    /// The `months` months up to and including `self`, most recent last.
    #[must_use]
    pub fn last_n(self, months: u8) -> Vec<Self> {
        let mut out = Vec::with_capacity(months as usize);
        let mut year = self.year();
        let mut month = self.month();
        for _ in 0..months {
            out.push(Self::new(year, month).unwrap_or(self));
            if month == 1 {
                month = 12;
                year -= 1;
            } else {
                month -= 1;
            }
        }
        out.reverse();
        out
    }
}

impl std::fmt::Display for Month {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.yyyymm())
    }
}

impl TryFrom<String> for Month {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() != 6 {
            return Err(EngineError::InvalidInput(format!("malformed YYYYMM: {value}")));
        }
        let year: i32 = value[0..4]
            .parse()
            .map_err(|_| EngineError::InvalidInput(format!("malformed YYYYMM: {value}")))?;
        let month: u32 = value[4..6]
            .parse()
            .map_err(|_| EngineError::InvalidInput(format!("malformed YYYYMM: {value}")))?;
        Self::new(year, month)
    }
}

impl From<Month> for String {
    fn from(value: Month) -> Self {
        value.yyyymm()
    }
}

/// Opaque, scoring-irrelevant fields carried through from the feed for
/// display purposes only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptiveFields {
    pub force_id: Option<String>,
    pub output_area_code: Option<String>,
    pub location_description: Option<String>,
}

/// An immutable past incident (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrimeEvent {
    pub external_id: String,
    pub month: Month,
    pub category: CrimeCategory,
    pub lon: f64,
    pub lat: f64,
    #[serde(default)]
    pub descriptive_fields: DescriptiveFields,
}

/// A `(spatial, temporal)` aggregate bucket — the unit on which all
/// reads operate (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyCell {
    pub cell_id: String,
    pub h3_index: String,
    pub month: Month,
    pub crime_count_total: u32,
    pub crime_count_weighted: f64,
    pub stats: BTreeMap<CrimeCategory, u32>,
    /// Closed polygon ring, `(lon, lat)` pairs, first == last.
    pub geom: Vec<(f64, f64)>,
    pub updated_at: DateTime<Utc>,
}

impl SafetyCell {
    #[must_use]
    pub fn cell_id_for(h3_index: &str, month: Month) -> String {
        format!("{h3_index}_{}", month.yyyymm())
    }

    /// Checks invariants I1/I2 against a harm weight table.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Inconsistent`] if `crime_count_total`
    /// disagrees with the sum of `stats`, or if `crime_count_weighted`
    /// disagrees with the harm-weighted sum beyond float tolerance.
    pub fn check_invariants(
        &self,
        harm_weights: &saferoute_scoring_models::HarmWeightTable,
    ) -> Result<(), EngineError> {
        let stats_total: u32 = self.stats.values().sum();
        if stats_total != self.crime_count_total {
            return Err(EngineError::Inconsistent(format!(
                "cell {}: crime_count_total={} but stats sum to {stats_total}",
                self.cell_id, self.crime_count_total
            )));
        }

        let expected_weighted: f64 = self
            .stats
            .iter()
            .map(|(&category, &count)| harm_weights.get(category) * f64::from(count))
            .sum();
        if (expected_weighted - self.crime_count_weighted).abs() >= 1e-6 {
            return Err(EngineError::Inconsistent(format!(
                "cell {}: crime_count_weighted={} but expected {expected_weighted}",
                self.cell_id, self.crime_count_weighted
            )));
        }

        Ok(())
    }
}
