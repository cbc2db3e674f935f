//! Environment-driven engine configuration (§6), following the same
//! "env var with a sensible local default" idiom as
//! `crime_map_database::db::connect_from_env`.

use std::time::Duration;

use saferoute_scoring_models::LookbackMonths;

use crate::BoundingBox;

/// Default operational bounding box: Southampton, UK and its immediate
/// surroundings, matching the source crime feed's coverage area.
const DEFAULT_BBOX: BoundingBox = BoundingBox::new(-1.55, 50.85, -1.30, 50.98);

/// Startup-loaded, environment-driven configuration for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// The operational bounding box; snapshot and route queries outside
    /// it always resolve to zero intersecting cells.
    pub operational_bbox: BoundingBox,
    /// Default `lookback_months` when a caller omits it.
    pub default_lookback: LookbackMonths,
    /// Cache TTL (§4.7 default: 15 minutes).
    pub cache_ttl: Duration,
    /// Hard deadline for a route-scoring batch (§5 default: 5 seconds).
    pub route_score_deadline: Duration,
    /// Path to an optional harm-weight override file. `None` uses the
    /// calibrated defaults in `saferoute_scoring_models`.
    pub harm_weight_table_path: Option<String>,
}

impl EngineConfig {
    /// Loads configuration from the environment, falling back to
    /// calibrated defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            operational_bbox: env_bbox("SAFEROUTE_OPERATIONAL_BBOX").unwrap_or(DEFAULT_BBOX),
            default_lookback: env_lookback("SAFEROUTE_DEFAULT_LOOKBACK_MONTHS")
                .unwrap_or(LookbackMonths::DEFAULT),
            cache_ttl: env_duration_secs("SAFEROUTE_CACHE_TTL_SECONDS")
                .unwrap_or(Duration::from_secs(15 * 60)),
            route_score_deadline: env_duration_millis("SAFEROUTE_ROUTE_SCORE_DEADLINE_MS")
                .unwrap_or(Duration::from_secs(5)),
            harm_weight_table_path: std::env::var("SAFEROUTE_HARM_WEIGHT_TABLE_PATH").ok(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operational_bbox: DEFAULT_BBOX,
            default_lookback: LookbackMonths::DEFAULT,
            cache_ttl: Duration::from_secs(15 * 60),
            route_score_deadline: Duration::from_secs(5),
            harm_weight_table_path: None,
        }
    }
}

fn env_bbox(key: &str) -> Option<BoundingBox> {
    let raw = std::env::var(key).ok()?;
    let parts: Vec<f64> = raw.split(',').filter_map(|p| p.trim().parse().ok()).collect();
    if let [west, south, east, north] = parts[..] {
        let bbox = BoundingBox::new(west, south, east, north);
        if bbox.validate().is_ok() {
            return Some(bbox);
        }
    }
    log::warn!("ignoring malformed {key}: {raw}");
    None
}

fn env_lookback(key: &str) -> Option<LookbackMonths> {
    let raw = std::env::var(key).ok()?;
    let value: u8 = raw.parse().ok()?;
    LookbackMonths::new(value).ok()
}

fn env_duration_secs(key: &str) -> Option<Duration> {
    std::env::var(key).ok()?.parse().ok().map(Duration::from_secs)
}

fn env_duration_millis(key: &str) -> Option<Duration> {
    std::env::var(key).ok()?.parse().ok().map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert!(config.operational_bbox.validate().is_ok());
        assert_eq!(config.default_lookback.get(), 12);
        assert_eq!(config.cache_ttl, Duration::from_secs(900));
        assert_eq!(config.route_score_deadline, Duration::from_secs(5));
    }
}
