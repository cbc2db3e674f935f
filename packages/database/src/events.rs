//! Event store queries (§4.3).
//!
//! Spatial filtering uses raw `PostGIS` SQL via `query_raw_params()`,
//! identically to the rest of the stack. `upsert_events` is idempotent
//! on `external_id` (§4.3, P2): re-ingesting a month must not duplicate
//! rows, and later fields win on conflict.

use moosicbox_json_utils::database::ToValue as _;
use saferoute_database_models::{BoundingBox, CrimeEvent, DescriptiveFields, Month};
use saferoute_scoring_models::CrimeCategory;
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

/// Inserts or updates a batch of events, keyed by `external_id`.
/// Malformed events (missing or non-finite coordinates) are skipped and
/// counted rather than aborting the batch (§4.3, §7).
///
/// Returns `(upserted, skipped)`.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation fails.
pub async fn upsert_events(
    db: &dyn Database,
    events: &[CrimeEvent],
) -> Result<(u64, u64), DbError> {
    let mut upserted = 0u64;
    let mut skipped = 0u64;

    for event in events {
        if !event.lon.is_finite() || !event.lat.is_finite() || event.external_id.is_empty() {
            log::warn!("skipping malformed event: {:?}", event.external_id);
            skipped += 1;
            continue;
        }

        db.exec_raw_params(
            "INSERT INTO crime_events (
                external_id, month, category, location,
                force_id, output_area_code, location_description
            ) VALUES (
                $1, $2, $3,
                ST_SetSRID(ST_MakePoint($4, $5), 4326)::geography,
                $6, $7, $8
            )
            ON CONFLICT (external_id) DO UPDATE SET
                month = EXCLUDED.month,
                category = EXCLUDED.category,
                location = EXCLUDED.location,
                force_id = EXCLUDED.force_id,
                output_area_code = EXCLUDED.output_area_code,
                location_description = EXCLUDED.location_description",
            &[
                DatabaseValue::String(event.external_id.clone()),
                DatabaseValue::String(event.month.iso_date()),
                DatabaseValue::String(event.category.as_ref().to_string()),
                DatabaseValue::Real64(event.lon),
                DatabaseValue::Real64(event.lat),
                opt_string(&event.descriptive_fields.force_id),
                opt_string(&event.descriptive_fields.output_area_code),
                opt_string(&event.descriptive_fields.location_description),
            ],
        )
        .await?;

        upserted += 1;
    }

    Ok((upserted, skipped))
}

/// Streams every event recorded for `month`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn events_in_month(db: &dyn Database, month: Month) -> Result<Vec<CrimeEvent>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT external_id, month, category,
                    ST_X(location::geometry) as lon, ST_Y(location::geometry) as lat,
                    force_id, output_area_code, location_description
             FROM crime_events WHERE month = $1",
            &[DatabaseValue::String(month.iso_date())],
        )
        .await?;

    rows_to_events(&rows)
}

/// Streams every event within `bbox` whose month falls in
/// `[from_month, to_month]` inclusive.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn events_in_bbox_between(
    db: &dyn Database,
    bbox: &BoundingBox,
    from_month: Month,
    to_month: Month,
) -> Result<Vec<CrimeEvent>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT external_id, month, category,
                    ST_X(location::geometry) as lon, ST_Y(location::geometry) as lat,
                    force_id, output_area_code, location_description
             FROM crime_events
             WHERE location && ST_MakeEnvelope($1, $2, $3, $4, 4326)::geography
               AND month BETWEEN $5 AND $6",
            &[
                DatabaseValue::Real64(bbox.west),
                DatabaseValue::Real64(bbox.south),
                DatabaseValue::Real64(bbox.east),
                DatabaseValue::Real64(bbox.north),
                DatabaseValue::String(from_month.iso_date()),
                DatabaseValue::String(to_month.iso_date()),
            ],
        )
        .await?;

    rows_to_events(&rows)
}

fn rows_to_events(rows: &[switchy_database::Row]) -> Result<Vec<CrimeEvent>, DbError> {
    let mut events = Vec::with_capacity(rows.len());

    for row in rows {
        let naive_month: chrono::NaiveDate =
            row.to_value("month").map_err(|e| DbError::Conversion {
                message: format!("failed to read month: {e}"),
            })?;
        let month = Month::new(
            chrono::Datelike::year(&naive_month),
            chrono::Datelike::month(&naive_month),
        )
        .map_err(|e| DbError::Conversion {
            message: format!("unparseable month {naive_month}: {e}"),
        })?;

        let category_name: String = row.to_value("category").unwrap_or_default();
        let category = CrimeCategory::from_feed_slug(&category_name);

        events.push(CrimeEvent {
            external_id: row.to_value("external_id").unwrap_or_default(),
            month,
            category,
            lon: row.to_value("lon").unwrap_or(0.0),
            lat: row.to_value("lat").unwrap_or(0.0),
            descriptive_fields: DescriptiveFields {
                force_id: row.to_value("force_id").unwrap_or(None),
                output_area_code: row.to_value("output_area_code").unwrap_or(None),
                location_description: row.to_value("location_description").unwrap_or(None),
            },
        });
    }

    Ok(events)
}

fn opt_string(value: &Option<String>) -> DatabaseValue {
    value
        .as_ref()
        .map_or(DatabaseValue::Null, |s| DatabaseValue::String(s.clone()))
}

/// Counts malformed rows relative to a batch, surfacing
/// `UpstreamUnavailable` once the malformed share exceeds 10% (§7).
#[must_use]
pub fn exceeds_malformed_threshold(skipped: u64, total: u64) -> bool {
    if total == 0 {
        return false;
    }
    (skipped as f64) / (total as f64) > 0.10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_threshold_is_exclusive_at_ten_percent() {
        assert!(!exceeds_malformed_threshold(10, 100));
        assert!(exceeds_malformed_threshold(11, 100));
        assert!(!exceeds_malformed_threshold(0, 0));
    }
}
