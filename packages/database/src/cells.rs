//! `SafetyCell` persistence (§4.4 step 3, §5).
//!
//! Cells are upserted per `(h3_index, month)`, one `upsert_cell` call at
//! a time — a rebuild or ingest in progress does not hold a transaction
//! across a whole month, so a concurrent reader can observe a
//! partially-updated month. §5 allows closing this gap with either a
//! per-month transaction around the upsert loop or a version column
//! reads filter on; neither is implemented here yet, so callers that
//! need point-in-time consistency should serialize against
//! `saferoute_database::locks` themselves.

use std::fmt::Write as _;

use moosicbox_json_utils::database::ToValue as _;
use saferoute_database_models::{BoundingBox, Month, SafetyCell};
use saferoute_scoring_models::CrimeCategory;
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

/// Upserts one `SafetyCell` row, keyed by `cell_id`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn upsert_cell(db: &dyn Database, cell: &SafetyCell) -> Result<(), DbError> {
    let stats_json = serde_json::to_string(&cell.stats).map_err(|e| DbError::Conversion {
        message: format!("failed to serialize stats: {e}"),
    })?;
    let geom_json = serde_json::to_string(&cell.geom).map_err(|e| DbError::Conversion {
        message: format!("failed to serialize geom: {e}"),
    })?;
    let envelope_wkt = polygon_wkt(&cell.geom)?;

    db.exec_raw_params(
        "INSERT INTO safety_cells (
            cell_id, h3_index, month, crime_count_total, crime_count_weighted,
            stats, geom, geom_envelope, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, ST_GeogFromText($8), NOW())
        ON CONFLICT (cell_id) DO UPDATE SET
            crime_count_total = EXCLUDED.crime_count_total,
            crime_count_weighted = EXCLUDED.crime_count_weighted,
            stats = EXCLUDED.stats,
            geom = EXCLUDED.geom,
            geom_envelope = EXCLUDED.geom_envelope,
            updated_at = NOW()",
        &[
            DatabaseValue::String(cell.cell_id.clone()),
            DatabaseValue::String(cell.h3_index.clone()),
            DatabaseValue::String(cell.month.iso_date()),
            DatabaseValue::Int64(i64::from(cell.crime_count_total)),
            DatabaseValue::Real64(cell.crime_count_weighted),
            DatabaseValue::String(stats_json),
            DatabaseValue::String(geom_json),
            DatabaseValue::String(envelope_wkt),
        ],
    )
    .await?;

    Ok(())
}

/// Renders a closed `(lon, lat)` ring as a `POLYGON(...)` WKT string for
/// `ST_GeogFromText`.
fn polygon_wkt(ring: &[(f64, f64)]) -> Result<String, DbError> {
    if ring.len() < 4 {
        return Err(DbError::Conversion {
            message: format!("geom ring has only {} points, need >= 4", ring.len()),
        });
    }
    let points: Vec<String> = ring.iter().map(|(lon, lat)| format!("{lon} {lat}")).collect();
    Ok(format!("POLYGON(({}))", points.join(",")))
}

/// Returns every cell whose bounding box overlaps `bbox` and whose
/// month falls in `months` (§4.5 step 2).
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails, or
/// [`DbError::Conversion`] if a row's persisted geometry/stats cannot
/// be decoded.
pub async fn cells_in_bbox_for_months(
    db: &dyn Database,
    bbox: &BoundingBox,
    months: &[Month],
) -> Result<Vec<SafetyCell>, DbError> {
    if months.is_empty() {
        return Ok(Vec::new());
    }

    let mut sql = String::from(
        "SELECT cell_id, h3_index, month, crime_count_total, crime_count_weighted,
                stats, geom, updated_at
         FROM safety_cells
         WHERE geom_envelope && ST_MakeEnvelope($1, $2, $3, $4, 4326)::geography
           AND month IN (",
    );

    let mut params = vec![
        DatabaseValue::Real64(bbox.west),
        DatabaseValue::Real64(bbox.south),
        DatabaseValue::Real64(bbox.east),
        DatabaseValue::Real64(bbox.north),
    ];

    for (i, month) in months.iter().enumerate() {
        if i > 0 {
            sql.push(',');
        }
        write!(sql, "${}", params.len() + 1).unwrap();
        params.push(DatabaseValue::String(month.iso_date()));
    }
    sql.push(')');

    let rows = db.query_raw_params(&sql, &params).await?;

    rows_to_cells(&rows)
}

fn rows_to_cells(rows: &[switchy_database::Row]) -> Result<Vec<SafetyCell>, DbError> {
    let mut cells = Vec::with_capacity(rows.len());

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

        let stats_json: String = row.to_value("stats").unwrap_or_default();
        let stats: std::collections::BTreeMap<CrimeCategory, u32> =
            serde_json::from_str(&stats_json).unwrap_or_default();

        let geom_json: String = row.to_value("geom").unwrap_or_default();
        let geom: Vec<(f64, f64)> = serde_json::from_str(&geom_json).unwrap_or_default();

        let naive_updated: chrono::NaiveDateTime =
            row.to_value("updated_at").unwrap_or_default();

        cells.push(SafetyCell {
            cell_id: row.to_value("cell_id").unwrap_or_default(),
            h3_index: row.to_value("h3_index").unwrap_or_default(),
            month,
            crime_count_total: row
                .to_value::<i64>("crime_count_total")
                .unwrap_or(0)
                .try_into()
                .unwrap_or(0),
            crime_count_weighted: row.to_value("crime_count_weighted").unwrap_or(0.0),
            stats,
            geom,
            updated_at: chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(
                naive_updated,
                chrono::Utc,
            ),
        });
    }

    Ok(cells)
}
