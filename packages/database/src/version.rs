//! The monotonic grid version counter backing cache invalidation (§4.7).
//!
//! A single-row table bumped by every successful `rebuild` or
//! `ingest_month`; the cache treats any entry stamped with an older
//! version as a miss.

use moosicbox_json_utils::database::ToValue as _;
use switchy_database::Database;

use crate::DbError;

/// Returns the current grid version, defaulting to `0` if the counter
/// row does not exist yet.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn current_version(db: &dyn Database) -> Result<u64, DbError> {
    let rows = db
        .query_raw_params("SELECT version FROM grid_version WHERE id = 1", &[])
        .await?;

    Ok(rows
        .first()
        .and_then(|r| r.to_value::<i64>("version").ok())
        .map(|v| v.max(0) as u64)
        .unwrap_or(0))
}

/// Atomically increments and returns the new grid version.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn bump_version(db: &dyn Database) -> Result<u64, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO grid_version (id, version) VALUES (1, 1)
             ON CONFLICT (id) DO UPDATE SET version = grid_version.version + 1
             RETURNING version",
            &[],
        )
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "bump_version returned no row".to_string(),
    })?;

    let version: i64 = row.to_value("version").map_err(|e| DbError::Conversion {
        message: format!("failed to parse version: {e}"),
    })?;

    Ok(version.max(0) as u64)
}
