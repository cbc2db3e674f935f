//! Advisory locking for the Aggregator's concurrency rules (§5):
//! concurrent rebuilds of the *same* month are disallowed, and
//! `rebuild(N)` takes a process-wide lock on the aggregation table.
//!
//! Backed by Postgres advisory locks (`pg_try_advisory_lock`), scoped by
//! a stable integer key derived from the lock name.

use switchy_database::{Database, DatabaseValue};

use crate::DbError;

/// The process-wide lock key used by `rebuild(N)`.
pub const REBUILD_LOCK_KEY: i64 = hash_lock_key("saferoute:aggregator:rebuild");

/// Derives the advisory lock key for a single month's `ingest_month`.
#[must_use]
pub fn month_lock_key(year: i32, month: u32) -> i64 {
    hash_lock_key(&format!("saferoute:aggregator:month:{year:04}-{month:02}"))
}

const fn hash_lock_key(name: &str) -> i64 {
    // FNV-1a, truncated to i64: stable across runs, good enough for an
    // advisory lock key (collisions just serialize unrelated locks).
    let bytes = name.as_bytes();
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
        i += 1;
    }
    hash as i64
}

/// Attempts to acquire the advisory lock for `key`, returning `true` if
/// acquired.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn try_acquire(db: &dyn Database, key: i64) -> Result<bool, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT pg_try_advisory_lock($1) as acquired",
            &[DatabaseValue::Int64(key)],
        )
        .await?;

    Ok(rows
        .first()
        .and_then(|r| {
            use moosicbox_json_utils::database::ToValue as _;
            r.to_value::<bool>("acquired").ok()
        })
        .unwrap_or(false))
}

/// Releases the advisory lock for `key`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn release(db: &dyn Database, key: i64) -> Result<(), DbError> {
    db.exec_raw_params(
        "SELECT pg_advisory_unlock($1)",
        &[DatabaseValue::Int64(key)],
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_keys_are_stable_and_distinct() {
        assert_eq!(month_lock_key(2026, 7), month_lock_key(2026, 7));
        assert_ne!(month_lock_key(2026, 7), month_lock_key(2026, 8));
        assert_ne!(REBUILD_LOCK_KEY, month_lock_key(2026, 7));
    }
}
