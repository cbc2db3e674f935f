#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Event store and safety-cell persistence for the crime-risk scoring
//! engine.
//!
//! Uses `switchy_database` for the query layer and `switchy_schema` for
//! embedded SQL migrations, identically to the rest of the stack.

pub mod cells;
pub mod db;
pub mod events;
pub mod locks;
pub mod version;

use include_dir::{Dir, include_dir};
use saferoute_database_models::EngineError;
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

/// Embedded SQL migrations from the `migrations/` directory at the
/// workspace root.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Errors that can occur at the database layer, before they are mapped
/// into the caller-facing [`EngineError`] taxonomy at each crate's
/// public boundary.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    #[error("migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    #[error("data conversion error: {message}")]
    Conversion { message: String },
}

impl From<DbError> for EngineError {
    fn from(value: DbError) -> Self {
        // Database errors are not retried in-request (§7); they fail
        // fast as upstream-unavailable from the caller's perspective.
        Self::UpstreamUnavailable(value.to_string())
    }
}

/// Runs all pending database migrations.
///
/// # Errors
///
/// Returns [`DbError`] if any migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), DbError> {
    let source = EmbeddedMigrationSource::new(&MIGRATIONS_DIR);
    let runner = MigrationRunner::new(Box::new(source));
    runner.run(db).await?;
    log::info!("database migrations completed successfully");
    Ok(())
}
