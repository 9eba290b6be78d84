#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Storage access, queries, and migrations for the population map.
//!
//! Demographic records are read-only to everything in this workspace; they
//! are written by the external ingestion tooling. Consumers talk to storage
//! through the [`PopulationStore`] trait so the aggregation and forecasting
//! code never depends on a particular backend:
//!
//! * [`queries::PostgresStore`] runs raw `PostGIS` SQL through
//!   `switchy_database`.
//! * [`memory::MemoryStore`] keeps records in process, for tests and
//!   fixtures.

pub mod db;
pub mod memory;
pub mod queries;

use async_trait::async_trait;
use include_dir::{Dir, include_dir};
use population_map_database_models::{RecordQuery, RegionPopulationRow};
use population_map_population_models::DemographicRecord;
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Read access to stored demographic data.
#[async_trait]
pub trait PopulationStore: Send + Sync {
    /// Returns the records matching `query`, ordered by year, then
    /// municipality identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the records cannot be read.
    async fn records(&self, query: &RecordQuery) -> Result<Vec<DemographicRecord>, DbError>;

    /// Returns the distinct years that have records, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the years cannot be read.
    async fn distinct_years(&self) -> Result<Vec<i32>, DbError>;

    /// Returns every region with its population summed over `year`.
    ///
    /// Regions without records in `year` are included with empty counts.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the rows cannot be read.
    async fn region_populations(&self, year: i32) -> Result<Vec<RegionPopulationRow>, DbError>;

    /// Returns the total number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the count cannot be read.
    async fn record_count(&self) -> Result<u64, DbError>;
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
    log::info!("Database migrations completed successfully");
    Ok(())
}
