//! `PostGIS` queries for demographic data.
//!
//! Coordinates are stored as `GEOGRAPHY(POINT)` and unpacked with
//! `ST_X`/`ST_Y`. Population columns are cast to `BIGINT` in SQL so sums
//! and plain columns read back as the same type.

use std::sync::Arc;

use async_trait::async_trait;
use moosicbox_json_utils::database::ToValue as _;
use population_map_database_models::{RecordQuery, RegionPopulationRow};
use population_map_population_models::{Coordinates, DemographicRecord, PopulationCounts};
use switchy_database::{Database, DatabaseValue, Row};

use crate::{DbError, PopulationStore};

/// [`PopulationStore`] backed by the `PostGIS` database.
pub struct PostgresStore {
    db: Arc<dyn Database>,
}

impl PostgresStore {
    /// Wraps an open database connection.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PopulationStore for PostgresStore {
    async fn records(&self, query: &RecordQuery) -> Result<Vec<DemographicRecord>, DbError> {
        query_records(self.db.as_ref(), query).await
    }

    async fn distinct_years(&self) -> Result<Vec<i32>, DbError> {
        query_distinct_years(self.db.as_ref()).await
    }

    async fn region_populations(&self, year: i32) -> Result<Vec<RegionPopulationRow>, DbError> {
        query_region_populations(self.db.as_ref(), year).await
    }

    async fn record_count(&self) -> Result<u64, DbError> {
        query_record_count(self.db.as_ref()).await
    }
}

fn read_counts(row: &Row) -> PopulationCounts {
    PopulationCounts {
        total: row.to_value("total_population").unwrap_or(None),
        male: row.to_value("male_population").unwrap_or(None),
        female: row.to_value("female_population").unwrap_or(None),
    }
}

/// Queries demographic records with the filters in `query`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query_records(
    db: &dyn Database,
    query: &RecordQuery,
) -> Result<Vec<DemographicRecord>, DbError> {
    let mut sql = String::from(
        "SELECT municipality_id, name, region_id, data_year,
                ST_X(coordinates::geometry) AS lng,
                ST_Y(coordinates::geometry) AS lat,
                total_population::BIGINT AS total_population,
                male_population::BIGINT AS male_population,
                female_population::BIGINT AS female_population
         FROM population
         WHERE 1=1",
    );

    let mut params: Vec<DatabaseValue> = Vec::new();

    if let Some(year) = query.year {
        params.push(DatabaseValue::Int32(year));
        sql.push_str(&format!(" AND data_year = ${}", params.len()));
    }

    if let Some(min_year) = query.min_year {
        params.push(DatabaseValue::Int32(min_year));
        sql.push_str(&format!(" AND data_year >= ${}", params.len()));
    }

    if !query.municipality_ids.is_empty() {
        let placeholders: Vec<String> = query
            .municipality_ids
            .iter()
            .map(|id| {
                params.push(DatabaseValue::String(id.clone()));
                format!("${}", params.len())
            })
            .collect();
        sql.push_str(&format!(
            " AND TRIM(municipality_id) IN ({})",
            placeholders.join(", ")
        ));
    }

    sql.push_str(" ORDER BY data_year, municipality_id");

    let rows = db.query_raw_params(&sql, &params).await?;

    let mut records = Vec::with_capacity(rows.len());

    for row in &rows {
        let year: i32 = row.to_value("data_year").map_err(|e| DbError::Conversion {
            message: format!("Failed to parse data_year: {e}"),
        })?;

        records.push(DemographicRecord {
            municipality_id: row.to_value("municipality_id").unwrap_or(None),
            name: row.to_value("name").unwrap_or(None),
            region_id: row.to_value("region_id").unwrap_or(None),
            coordinates: Coordinates::new(
                row.to_value("lng").unwrap_or(0.0),
                row.to_value("lat").unwrap_or(0.0),
            ),
            year,
            counts: read_counts(row),
        });
    }

    log::debug!("query_records {query:?} returned {} rows", records.len());

    Ok(records)
}

/// Returns the distinct years with records, ascending.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query_distinct_years(db: &dyn Database) -> Result<Vec<i32>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT data_year FROM population GROUP BY data_year ORDER BY data_year",
            &[],
        )
        .await?;

    rows.iter()
        .map(|row| {
            row.to_value("data_year").map_err(|e| DbError::Conversion {
                message: format!("Failed to parse data_year: {e}"),
            })
        })
        .collect()
}

/// Returns every region joined with its population summed over `year`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query_region_populations(
    db: &dyn Database,
    year: i32,
) -> Result<Vec<RegionPopulationRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT r.id AS region_id, r.name,
                    ST_X(r.center::geometry) AS lng,
                    ST_Y(r.center::geometry) AS lat,
                    p.total_population, p.male_population, p.female_population
             FROM regions r
             LEFT JOIN (
                 SELECT region_id,
                        SUM(total_population)::BIGINT AS total_population,
                        SUM(male_population)::BIGINT AS male_population,
                        SUM(female_population)::BIGINT AS female_population
                 FROM population
                 WHERE data_year = $1
                 GROUP BY region_id
             ) p ON p.region_id = r.id
             ORDER BY r.id",
            &[DatabaseValue::Int32(year)],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| RegionPopulationRow {
            region_id: row.to_value("region_id").unwrap_or(0),
            name: row.to_value("name").unwrap_or_default(),
            center: Coordinates::new(
                row.to_value("lng").unwrap_or(0.0),
                row.to_value("lat").unwrap_or(0.0),
            ),
            counts: read_counts(row),
        })
        .collect())
}

/// Counts the stored records.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query_record_count(db: &dyn Database) -> Result<u64, DbError> {
    let rows = db
        .query_raw_params("SELECT COUNT(*) AS n FROM population", &[])
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "COUNT(*) returned no rows".to_string(),
    })?;

    let n: i64 = row.to_value("n").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse record count: {e}"),
    })?;

    u64::try_from(n).map_err(|e| DbError::Conversion {
        message: format!("Negative record count {n}: {e}"),
    })
}
