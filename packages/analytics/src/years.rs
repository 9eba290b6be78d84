//! Year catalog.

use population_map_analytics_models::YearCatalog;
use population_map_database::{DbError, PopulationStore};

/// Number of years past the last census that forecasts are offered for.
pub const FORECAST_HORIZON: i32 = 5;

/// Builds a catalog from the recorded years.
///
/// `recorded` may be unsorted and contain duplicates. With
/// `include_forecast`, the [`FORECAST_HORIZON`] years after the latest
/// recorded year are appended. Without recorded years there is nothing to
/// forecast from and the catalog is empty.
#[must_use]
pub fn catalog_years(recorded: &[i32], include_forecast: bool) -> YearCatalog {
    let mut years = recorded.to_vec();
    years.sort_unstable();
    years.dedup();

    let max_recorded_year = years.last().copied();

    if include_forecast && let Some(max) = max_recorded_year {
        years.extend((1..=FORECAST_HORIZON).map(|offset| max + offset));
    }

    YearCatalog {
        years,
        max_recorded_year,
    }
}

/// Lists the years with recorded data, optionally followed by the
/// forecastable years.
///
/// # Errors
///
/// Returns [`DbError`] if the recorded years cannot be read.
pub async fn list_years(
    store: &dyn PopulationStore,
    include_forecast: bool,
) -> Result<YearCatalog, DbError> {
    let recorded = store.distinct_years().await?;
    Ok(catalog_years(&recorded, include_forecast))
}
