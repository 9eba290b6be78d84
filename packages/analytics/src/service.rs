//! Request-level population operations.
//!
//! Resolves request parameters, fetches rows from storage, and picks
//! between recorded data and forecasts before handing off to the pure
//! rendering functions.

use std::sync::Arc;

use population_map_analytics_models::{LineChart, PointCollection, RegionRollup, YearCatalog};
use population_map_database::PopulationStore;
use population_map_database_models::RecordQuery;
use population_map_forecast::cache::ForecastCache;
use population_map_population_models::{TrackedTown, ViewType};

use crate::AnalyticsError;
use crate::points::{render_forecast_points, render_points};
use crate::regions::render_region_rollup;
use crate::series::render_series;
use crate::years::list_years;

/// Parses the required `year` parameter.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidParameter`] if the year is missing or
/// not an integer.
pub fn parse_year(year: Option<&str>) -> Result<i32, AnalyticsError> {
    let year = year
        .map(str::trim)
        .filter(|y| !y.is_empty())
        .ok_or_else(|| AnalyticsError::InvalidParameter {
            message: "missing required parameter 'year'".to_string(),
        })?;

    year.parse().map_err(|_| AnalyticsError::InvalidParameter {
        message: format!("invalid year '{year}'"),
    })
}

/// Parses the `viewType` parameter.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidParameter`] if the token is missing or
/// not a known view type.
pub fn parse_view_type(view_type: Option<&str>) -> Result<ViewType, AnalyticsError> {
    let token = view_type
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AnalyticsError::InvalidParameter {
            message: "missing required parameter 'viewType'".to_string(),
        })?;

    token.parse().map_err(|_| AnalyticsError::InvalidParameter {
        message: format!("invalid viewType '{token}'"),
    })
}

/// Population queries over one store and its forecast cache.
pub struct PopulationService {
    store: Arc<dyn PopulationStore>,
    forecasts: ForecastCache,
    towns: Vec<TrackedTown>,
}

impl PopulationService {
    /// Creates a service whose forecast cache builds from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn PopulationStore>, towns: Vec<TrackedTown>) -> Self {
        Self {
            forecasts: ForecastCache::new(store.clone()),
            store,
            towns,
        }
    }

    /// The forecast cache backing this service.
    #[must_use]
    pub const fn forecasts(&self) -> &ForecastCache {
        &self.forecasts
    }

    /// The towns charted by [`Self::line_chart`].
    #[must_use]
    pub fn towns(&self) -> &[TrackedTown] {
        &self.towns
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &dyn PopulationStore {
        self.store.as_ref()
    }

    /// Heat-map points for `year`.
    ///
    /// Years with recorded rows render those rows. Any other year is
    /// predicted for every municipality from the forecast models.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if storage fails or the forecast models
    /// cannot be built.
    pub async fn population_for_year(
        &self,
        year: i32,
        gender: Option<&str>,
    ) -> Result<PointCollection, AnalyticsError> {
        let rows = self.store.records(&RecordQuery::for_year(year)).await?;

        if rows.is_empty() {
            log::debug!("No records for {year}, using forecasts");
            let entries = self.forecasts.get_or_build().await?;
            return Ok(render_forecast_points(&entries, gender, year));
        }

        Ok(render_points(&rows, gender))
    }

    /// Region rollup for `year`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if storage fails.
    pub async fn region_rollup(
        &self,
        year: i32,
        gender: Option<&str>,
    ) -> Result<RegionRollup, AnalyticsError> {
        let rows = self.store.region_populations(year).await?;
        Ok(render_region_rollup(&rows, gender))
    }

    /// Years available for `view_type`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if storage fails.
    pub async fn available_years(&self, view_type: ViewType) -> Result<YearCatalog, AnalyticsError> {
        Ok(list_years(self.store.as_ref(), view_type.includes_forecast()).await?)
    }

    /// Line chart of the tracked towns over all recorded and forecastable
    /// years.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if storage fails or the forecast models
    /// cannot be built.
    pub async fn line_chart(&self, gender: Option<&str>) -> Result<LineChart, AnalyticsError> {
        let entries = self.forecasts.get_or_build().await?;

        let ids = self.towns.iter().map(|t| t.municipality_id.clone());
        let rows = self.store.records(&RecordQuery::for_municipalities(ids)).await?;

        let catalog = list_years(self.store.as_ref(), true).await?;

        Ok(render_series(
            &rows,
            &self.towns,
            &catalog.years,
            catalog.max_recorded_year,
            &entries,
            gender,
        ))
    }
}
