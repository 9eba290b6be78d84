#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Population aggregation for the map and chart views.
//!
//! The rendering functions ([`points`], [`regions`], [`series`]) are pure
//! functions of stored rows and, where needed, forecast entries. The
//! [`service::PopulationService`] ties them to storage and the forecast
//! cache: it decides when recorded rows are rendered directly and when the
//! forecast models fill in.

pub mod gender;
pub mod points;
pub mod regions;
pub mod series;
pub mod service;
pub mod years;

use population_map_database::DbError;
use population_map_forecast::ForecastError;
use thiserror::Error;

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A request parameter is missing or invalid.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of what went wrong.
        message: String,
    },

    /// Building or evaluating forecasts failed.
    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}
