#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the population map application.
//!
//! Serves the population REST API (heat-map points, region rollups, year
//! listings, and the tracked-town line chart) and the static frontend.
//! Recorded data comes from `PostGIS`; years past the last census are
//! answered from forecast models that are built once per process.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use population_map_analytics::AnalyticsError;
use population_map_analytics::service::PopulationService;
use population_map_database::queries::PostgresStore;
use population_map_database::{DbError, PopulationStore, db, run_migrations};
use population_map_population_models::{
    InvalidTrackedTownError, TrackedTown, default_tracked_towns, parse_tracked_towns,
};
use thiserror::Error;

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be read.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// The tracked town list could not be parsed.
    #[error("Invalid TRACKED_TOWNS: {0}")]
    TrackedTowns(#[from] InvalidTrackedTownError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Storage holds no records.
    #[error("No population records in database")]
    EmptyStore,

    /// Building the forecast models failed.
    #[error("Forecast warmup failed: {0}")]
    Analytics(#[from] AnalyticsError),
}

impl From<ServerError> for std::io::Error {
    fn from(e: ServerError) -> Self {
        Self::other(e)
    }
}

/// Runtime configuration read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (`BIND_ADDR`).
    pub bind_addr: String,
    /// Listen port (`PORT`).
    pub port: u16,
    /// Directory of the static frontend (`STATIC_DIR`).
    pub static_dir: String,
    /// Towns drawn in the line chart (`TRACKED_TOWNS`).
    pub tracked_towns: Vec<TrackedTown>,
    /// Whether to build forecast models before listening
    /// (`FORECAST_WARMUP`).
    pub forecast_warmup: bool,
}

impl ServerConfig {
    /// Reads the configuration from environment variables, falling back to
    /// defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if a set variable cannot be parsed.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if a present value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = match lookup("PORT") {
            Some(p) => p.trim().parse().map_err(|e| ServerError::Config {
                message: format!("PORT '{p}': {e}"),
            })?,
            None => 3000,
        };

        let static_dir = lookup("STATIC_DIR").unwrap_or_else(|| "frontend".to_string());

        let tracked_towns = match lookup("TRACKED_TOWNS") {
            Some(s) => parse_tracked_towns(&s)?,
            None => default_tracked_towns(),
        };

        let forecast_warmup = lookup("FORECAST_WARMUP")
            .is_none_or(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"));

        Ok(Self {
            bind_addr,
            port,
            static_dir,
            tracked_towns,
            forecast_warmup,
        })
    }
}

/// Shared application state.
pub struct AppState {
    /// Population queries and the forecast cache.
    pub service: Arc<PopulationService>,
}

/// Checks that `store` has data and builds the application state.
///
/// With `forecast_warmup`, the forecast models are built before returning
/// so the first forecast request does not pay for the fit.
///
/// # Errors
///
/// Returns [`ServerError`] if storage is empty or unreachable, or if the
/// warmup build fails.
pub async fn prepare_state(
    store: Arc<dyn PopulationStore>,
    config: &ServerConfig,
) -> Result<AppState, ServerError> {
    let record_count = store.record_count().await?;
    if record_count == 0 {
        return Err(ServerError::EmptyStore);
    }
    log::info!("Found {record_count} population records");

    let service = PopulationService::new(store, config.tracked_towns.clone());

    if config.forecast_warmup {
        log::info!("Warming forecast cache");
        service
            .forecasts()
            .get_or_build()
            .await
            .map_err(AnalyticsError::from)?;
    }

    Ok(AppState {
        service: Arc::new(service),
    })
}

/// Registers the API routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health)).service(
        web::scope("/population")
            .route("/data/{year}", web::get().to(handlers::population))
            .route(
                "/availableYears/{view_type}",
                web::get().to(handlers::available_years),
            )
            .route(
                "/populationByRegion/{year}",
                web::get().to(handlers::population_by_region),
            )
            .route("/lineChartData", web::get().to(handlers::line_chart)),
    );
}

/// Starts the population map API server.
///
/// Connects to the `PostGIS` database, runs migrations, verifies that
/// population data is present, optionally warms the forecast cache, and
/// starts the Actix-Web HTTP server. The caller provides the async runtime
/// (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if configuration, database setup, or
/// warmup fails, or if the HTTP server fails to bind.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = ServerConfig::from_env()?;

    log::info!("Connecting to database...");
    let db_conn = db::connect_from_env()
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to connect to database: {e}")))?;

    log::info!("Running migrations...");
    run_migrations(db_conn.as_ref())
        .await
        .map_err(ServerError::from)?;

    let store: Arc<dyn PopulationStore> = Arc::new(PostgresStore::new(Arc::from(db_conn)));
    let state = web::Data::new(prepare_state(store, &config).await?);

    let static_dir = config.static_dir.clone();

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure_routes)
            // Serve frontend static files
            .service(Files::new("/", &static_dir).index_file("index.html"))
    })
    .bind((config.bind_addr, config.port))?
    .run()
    .await
}
