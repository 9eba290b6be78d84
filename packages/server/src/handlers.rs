//! HTTP handler functions for the population map API.

use actix_web::{HttpResponse, web};
use population_map_analytics::AnalyticsError;
use population_map_analytics::service::{parse_view_type, parse_year};
use population_map_server_models::{ApiError, ApiHealth, PopulationQueryParams};

use crate::AppState;

/// Maps an analytics failure to an error response.
///
/// Parameter errors are the caller's fault and answered with 400; anything
/// else is logged and answered with 500.
fn error_response(context: &str, e: &AnalyticsError) -> HttpResponse {
    match e {
        AnalyticsError::InvalidParameter { message } => {
            log::debug!("{context}: {message}");
            HttpResponse::BadRequest().json(ApiError::new(message.clone()))
        }
        AnalyticsError::Forecast(_) | AnalyticsError::Database(_) => {
            log::error!("{context}: {e}");
            HttpResponse::InternalServerError().json(ApiError::new(context))
        }
    }
}

/// `GET /health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        forecasts_ready: state.service.forecasts().get().is_some(),
    })
}

/// `GET /population/data/{year}?gender=`
///
/// Heat-map points for a year. Years without recorded data are answered
/// from the forecast models.
pub async fn population(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<PopulationQueryParams>,
) -> HttpResponse {
    let year = match parse_year(Some(path.as_str())) {
        Ok(year) => year,
        Err(e) => return error_response("Failed to query population", &e),
    };
    log::debug!("population year={year} gender={:?}", params.gender);

    match state
        .service
        .population_for_year(year, params.gender.as_deref())
        .await
    {
        Ok(points) => HttpResponse::Ok().json(points),
        Err(e) => error_response("Failed to query population", &e),
    }
}

/// `GET /population/availableYears/{view_type}`
///
/// `"0"` lists recorded and forecastable years, `"1"` recorded years only.
pub async fn available_years(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let view_type = match parse_view_type(Some(path.as_str())) {
        Ok(view_type) => view_type,
        Err(e) => return error_response("Failed to list years", &e),
    };
    log::debug!("available_years view_type={}", view_type.as_ref());

    match state.service.available_years(view_type).await {
        Ok(catalog) => HttpResponse::Ok().json(catalog.years),
        Err(e) => error_response("Failed to list years", &e),
    }
}

/// `GET /population/populationByRegion/{year}?gender=`
pub async fn population_by_region(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<PopulationQueryParams>,
) -> HttpResponse {
    let year = match parse_year(Some(path.as_str())) {
        Ok(year) => year,
        Err(e) => return error_response("Failed to query regions", &e),
    };
    log::debug!("population_by_region year={year} gender={:?}", params.gender);

    match state
        .service
        .region_rollup(year, params.gender.as_deref())
        .await
    {
        Ok(rollup) => HttpResponse::Ok().json(rollup),
        Err(e) => error_response("Failed to query regions", &e),
    }
}

/// `GET /population/lineChartData?gender=`
pub async fn line_chart(
    state: web::Data<AppState>,
    params: web::Query<PopulationQueryParams>,
) -> HttpResponse {
    log::debug!("line_chart gender={:?}", params.gender);

    match state.service.line_chart(params.gender.as_deref()).await {
        Ok(chart) => HttpResponse::Ok().json(chart),
        Err(e) => error_response("Failed to build line chart", &e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, test};
    use population_map_analytics::service::PopulationService;
    use population_map_database::memory::MemoryStore;
    use population_map_population_models::{
        Coordinates, DemographicRecord, PopulationCounts, Region, default_tracked_towns,
    };
    use serde_json::Value;

    use super::*;
    use crate::configure_routes;

    fn record(id: &str, region: i32, year: i32, total: i64) -> DemographicRecord {
        DemographicRecord {
            municipality_id: Some(id.to_string()),
            name: Some(format!("Town {id}")),
            region_id: Some(region),
            coordinates: Coordinates::new(10.0, 51.0),
            year,
            counts: PopulationCounts::new(total, total * 6 / 10, total * 4 / 10),
        }
    }

    fn state() -> web::Data<AppState> {
        let store = Arc::new(MemoryStore::new(
            vec![
                record("10178", 1, 1990, 100),
                record("10178", 1, 2000, 200),
                record("80331", 2, 1990, 300),
                record("80331", 2, 2000, 300),
            ],
            vec![
                Region {
                    id: 1,
                    name: "Berlin".to_string(),
                    center: Coordinates::new(13.4, 52.5),
                },
                Region {
                    id: 2,
                    name: "Bayern".to_string(),
                    center: Coordinates::new(11.4, 48.9),
                },
            ],
        ));
        web::Data::new(AppState {
            service: Arc::new(PopulationService::new(store, default_tracked_towns())),
        })
    }

    async fn get(uri: &str) -> (u16, Value) {
        let app = test::init_service(App::new().app_data(state()).configure(configure_routes)).await;
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        let status = resp.status().as_u16();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }

    #[actix_web::test]
    async fn population_for_recorded_year() {
        let (status, body) = get("/population/data/2000?gender=1").await;
        assert_eq!(status, 200);
        assert_eq!(body["max"], 180);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn population_for_future_year_is_forecast() {
        let (status, body) = get("/population/data/2010").await;
        assert_eq!(status, 200);
        assert_eq!(body["max"], 300);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn invalid_year_is_bad_request() {
        let (status, body) = get("/population/data/soon").await;
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("soon"));
    }

    #[actix_web::test]
    async fn available_years_by_view_type() {
        let (_, body) = get("/population/availableYears/0").await;
        assert_eq!(body, serde_json::json!([1990, 2000, 2001, 2002, 2003, 2004, 2005]));

        let (_, body) = get("/population/availableYears/1").await;
        assert_eq!(body, serde_json::json!([1990, 2000]));

        let (status, _) = get("/population/availableYears/7").await;
        assert_eq!(status, 400);
    }

    #[actix_web::test]
    async fn region_rollup_shape() {
        let (status, body) = get("/population/populationByRegion/2000").await;
        assert_eq!(status, 200);
        assert_eq!(body["total_population"], 500);
        assert_eq!(body["Berlin"]["percent"], 40);
        assert_eq!(body["Bayern"]["percent"], 60);
        assert_eq!(body["Bayern"]["center"]["lng"], 11.4);
    }

    #[actix_web::test]
    async fn line_chart_shape() {
        let (status, body) = get("/population/lineChartData").await;
        assert_eq!(status, 200);
        assert_eq!(body["labels"].as_array().unwrap().len(), 7);
        let sets = body["dataSets"].as_array().unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0]["label"], "Town 10178");
        assert_eq!(sets[0]["borderColor"], "red");
        assert_eq!(sets[0]["data"][2], 210);
    }

    #[actix_web::test]
    async fn health_reports_forecast_state() {
        let (status, body) = get("/health").await;
        assert_eq!(status, 200);
        assert_eq!(body["healthy"], true);
        assert_eq!(body["forecastsReady"], false);
    }
}
