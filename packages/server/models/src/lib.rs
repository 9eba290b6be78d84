#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the population map server.
//!
//! The aggregation results themselves are serialized straight from
//! `population_map_analytics_models`; this crate holds the request
//! parameters and the envelope types that only exist at the HTTP boundary.

use serde::{Deserialize, Serialize};

/// Query parameters shared by the population endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationQueryParams {
    /// Demographic split: `"0"` total, `"1"` male, `"2"` female. Anything
    /// else means total.
    pub gender: Option<String>,
}

/// Service health as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
    /// Whether the forecast models have been built.
    pub forecasts_ready: bool,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}

impl ApiError {
    /// Creates an error body with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
