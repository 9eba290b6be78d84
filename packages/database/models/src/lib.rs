#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Database row types and query parameter definitions.
//!
//! These types represent the shapes of data as retrieved from the `PostGIS`
//! database. They are distinct from the API response types in
//! `population_map_server_models`.

use population_map_population_models::{Coordinates, PopulationCounts, normalize_municipality_id};
use serde::{Deserialize, Serialize};

/// First year whose records are complete enough to fit forecasts on.
pub const FORECAST_MIN_YEAR: i32 = 1990;

/// Parameters for querying demographic records.
///
/// Every set filter must match. An empty filter returns every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuery {
    /// Exact census year.
    pub year: Option<i32>,
    /// Minimum census year (inclusive).
    pub min_year: Option<i32>,
    /// Restrict to these municipality identifiers. Empty means no
    /// restriction.
    pub municipality_ids: Vec<String>,
}

impl RecordQuery {
    /// Records of a single census year.
    #[must_use]
    pub fn for_year(year: i32) -> Self {
        Self {
            year: Some(year),
            ..Self::default()
        }
    }

    /// Records forecasts are fitted on.
    #[must_use]
    pub fn forecast_history() -> Self {
        Self {
            min_year: Some(FORECAST_MIN_YEAR),
            ..Self::default()
        }
    }

    /// All records of the given municipalities.
    #[must_use]
    pub fn for_municipalities(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            municipality_ids: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Whether a record with these attributes matches the query.
    #[must_use]
    pub fn matches(&self, year: i32, municipality_id: Option<&str>) -> bool {
        self.year.is_none_or(|y| y == year)
            && self.min_year.is_none_or(|min| year >= min)
            && (self.municipality_ids.is_empty()
                || municipality_id
                    .and_then(normalize_municipality_id)
                    .is_some_and(|id| self.municipality_ids.iter().any(|m| m == id)))
    }
}

/// A region joined with its summed population for one year.
///
/// Regions without records for that year are still returned, with every
/// count `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPopulationRow {
    /// Region ID.
    pub region_id: i32,
    /// Region display name.
    pub name: String,
    /// Marker location for the region.
    pub center: Coordinates,
    /// Population summed over the region's municipalities.
    pub counts: PopulationCounts,
}
