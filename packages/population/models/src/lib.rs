#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Demographic record, region, and demographic split types.
//!
//! These are the domain types shared across the population-map system:
//! per-municipality yearly records as written by the ingestion tooling,
//! the administrative regions they roll up into, and the closed set of
//! demographic splits (total, male, female) every response is computed for.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Longitude.
    pub lng: f64,
    /// Latitude.
    pub lat: f64,
}

impl Coordinates {
    /// Creates a coordinate pair from longitude and latitude.
    #[must_use]
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// The demographic split a population figure refers to.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PopulationField {
    /// Whole population.
    #[default]
    Total,
    /// Male population.
    Male,
    /// Female population.
    Female,
}

impl PopulationField {
    /// Resolves the external `gender` request token.
    ///
    /// `"1"` selects [`Self::Male`], `"2"` selects [`Self::Female`]. Every
    /// other token, including `"0"` and an absent token, selects
    /// [`Self::Total`].
    #[must_use]
    pub fn from_gender_token(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            Some("1") => Self::Male,
            Some("2") => Self::Female,
            _ => Self::Total,
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Total, Self::Male, Self::Female]
    }
}

/// Raw population figures for one record, as read from storage.
///
/// Values are `None` when the column was `NULL` or could not be read as an
/// integer. Normalization to a usable count happens when a field is
/// selected, not here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationCounts {
    /// Total population.
    pub total: Option<i64>,
    /// Male population.
    pub male: Option<i64>,
    /// Female population.
    pub female: Option<i64>,
}

impl PopulationCounts {
    /// Creates counts where every field is present.
    #[must_use]
    pub const fn new(total: i64, male: i64, female: i64) -> Self {
        Self {
            total: Some(total),
            male: Some(male),
            female: Some(female),
        }
    }

    /// Returns the raw value stored for `field`.
    #[must_use]
    pub const fn raw(&self, field: PopulationField) -> Option<i64> {
        match field {
            PopulationField::Total => self.total,
            PopulationField::Male => self.male,
            PopulationField::Female => self.female,
        }
    }

    /// Returns the usable count for `field`.
    ///
    /// Missing values and negative values both normalize to 0, so no
    /// negative population is ever surfaced.
    #[must_use]
    pub fn count(&self, field: PopulationField) -> i64 {
        self.raw(field).filter(|v| *v >= 0).unwrap_or(0)
    }
}

/// One row per municipality per year.
///
/// `municipality_id` is the postal-code-like key that correlates a locality
/// across years. It is not globally unique: several municipalities may
/// share one identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemographicRecord {
    /// Postal-code-like municipality key. `None` when the stored value was
    /// missing.
    pub municipality_id: Option<String>,
    /// Municipality display name, when stored.
    pub name: Option<String>,
    /// Administrative region the municipality belongs to.
    pub region_id: Option<i32>,
    /// Location of the municipality for this year's record.
    pub coordinates: Coordinates,
    /// Census year.
    pub year: i32,
    /// Population figures.
    pub counts: PopulationCounts,
}

impl DemographicRecord {
    /// The municipality identifier with surrounding whitespace removed.
    ///
    /// `None` when the identifier is missing or blank. Every lookup keyed by
    /// municipality goes through this so padded stored values still match.
    #[must_use]
    pub fn municipality_key(&self) -> Option<&str> {
        normalize_municipality_id(self.municipality_id.as_deref()?)
    }
}

/// Trims a municipality identifier, returning `None` if nothing is left.
#[must_use]
pub fn normalize_municipality_id(id: &str) -> Option<&str> {
    Some(id.trim()).filter(|id| !id.is_empty())
}

/// An administrative region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Region ID.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Marker location for the region.
    pub center: Coordinates,
}

/// Which year listing a view needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr)]
pub enum ViewType {
    /// Heat-map view. Forecasts are available, so forecastable future years
    /// are listed too.
    #[strum(serialize = "0")]
    Heatmap,
    /// Region view. Only recorded years are listed.
    #[strum(serialize = "1")]
    Regions,
}

impl ViewType {
    /// Whether year listings for this view include forecast years.
    #[must_use]
    pub const fn includes_forecast(self) -> bool {
        matches!(self, Self::Heatmap)
    }
}

/// A municipality whose yearly figures are drawn as a line chart series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTown {
    /// Municipality identifier.
    pub municipality_id: String,
    /// Series label. `None` means the stored municipality name is used.
    pub label: Option<String>,
    /// Line color understood by the charting frontend.
    pub color: String,
}

impl TrackedTown {
    /// Creates a tracked town whose label comes from stored data.
    #[must_use]
    pub fn new(municipality_id: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            municipality_id: municipality_id.into(),
            label: None,
            color: color.into(),
        }
    }
}

/// The towns charted when no explicit configuration is given: Berlin-Mitte,
/// Munich, and Hamburg.
#[must_use]
pub fn default_tracked_towns() -> Vec<TrackedTown> {
    vec![
        TrackedTown::new("10178", "red"),
        TrackedTown::new("80331", "blue"),
        TrackedTown::new("20038", "green"),
    ]
}

/// Error returned when a tracked town entry cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTrackedTownError {
    /// The offending entry.
    pub entry: String,
}

impl std::fmt::Display for InvalidTrackedTownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid tracked town '{}': expected 'id:color' or 'id:color:label'",
            self.entry
        )
    }
}

impl std::error::Error for InvalidTrackedTownError {}

/// Parses a comma-separated list of `id:color[:label]` entries.
///
/// Order is preserved; it decides the order of chart series.
///
/// # Errors
///
/// Returns [`InvalidTrackedTownError`] if an entry lacks an id or a color.
pub fn parse_tracked_towns(s: &str) -> Result<Vec<TrackedTown>, InvalidTrackedTownError> {
    s.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':').map(str::trim);
            let id = parts.next().filter(|p| !p.is_empty());
            let color = parts.next().filter(|p| !p.is_empty());
            let label = parts.next().filter(|p| !p.is_empty());

            match (id, color) {
                (Some(id), Some(color)) => Ok(TrackedTown {
                    municipality_id: id.to_string(),
                    label: label.map(ToString::to_string),
                    color: color.to_string(),
                }),
                _ => Err(InvalidTrackedTownError {
                    entry: entry.to_string(),
                }),
            }
        })
        .collect()
}
