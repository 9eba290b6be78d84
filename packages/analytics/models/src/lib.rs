#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types for the population aggregations.
//!
//! Each type serializes to the exact JSON shape its frontend consumer reads
//! (the heat-map plugin, the region marker layer, and the line chart), so
//! handlers can return them without any conversion.

use std::collections::BTreeMap;

use population_map_population_models::Coordinates;
use serde::{Deserialize, Serialize};

/// One weighted heat-map point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationPoint {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Population at this point.
    pub count: i64,
}

/// Heat-map data: every point plus the largest count, which the plugin uses
/// as its intensity ceiling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCollection {
    /// Largest `count` among `data`, 0 when empty.
    pub max: i64,
    /// The points.
    pub data: Vec<PopulationPoint>,
}

/// Population of one region and its share of the whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionShare {
    /// Region ID.
    pub id: i32,
    /// Population of the region.
    pub count: i64,
    /// Marker location.
    pub center: Coordinates,
    /// Rounded percentage of the total population, 0-100.
    pub percent: i64,
}

/// Per-region populations keyed by region name, plus the grand total.
///
/// Serializes flat: `{"Bayern": {...}, "Berlin": {...}, "total_population": 123}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionRollup {
    /// Regions keyed by display name.
    #[serde(flatten)]
    pub regions: BTreeMap<String, RegionShare>,
    /// Sum of every region's count.
    pub total_population: i64,
}

/// One line of the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSeries {
    /// Legend label.
    pub label: String,
    /// Line color.
    pub border_color: String,
    /// One value per entry of [`LineChart::labels`].
    pub data: Vec<i64>,
}

/// Multi-series chart data over a shared year axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChart {
    /// Years on the x axis, ascending.
    pub labels: Vec<i32>,
    /// Series in configuration order.
    pub data_sets: Vec<LineSeries>,
}

/// Years a view can display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearCatalog {
    /// Ascending, without duplicates.
    pub years: Vec<i32>,
    /// Latest year with recorded data, `None` when storage is empty.
    pub max_recorded_year: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_rollup_serializes_flat() {
        let mut regions = BTreeMap::new();
        regions.insert(
            "Berlin".to_string(),
            RegionShare {
                id: 11,
                count: 70,
                center: Coordinates::new(13.4, 52.5),
                percent: 70,
            },
        );
        let rollup = RegionRollup {
            regions,
            total_population: 100,
        };

        let json = serde_json::to_value(&rollup).unwrap();
        assert_eq!(json["total_population"], 100);
        assert_eq!(json["Berlin"]["id"], 11);
        assert_eq!(json["Berlin"]["center"]["lat"], 52.5);
        assert_eq!(json["Berlin"]["percent"], 70);
    }

    #[test]
    fn line_chart_uses_chart_field_names() {
        let chart = LineChart {
            labels: vec![2000, 2001],
            data_sets: vec![LineSeries {
                label: "Berlin".to_string(),
                border_color: "red".to_string(),
                data: vec![1, 2],
            }],
        };

        let json = serde_json::to_value(&chart).unwrap();
        assert_eq!(json["labels"][1], 2001);
        assert_eq!(json["dataSets"][0]["borderColor"], "red");
        assert_eq!(json["dataSets"][0]["data"][0], 1);
    }

    #[test]
    fn point_collection_shape() {
        let points = PointCollection {
            max: 5,
            data: vec![PopulationPoint {
                lat: 54.78,
                lng: 9.43,
                count: 5,
            }],
        };
        let json = serde_json::to_value(&points).unwrap();
        assert_eq!(json["max"], 5);
        assert_eq!(json["data"][0]["count"], 5);
        assert_eq!(json["data"][0]["lng"], 9.43);
    }
}
