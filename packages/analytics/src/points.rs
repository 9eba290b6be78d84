//! Heat-map point rendering.

use population_map_analytics_models::{PointCollection, PopulationPoint};
use population_map_forecast::cache::{ForecastEntries, predict};
use population_map_population_models::{DemographicRecord, PopulationField};

use crate::gender::select_field;

/// Renders one heat-map point per recorded row.
#[must_use]
pub fn render_points(rows: &[DemographicRecord], gender: Option<&str>) -> PointCollection {
    let data: Vec<PopulationPoint> = rows
        .iter()
        .map(|row| {
            let (count, _) = select_field(&row.counts, gender);
            PopulationPoint {
                lat: row.coordinates.lat,
                lng: row.coordinates.lng,
                count,
            }
        })
        .collect();

    collect(data)
}

/// Renders one heat-map point per forecast entry, predicted for `year`.
///
/// Entries whose prediction is not a positive population are left out.
#[must_use]
pub fn render_forecast_points(
    entries: &ForecastEntries,
    gender: Option<&str>,
    year: i32,
) -> PointCollection {
    let field = PopulationField::from_gender_token(gender);

    let data: Vec<PopulationPoint> = entries
        .iter()
        .filter_map(|(id, entry)| match predict(entries, id, field, year) {
            Ok(count) if count > 0 => Some(PopulationPoint {
                lat: entry.coordinates.lat,
                lng: entry.coordinates.lng,
                count,
            }),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Skipping forecast point: {e}");
                None
            }
        })
        .collect();

    collect(data)
}

fn collect(data: Vec<PopulationPoint>) -> PointCollection {
    let max = data.iter().map(|p| p.count).max().unwrap_or(0);
    PointCollection { max, data }
}

#[cfg(test)]
mod tests {
    use population_map_forecast::cache::build_entries;
    use population_map_population_models::{Coordinates, PopulationCounts};

    use super::*;

    fn row(id: &str, year: i32, counts: PopulationCounts) -> DemographicRecord {
        DemographicRecord {
            municipality_id: Some(id.to_string()),
            name: None,
            region_id: Some(1),
            coordinates: Coordinates::new(9.43, 54.78),
            year,
            counts,
        }
    }

    #[test]
    fn max_is_largest_count() {
        let rows = vec![
            row("a", 2000, PopulationCounts::new(10, 4, 6)),
            row("b", 2000, PopulationCounts::new(30, 20, 10)),
            row("c", 2000, PopulationCounts::new(20, 5, 15)),
        ];

        let total = render_points(&rows, None);
        assert_eq!(total.max, 30);
        assert_eq!(total.data.len(), 3);
        assert_eq!(total.data[0].lat, 54.78);
        assert_eq!(total.data[0].lng, 9.43);

        let female = render_points(&rows, Some("2"));
        assert_eq!(female.max, 15);
        assert_eq!(female.data[1].count, 10);
    }

    #[test]
    fn empty_rows_have_zero_max() {
        let points = render_points(&[], Some("1"));
        assert_eq!(points.max, 0);
        assert!(points.data.is_empty());
    }

    #[test]
    fn unparseable_counts_render_as_zero() {
        let rows = vec![row("a", 2000, PopulationCounts::default())];
        let points = render_points(&rows, None);
        assert_eq!(points.data[0].count, 0);
        assert_eq!(points.max, 0);
    }

    #[test]
    fn forecast_points_drop_non_positive_predictions() {
        let entries = build_entries(&[
            row("growing", 1990, PopulationCounts::new(100, 50, 50)),
            row("growing", 2000, PopulationCounts::new(200, 100, 100)),
            row("shrinking", 1990, PopulationCounts::new(100, 50, 50)),
            row("shrinking", 2000, PopulationCounts::new(10, 5, 5)),
        ])
        .unwrap();

        // Linear fits: growing reaches 300, shrinking reaches -80 in 2010.
        let points = render_forecast_points(&entries, None, 2010);
        assert_eq!(points.data.len(), 1);
        assert_eq!(points.data[0].count, 300);
        assert_eq!(points.max, 300);
    }
}
