//! Line chart series for tracked towns.
//!
//! The chart needs a value for every year on its axis. Recorded years use
//! the stored figures, years past the last census use forecasts, and any
//! other gap is filled with 0.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use population_map_analytics_models::{LineChart, LineSeries};
use population_map_forecast::cache::{ForecastEntries, predict};
use population_map_population_models::{DemographicRecord, PopulationField, TrackedTown};
use regex::Regex;

use crate::gender::select_field;

static WHITESPACE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

/// Collapses runs of whitespace in stored municipality names.
fn clean_label(name: &str) -> String {
    WHITESPACE_RUN_RE.replace_all(name, " ").into_owned()
}

/// Recorded values and stored name for one town.
#[derive(Default)]
struct TownHistory {
    name: Option<String>,
    values: BTreeMap<i32, i64>,
}

/// Renders one series per tracked town over `years`.
///
/// * `rows` are the recorded rows of the tracked towns. Rows sharing a
///   municipality identifier and year are summed.
/// * `max_recorded_year` separates gaps (filled with 0) from forecast years.
///
/// Series follow the order of `towns`. A town without recorded rows, or
/// whose forecast cannot be computed, is left out of the chart.
#[must_use]
pub fn render_series(
    rows: &[DemographicRecord],
    towns: &[TrackedTown],
    years: &[i32],
    max_recorded_year: Option<i32>,
    entries: &ForecastEntries,
    gender: Option<&str>,
) -> LineChart {
    let field = PopulationField::from_gender_token(gender);

    let mut histories: BTreeMap<&str, TownHistory> = BTreeMap::new();
    for row in rows {
        let Some(id) = row.municipality_key() else {
            continue;
        };
        let history = histories.entry(id).or_default();
        if history.name.is_none() {
            history.name.clone_from(&row.name);
        }
        let (count, _) = select_field(&row.counts, gender);
        *history.values.entry(row.year).or_insert(0) += count;
    }

    let data_sets = towns
        .iter()
        .filter_map(|town| {
            let Some(history) = histories.get(town.municipality_id.as_str()) else {
                log::debug!("No recorded data for tracked town {}", town.municipality_id);
                return None;
            };

            let data = years
                .iter()
                .map(|&year| match history.values.get(&year) {
                    Some(&value) => Some(value),
                    None if max_recorded_year.is_some_and(|max| year > max) => {
                        match predict(entries, &town.municipality_id, field, year) {
                            Ok(value) => Some(value.max(0)),
                            Err(e) => {
                                log::warn!("Omitting series {}: {e}", town.municipality_id);
                                None
                            }
                        }
                    }
                    None => Some(0),
                })
                .collect::<Option<Vec<i64>>>()?;

            let label = town
                .label
                .clone()
                .or_else(|| history.name.as_deref().map(clean_label))
                .unwrap_or_else(|| town.municipality_id.clone());

            Some(LineSeries {
                label,
                border_color: town.color.clone(),
                data,
            })
        })
        .collect();

    LineChart {
        labels: years.to_vec(),
        data_sets,
    }
}
