//! Region rollups.

use population_map_analytics_models::{RegionRollup, RegionShare};
use population_map_database_models::RegionPopulationRow;

use crate::gender::select_field;

/// Sums population per region and computes each region's share of the
/// total.
///
/// When the total is 0 every region gets a percent of 0.
#[must_use]
pub fn render_region_rollup(rows: &[RegionPopulationRow], gender: Option<&str>) -> RegionRollup {
    let mut rollup = RegionRollup::default();

    for row in rows {
        let (count, _) = select_field(&row.counts, gender);
        rollup
            .regions
            .entry(row.name.clone())
            .and_modify(|share| share.count += count)
            .or_insert(RegionShare {
                id: row.region_id,
                count,
                center: row.center,
                percent: 0,
            });
        rollup.total_population += count;
    }

    let total = rollup.total_population;
    for share in rollup.regions.values_mut() {
        share.percent = percent_of(share.count, total);
    }

    rollup
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn percent_of(count: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (100.0 * count as f64 / total as f64).round() as i64
}
