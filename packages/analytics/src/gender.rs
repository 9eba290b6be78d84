//! Demographic split selection.

use population_map_population_models::{PopulationCounts, PopulationField};

/// Picks the population figure for the requested `gender` token.
///
/// Unknown or absent tokens select the total. The value is normalized to a
/// non-negative count: missing and negative figures become 0.
#[must_use]
pub fn select_field(counts: &PopulationCounts, requested: Option<&str>) -> (i64, PopulationField) {
    let field = PopulationField::from_gender_token(requested);
    (counts.count(field), field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_requested_split() {
        let counts = PopulationCounts::new(100, 60, 40);
        assert_eq!(select_field(&counts, Some("1")), (60, PopulationField::Male));
        assert_eq!(select_field(&counts, Some("2")), (40, PopulationField::Female));
        assert_eq!(select_field(&counts, Some("0")), (100, PopulationField::Total));
    }

    #[test]
    fn unknown_token_falls_back_to_total() {
        let counts = PopulationCounts::new(100, 60, 40);
        assert_eq!(select_field(&counts, Some("9")), (100, PopulationField::Total));
        assert_eq!(select_field(&counts, None), (100, PopulationField::Total));
    }

    #[test]
    fn missing_or_negative_values_become_zero() {
        let counts = PopulationCounts {
            total: None,
            male: Some(-3),
            female: Some(12),
        };
        assert_eq!(select_field(&counts, None), (0, PopulationField::Total));
        assert_eq!(select_field(&counts, Some("1")), (0, PopulationField::Male));
        assert_eq!(select_field(&counts, Some("2")), (12, PopulationField::Female));
    }
}
