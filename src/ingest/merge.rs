use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::models::RawObservation;

/// Merge newly fetched records into the existing series.
///
/// Keys are (region, date); a later record replaces an earlier one, and the
/// output is sorted by region then date.
pub fn merge_series(
    existing: Vec<RawObservation>,
    fetched: Vec<RawObservation>,
) -> Vec<RawObservation> {
    let mut merged: BTreeMap<(String, NaiveDate), RawObservation> = BTreeMap::new();
    let mut replaced = 0usize;

    for record in existing.into_iter().chain(fetched) {
        let key = (record.region.clone(), record.date);
        if merged.insert(key, record).is_some() {
            replaced += 1;
        }
    }

    if replaced > 0 {
        tracing::debug!("Merge replaced {} duplicate (region, date) rows", replaced);
    }

    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WeatherField, WeatherValues};
    use pretty_assertions::assert_eq;

    fn record(region: &str, day: u32, temp: f64) -> RawObservation {
        RawObservation::new(
            region,
            NaiveDate::from_ymd_opt(2024, 2, day).unwrap(),
            27.0,
            85.0,
            WeatherValues::new().with(WeatherField::Temperature, temp),
        )
    }

    #[test]
    fn test_last_write_wins() {
        let existing = vec![record("Ilam", 1, 10.0), record("Ilam", 2, -999.0)];
        let fetched = vec![record("Ilam", 2, 11.5), record("Ilam", 3, 12.0)];

        let merged = merge_series(existing, fetched);
        assert_eq!(
            merged,
            vec![
                record("Ilam", 1, 10.0),
                record("Ilam", 2, 11.5),
                record("Ilam", 3, 12.0)
            ]
        );
    }

    #[test]
    fn test_sorted_by_region_then_date() {
        let merged = merge_series(
            vec![record("Jhapa", 2, 1.0), record("Ilam", 5, 2.0)],
            vec![record("Jhapa", 1, 3.0)],
        );
        let keys: Vec<(&str, u32)> = merged
            .iter()
            .map(|r| (r.region.as_str(), chrono::Datelike::day(&r.date)))
            .collect();
        assert_eq!(keys, vec![("Ilam", 5), ("Jhapa", 1), ("Jhapa", 2)]);
    }
}
