use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::models::{Observation, WeatherField};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterpolationReport {
    pub regions_processed: usize,
    /// Regions with fewer than two rows
    pub regions_skipped: Vec<String>,
    pub duplicates_dropped: usize,
    pub values_interpolated: usize,
    pub values_mean_filled: usize,
    /// (region, field) pairs with no known value at all
    pub unresolved_fields: Vec<(String, WeatherField)>,
}

#[derive(Debug, Default)]
struct RegionOutcome {
    rows: Vec<Observation>,
    skipped: bool,
    duplicates_dropped: usize,
    values_interpolated: usize,
    values_mean_filled: usize,
    unresolved: Vec<WeatherField>,
}

/// Per-region time-weighted gap repair
pub struct Interpolator {
    parallel: bool,
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpolator {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Fill interior gaps by elapsed-day linear interpolation, then boundary
    /// gaps with the region's mean. Precipitation is left untouched.
    pub fn interpolate(&self, observations: &[Observation]) -> (Vec<Observation>, InterpolationReport) {
        let mut groups: BTreeMap<&str, Vec<&Observation>> = BTreeMap::new();
        for observation in observations {
            groups
                .entry(observation.region.as_str())
                .or_default()
                .push(observation);
        }
        let groups: Vec<(&str, Vec<&Observation>)> = groups.into_iter().collect();

        let outcomes: Vec<(&str, RegionOutcome)> = if self.parallel {
            groups
                .into_par_iter()
                .map(|(region, rows)| (region, interpolate_region(rows)))
                .collect()
        } else {
            groups
                .into_iter()
                .map(|(region, rows)| (region, interpolate_region(rows)))
                .collect()
        };

        let mut report = InterpolationReport::default();
        let mut output = Vec::with_capacity(observations.len());
        for (region, outcome) in outcomes {
            report.duplicates_dropped += outcome.duplicates_dropped;
            if outcome.skipped {
                tracing::info!(
                    region,
                    "Skipping region: insufficient data ({} records)",
                    outcome.rows.len()
                );
                report.regions_skipped.push(region.to_string());
                continue;
            }

            report.regions_processed += 1;
            report.values_interpolated += outcome.values_interpolated;
            report.values_mean_filled += outcome.values_mean_filled;
            for field in outcome.unresolved {
                tracing::warn!(region, "No known {} values; left missing", field);
                report.unresolved_fields.push((region.to_string(), field));
            }
            output.extend(outcome.rows);
        }

        tracing::info!(
            "Interpolated {} regions ({} skipped): {} values by time, {} by region mean",
            report.regions_processed,
            report.regions_skipped.len(),
            report.values_interpolated,
            report.values_mean_filled
        );

        (output, report)
    }
}

fn interpolate_region(mut rows: Vec<&Observation>) -> RegionOutcome {
    rows.sort_by_key(|r| r.date);

    // Last row wins on a repeated date
    let mut deduped: Vec<Observation> = Vec::with_capacity(rows.len());
    let mut duplicates_dropped = 0;
    for row in rows {
        match deduped.last_mut() {
            Some(previous) if previous.date == row.date => {
                *previous = row.clone();
                duplicates_dropped += 1;
            }
            _ => deduped.push(row.clone()),
        }
    }

    let mut outcome = RegionOutcome {
        duplicates_dropped,
        ..Default::default()
    };
    if deduped.len() < 2 {
        outcome.skipped = true;
        outcome.rows = deduped;
        return outcome;
    }

    let dates: Vec<NaiveDate> = deduped.iter().map(|r| r.date).collect();
    for field in WeatherField::ALL.into_iter().filter(|f| f.is_interpolable()) {
        let series: Vec<Option<f64>> = deduped.iter().map(|r| r.get(field)).collect();
        let filled = fill_series(&dates, &series);

        if filled.unresolved {
            outcome.unresolved.push(field);
            continue;
        }
        outcome.values_interpolated += filled.interpolated;
        outcome.values_mean_filled += filled.mean_filled;
        for (row, value) in deduped.iter_mut().zip(filled.values) {
            row.values.set(field, value);
        }
    }

    outcome.rows = deduped;
    outcome
}

#[derive(Debug, PartialEq)]
pub(crate) struct FilledSeries {
    pub values: Vec<Option<f64>>,
    pub interpolated: usize,
    pub mean_filled: usize,
    pub unresolved: bool,
}

/// Fill one field over date-sorted rows.
pub(crate) fn fill_series(dates: &[NaiveDate], series: &[Option<f64>]) -> FilledSeries {
    let known: Vec<(usize, f64)> = series
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();

    let mut result = FilledSeries {
        values: series.to_vec(),
        interpolated: 0,
        mean_filled: 0,
        unresolved: known.is_empty(),
    };
    if known.is_empty() {
        return result;
    }

    for pair in known.windows(2) {
        let (left_idx, left_value) = pair[0];
        let (right_idx, right_value) = pair[1];
        if right_idx - left_idx < 2 {
            continue;
        }

        let span = (dates[right_idx] - dates[left_idx]).num_days() as f64;
        for idx in (left_idx + 1)..right_idx {
            let elapsed = (dates[idx] - dates[left_idx]).num_days() as f64;
            let weight = if span > 0.0 { elapsed / span } else { 0.0 };
            result.values[idx] = Some(left_value + (right_value - left_value) * weight);
            result.interpolated += 1;
        }
    }

    let present: Vec<f64> = result.values.iter().flatten().copied().collect();
    let mean = present.iter().sum::<f64>() / present.len() as f64;
    for value in result.values.iter_mut().filter(|v| v.is_none()) {
        *value = Some(mean);
        result.mean_filled += 1;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeatherValues;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn obs(region: &str, d: u32, temp: Option<f64>) -> Observation {
        let mut values = WeatherValues::new()
            .with(WeatherField::Precipitation, 0.0)
            .with(WeatherField::Pressure, 80.0);
        values.set(WeatherField::Temperature, temp);
        Observation {
            region: region.to_string(),
            date: day(d),
            latitude: 27.0,
            longitude: 85.0,
            values,
        }
    }

    #[test]
    fn test_interior_gap_even_spacing() {
        let dates = vec![day(1), day(2), day(3)];
        let filled = fill_series(&dates, &[Some(10.0), None, Some(14.0)]);
        assert_eq!(filled.values, vec![Some(10.0), Some(12.0), Some(14.0)]);
        assert_eq!(filled.interpolated, 1);
    }

    #[test]
    fn test_irregular_gap_weighted_by_days() {
        // Day 2 is one day after a known 10.0 and three days before a known 14.0
        let dates = vec![day(1), day(2), day(5)];
        let filled = fill_series(&dates, &[Some(10.0), None, Some(14.0)]);
        assert_eq!(filled.values[1], Some(11.0));
    }

    #[test]
    fn test_boundary_gap_uses_region_mean() {
        let dates = vec![day(1), day(2), day(3)];
        let filled = fill_series(&dates, &[None, Some(10.0), Some(20.0)]);
        assert_eq!(filled.values[0], Some(15.0));
        assert_eq!(filled.mean_filled, 1);
    }

    #[test]
    fn test_field_without_known_values_is_unresolved() {
        let dates = vec![day(1), day(2)];
        let filled = fill_series(&dates, &[None, None]);
        assert!(filled.unresolved);
        assert_eq!(filled.values, vec![None, None]);
    }

    #[test]
    fn test_single_row_region_skipped() {
        let rows = vec![
            obs("Mugu", 1, Some(3.0)),
            obs("Dang", 1, Some(20.0)),
            obs("Dang", 2, None),
            obs("Dang", 3, Some(24.0)),
        ];
        let (output, report) = Interpolator::new().interpolate(&rows);

        assert_eq!(report.regions_skipped, vec!["Mugu".to_string()]);
        assert_eq!(output.len(), 3);
        assert!(output.iter().all(|o| o.region == "Dang"));
        assert_eq!(output[1].temperature(), Some(22.0));
    }

    #[test]
    fn test_precipitation_untouched_and_rows_preserved() {
        let mut rows = vec![obs("Dang", 1, Some(20.0)), obs("Dang", 4, Some(26.0))];
        rows[1].values.set(WeatherField::Precipitation, None);
        let (output, report) = Interpolator::new().with_parallel(false).interpolate(&rows);

        assert_eq!(output.len(), 2);
        assert_eq!(output[1].get(WeatherField::Precipitation), None);
        assert!(report
            .unresolved_fields
            .iter()
            .any(|(r, f)| r == "Dang" && *f == WeatherField::SpecificHumidity));
    }

    #[test]
    fn test_duplicate_dates_keep_last_row() {
        let rows = vec![
            obs("Dang", 1, Some(1.0)),
            obs("Dang", 1, Some(5.0)),
            obs("Dang", 2, Some(6.0)),
        ];
        let (output, report) = Interpolator::new().interpolate(&rows);
        assert_eq!(report.duplicates_dropped, 1);
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].temperature(), Some(5.0));
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let rows: Vec<Observation> = (1..=20)
            .flat_map(|d| {
                let temp = if d % 3 == 0 { None } else { Some(d as f64) };
                vec![obs("Dang", d, temp), obs("Bara", d, temp.map(|t| t * 2.0))]
            })
            .collect();
        let (parallel, _) = Interpolator::new().interpolate(&rows);
        let (sequential, _) = Interpolator::new().with_parallel(false).interpolate(&rows);
        assert_eq!(parallel, sequential);
    }
}
