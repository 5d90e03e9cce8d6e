use chrono::Datelike;

use crate::models::{LabeledObservation, Observation};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelReport {
    pub input_rows: usize,
    pub window_start_year: Option<i32>,
    pub window_end_year: Option<i32>,
    pub rows_in_window: usize,
    pub labeled_rows: usize,
    /// Final row of each region, which has no successor
    pub dropped_last_rows: usize,
    /// Rows whose successor has no temperature
    pub dropped_missing_target: usize,
}

/// Keep rows whose year lies in the trailing `window_years` ending at the
/// latest year present.
pub fn filter_recent_years(observations: &[Observation], window_years: i32) -> Vec<Observation> {
    let Some(max_year) = observations.iter().map(|o| o.date.year()).max() else {
        return Vec::new();
    };
    let start_year = max_year - window_years + 1;
    observations
        .iter()
        .filter(|o| o.date.year() >= start_year)
        .cloned()
        .collect()
}

/// Window the series, then pair each row with its region's next-row
/// temperature. Must run on interpolated data before any shuffling.
pub fn label_next_day(
    observations: &[Observation],
    window_years: i32,
) -> (Vec<LabeledObservation>, LabelReport) {
    let mut report = LabelReport {
        input_rows: observations.len(),
        ..Default::default()
    };

    let mut windowed = filter_recent_years(observations, window_years);
    report.rows_in_window = windowed.len();
    report.window_end_year = windowed.iter().map(|o| o.date.year()).max();
    report.window_start_year = report.window_end_year.map(|y| y - window_years + 1);

    windowed.sort_by(|a, b| a.region.cmp(&b.region).then_with(|| a.date.cmp(&b.date)));

    let mut labeled = Vec::with_capacity(windowed.len());
    let mut rows = windowed.into_iter().peekable();
    while let Some(row) = rows.next() {
        let next = rows.peek().filter(|next| next.region == row.region);
        match next {
            None => report.dropped_last_rows += 1,
            Some(next) => match next.temperature() {
                Some(target) => labeled.push(LabeledObservation {
                    observation: row,
                    target,
                }),
                None => report.dropped_missing_target += 1,
            },
        }
    }
    report.labeled_rows = labeled.len();

    tracing::info!(
        "Labeled {} rows from {} in window {:?}..={:?} ({} trailing, {} without target)",
        report.labeled_rows,
        report.rows_in_window,
        report.window_start_year,
        report.window_end_year,
        report.dropped_last_rows,
        report.dropped_missing_target
    );

    (labeled, report)
}
