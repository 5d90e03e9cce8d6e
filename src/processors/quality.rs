use std::collections::BTreeMap;

use crate::models::{Observation, WeatherField};

/// Per-field missing-value counts over a series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissingValueReport {
    pub total_records: usize,
    pub region_count: usize,
    pub missing_by_field: BTreeMap<WeatherField, usize>,
}

impl MissingValueReport {
    pub fn from_observations(observations: &[Observation]) -> Self {
        let mut report = Self {
            total_records: observations.len(),
            ..Default::default()
        };

        let mut regions: Vec<&str> = observations.iter().map(|o| o.region.as_str()).collect();
        regions.sort_unstable();
        regions.dedup();
        report.region_count = regions.len();

        for observation in observations {
            for (field, value) in observation.values.iter() {
                if value.is_none() {
                    *report.missing_by_field.entry(field).or_default() += 1;
                }
            }
        }
        report
    }

    pub fn total_missing(&self) -> usize {
        self.missing_by_field.values().sum()
    }

    pub fn missing(&self, field: WeatherField) -> usize {
        self.missing_by_field.get(&field).copied().unwrap_or(0)
    }

    /// Emit one log line per field with gaps
    pub fn log(&self, stage: &str) {
        if self.missing_by_field.is_empty() {
            tracing::info!("{}: no missing values in {} records", stage, self.total_records);
            return;
        }
        for (field, count) in &self.missing_by_field {
            tracing::info!(
                "{}: {} missing {} ({:.1}%)",
                stage,
                field,
                count,
                self.percentage(*count)
            );
        }
    }

    pub fn generate_summary(&self, title: &str) -> String {
        let mut summary = String::new();

        summary.push_str(&format!("=== {} ===\n", title));
        summary.push_str(&format!("Total Records: {}\n", self.total_records));
        summary.push_str(&format!("Regions: {}\n", self.region_count));
        summary.push_str(&format!("Missing Values: {}\n", self.total_missing()));

        if !self.missing_by_field.is_empty() {
            summary.push_str("\nBy Field:\n");
            for field in WeatherField::ALL {
                let count = self.missing(field);
                if count > 0 {
                    summary.push_str(&format!(
                        "  {:<20} {:>8} ({:.1}%)\n",
                        field.column_name(),
                        count,
                        self.percentage(count)
                    ));
                }
            }
        }

        summary
    }

    fn percentage(&self, count: usize) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        100.0 * count as f64 / self.total_records as f64
    }
}
