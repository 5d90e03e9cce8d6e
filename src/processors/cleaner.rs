use crate::models::{is_usable_value, Observation, RawObservation, WeatherField, WeatherValues};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanReport {
    pub input_rows: usize,
    pub output_rows: usize,
    /// Rows with every weather field missing
    pub dropped_rows: usize,
    /// Sentinel, infinite or NaN readings turned into missing
    pub invalid_values: usize,
    pub precipitation_filled: usize,
}

/// Canonicalize the raw series.
///
/// Invalid readings become missing and rows with nothing left are dropped
/// before missing precipitation is read as zero. Output is sorted by
/// (region, date); rows sharing a key keep their input order.
pub fn clean(raw: &[RawObservation]) -> (Vec<Observation>, CleanReport) {
    let mut report = CleanReport {
        input_rows: raw.len(),
        ..Default::default()
    };

    let mut cleaned = Vec::with_capacity(raw.len());
    for record in raw {
        let mut values = WeatherValues::new();
        for (field, value) in record.values.iter() {
            if is_usable_value(value) {
                values.set(field, value);
            } else if value.is_some() {
                report.invalid_values += 1;
            }
        }

        if values.is_all_missing() {
            report.dropped_rows += 1;
            continue;
        }

        if values.get(WeatherField::Precipitation).is_none() {
            values.set(WeatherField::Precipitation, Some(0.0));
            report.precipitation_filled += 1;
        }

        cleaned.push(Observation {
            region: record.region.clone(),
            date: record.date,
            latitude: record.latitude,
            longitude: record.longitude,
            values,
        });
    }

    cleaned.sort_by(|a, b| a.region.cmp(&b.region).then_with(|| a.date.cmp(&b.date)));
    report.output_rows = cleaned.len();

    tracing::info!(
        "Cleaned {} rows: {} dropped, {} invalid values removed, {} precipitation gaps set to 0",
        report.input_rows,
        report.dropped_rows,
        report.invalid_values,
        report.precipitation_filled
    );

    (cleaned, report)
}

/// Re-run cleaning over already canonical rows
pub fn clean_observations(observations: &[Observation]) -> Vec<Observation> {
    let raw: Vec<RawObservation> = observations.iter().map(RawObservation::from).collect();
    clean(&raw).0
}
