use chrono::NaiveDate;

use crate::error::{PipelineError, Result};
use crate::models::{coerce_numeric, RawObservation, WeatherField, WeatherValues};
use crate::utils::constants::UPSTREAM_DATE_FORMAT;

const REGION_COLUMN: &str = "DISTRICT";
const DATE_COLUMN: &str = "DATE";
const LAT_COLUMN: &str = "LAT";
const LON_COLUMN: &str = "LON";

/// Raw series as read back from the store
#[derive(Debug, Default)]
pub struct RawSeries {
    pub records: Vec<RawObservation>,
    /// Rows dropped because the date or coordinates would not parse
    pub skipped_rows: usize,
}

/// Encode the raw series as CSV with upstream parameter codes as headers.
pub fn write_raw_series(records: &[RawObservation]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![REGION_COLUMN, DATE_COLUMN, LAT_COLUMN, LON_COLUMN];
    header.extend(WeatherField::ALL.iter().map(|f| f.upstream_code()));
    writer.write_record(&header)?;

    for record in records {
        let mut row = Vec::with_capacity(header.len());
        row.push(record.region.clone());
        row.push(record.date.format(UPSTREAM_DATE_FORMAT).to_string());
        row.push(record.latitude.to_string());
        row.push(record.longitude.to_string());
        for (_, value) in record.values.iter() {
            row.push(value.map(|v| v.to_string()).unwrap_or_default());
        }
        writer.write_record(&row)?;
    }

    writer.into_inner().map_err(|e| PipelineError::Io(e.into_error()))
}

/// Decode a raw series CSV. Unknown columns are ignored and non-numeric
/// parameter cells read as missing.
pub fn read_raw_series(bytes: &[u8]) -> Result<RawSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let position = |name: &str| -> Result<usize> {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            PipelineError::Persistence(format!("Raw series is missing column '{}'", name))
        })
    };
    let region_idx = position(REGION_COLUMN)?;
    let date_idx = position(DATE_COLUMN)?;
    let lat_idx = position(LAT_COLUMN)?;
    let lon_idx = position(LON_COLUMN)?;

    let field_columns: Vec<(usize, WeatherField)> = headers
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| WeatherField::from_upstream_code(name).map(|f| (idx, f)))
        .collect();

    let mut series = RawSeries::default();
    for row in reader.records() {
        let row = row?;
        let cell = |idx: usize| row.get(idx).unwrap_or("");

        let region = cell(region_idx);
        let date = NaiveDate::parse_from_str(cell(date_idx), UPSTREAM_DATE_FORMAT);
        let latitude = coerce_numeric(cell(lat_idx));
        let longitude = coerce_numeric(cell(lon_idx));

        let (Ok(date), Some(latitude), Some(longitude)) = (date, latitude, longitude) else {
            series.skipped_rows += 1;
            continue;
        };
        if region.is_empty() {
            series.skipped_rows += 1;
            continue;
        }

        let mut values = WeatherValues::new();
        for (idx, field) in &field_columns {
            values.set(*field, coerce_numeric(cell(*idx)));
        }

        series
            .records
            .push(RawObservation::new(region, date, latitude, longitude, values));
    }

    Ok(series)
}
