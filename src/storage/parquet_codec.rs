use crate::error::{PipelineError, Result};
use crate::models::{EncodedObservation, LabeledObservation, Observation, WeatherField, WeatherValues};
use crate::utils::constants::DEFAULT_ROW_GROUP_SIZE;
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::{Datelike, NaiveDate};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use std::sync::Arc;

/// Days between 0001-01-01 and 1970-01-01, the Date32 origin
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const REGION_COLUMN: &str = "region";
const DATE_COLUMN: &str = "date";
const LATITUDE_COLUMN: &str = "latitude";
const LONGITUDE_COLUMN: &str = "longitude";
const TARGET_COLUMN: &str = "target";
const REGION_CODE_COLUMN: &str = "region_code";

/// Optional trailing columns a processed table may carry
#[derive(Debug, Clone, Copy, PartialEq)]
enum TableKind {
    Series,
    Labeled,
    Encoded,
}

impl TableKind {
    fn has_target(self) -> bool {
        matches!(self, TableKind::Labeled | TableKind::Encoded)
    }

    fn has_region_code(self) -> bool {
        self == TableKind::Encoded
    }
}

/// One row on its way into a batch
struct TableRow<'a> {
    observation: &'a Observation,
    target: Option<f64>,
    region_code: Option<u32>,
}

/// One row read back out of a batch
struct DecodedRow {
    observation: Observation,
    target: Option<f64>,
    region_code: Option<u32>,
}

/// Parquet encoding of the processed series tables
pub struct ParquetCodec {
    compression: Compression,
    row_group_size: usize,
}

impl Default for ParquetCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ParquetCodec {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            "snappy" => Compression::SNAPPY,
            "gzip" => Compression::GZIP(GzipLevel::default()),
            "lz4" => Compression::LZ4,
            "zstd" => Compression::ZSTD(parquet::basic::ZstdLevel::default()),
            "none" => Compression::UNCOMPRESSED,
            _ => {
                return Err(PipelineError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    pub fn encode_observations(&self, observations: &[Observation]) -> Result<Vec<u8>> {
        let rows: Vec<TableRow<'_>> = observations
            .iter()
            .map(|observation| TableRow {
                observation,
                target: None,
                region_code: None,
            })
            .collect();
        self.encode(TableKind::Series, &rows)
    }

    pub fn encode_labeled(&self, labeled: &[LabeledObservation]) -> Result<Vec<u8>> {
        let rows: Vec<TableRow<'_>> = labeled
            .iter()
            .map(|row| TableRow {
                observation: &row.observation,
                target: Some(row.target),
                region_code: None,
            })
            .collect();
        self.encode(TableKind::Labeled, &rows)
    }

    pub fn encode_encoded(&self, encoded: &[EncodedObservation]) -> Result<Vec<u8>> {
        let rows: Vec<TableRow<'_>> = encoded
            .iter()
            .map(|row| TableRow {
                observation: row.observation(),
                target: Some(row.target()),
                region_code: Some(row.region_code),
            })
            .collect();
        self.encode(TableKind::Encoded, &rows)
    }

    pub fn decode_observations(&self, bytes: Vec<u8>) -> Result<Vec<Observation>> {
        Ok(self
            .decode(TableKind::Series, bytes)?
            .into_iter()
            .map(|row| row.observation)
            .collect())
    }

    pub fn decode_labeled(&self, bytes: Vec<u8>) -> Result<Vec<LabeledObservation>> {
        self.decode(TableKind::Labeled, bytes)?
            .into_iter()
            .map(|row| {
                let target = required(row.target, TARGET_COLUMN)?;
                Ok(LabeledObservation {
                    observation: row.observation,
                    target,
                })
            })
            .collect()
    }

    pub fn decode_encoded(&self, bytes: Vec<u8>) -> Result<Vec<EncodedObservation>> {
        self.decode(TableKind::Encoded, bytes)?
            .into_iter()
            .map(|row| {
                let target = required(row.target, TARGET_COLUMN)?;
                let region_code = required(row.region_code, REGION_CODE_COLUMN)?;
                Ok(EncodedObservation {
                    labeled: LabeledObservation {
                        observation: row.observation,
                        target,
                    },
                    region_code,
                })
            })
            .collect()
    }

    fn encode(&self, kind: TableKind, rows: &[TableRow<'_>]) -> Result<Vec<u8>> {
        let schema = create_schema(kind);
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(Vec::new(), schema.clone(), Some(props))?;
        if !rows.is_empty() {
            let batch = rows_to_batch(kind, rows, schema)?;
            writer.write(&batch)?;
        }
        Ok(writer.into_inner()?)
    }

    fn decode(&self, kind: TableKind, bytes: Vec<u8>) -> Result<Vec<DecodedRow>> {
        let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))?
            .with_batch_size(8192)
            .build()?;

        let mut rows = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;
            batch_to_rows(kind, &batch, &mut rows)?;
        }
        Ok(rows)
    }
}

/// Arrow schema: identity columns, the weather fields, then the optional
/// target and region code.
fn create_schema(kind: TableKind) -> Arc<Schema> {
    let mut fields = vec![
        Field::new(REGION_COLUMN, DataType::Utf8, false),
        Field::new(DATE_COLUMN, DataType::Date32, false),
        Field::new(LATITUDE_COLUMN, DataType::Float64, false),
        Field::new(LONGITUDE_COLUMN, DataType::Float64, false),
    ];
    fields.extend(
        WeatherField::ALL
            .iter()
            .map(|field| Field::new(field.column_name(), DataType::Float64, true)),
    );
    if kind.has_target() {
        fields.push(Field::new(TARGET_COLUMN, DataType::Float64, false));
    }
    if kind.has_region_code() {
        fields.push(Field::new(REGION_CODE_COLUMN, DataType::UInt32, false));
    }

    Arc::new(Schema::new(fields))
}

fn rows_to_batch(kind: TableKind, rows: &[TableRow<'_>], schema: Arc<Schema>) -> Result<RecordBatch> {
    let regions: Vec<&str> = rows.iter().map(|r| r.observation.region.as_str()).collect();
    let dates: Vec<i32> = rows
        .iter()
        .map(|r| r.observation.date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
        .collect();
    let latitudes: Vec<f64> = rows.iter().map(|r| r.observation.latitude).collect();
    let longitudes: Vec<f64> = rows.iter().map(|r| r.observation.longitude).collect();

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(regions)),
        Arc::new(Date32Array::from(dates)),
        Arc::new(Float64Array::from(latitudes)),
        Arc::new(Float64Array::from(longitudes)),
    ];

    for field in WeatherField::ALL {
        let values: Vec<Option<f64>> = rows.iter().map(|r| r.observation.get(field)).collect();
        columns.push(Arc::new(Float64Array::from(values)));
    }

    if kind.has_target() {
        let targets = rows
            .iter()
            .map(|r| required(r.target, TARGET_COLUMN))
            .collect::<Result<Vec<f64>>>()?;
        columns.push(Arc::new(Float64Array::from(targets)));
    }
    if kind.has_region_code() {
        let codes = rows
            .iter()
            .map(|r| required(r.region_code, REGION_CODE_COLUMN))
            .collect::<Result<Vec<u32>>>()?;
        columns.push(Arc::new(UInt32Array::from(codes)));
    }

    Ok(RecordBatch::try_new(schema, columns)?)
}

fn batch_to_rows(kind: TableKind, batch: &RecordBatch, rows: &mut Vec<DecodedRow>) -> Result<()> {
    let regions = typed_column::<StringArray>(batch, REGION_COLUMN)?;
    let dates = typed_column::<Date32Array>(batch, DATE_COLUMN)?;
    let latitudes = typed_column::<Float64Array>(batch, LATITUDE_COLUMN)?;
    let longitudes = typed_column::<Float64Array>(batch, LONGITUDE_COLUMN)?;

    let field_columns = WeatherField::ALL
        .iter()
        .map(|field| typed_column::<Float64Array>(batch, field.column_name()))
        .collect::<Result<Vec<_>>>()?;

    let targets = if kind.has_target() {
        Some(typed_column::<Float64Array>(batch, TARGET_COLUMN)?)
    } else {
        None
    };
    let codes = if kind.has_region_code() {
        Some(typed_column::<UInt32Array>(batch, REGION_CODE_COLUMN)?)
    } else {
        None
    };

    for i in 0..batch.num_rows() {
        let days = dates.value(i);
        let date = NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
            .ok_or_else(|| {
                PipelineError::Persistence(format!("Date32 value out of range: {}", days))
            })?;

        let mut values = WeatherValues::new();
        for (field, column) in WeatherField::ALL.iter().zip(&field_columns) {
            if !column.is_null(i) {
                values.set(*field, Some(column.value(i)));
            }
        }

        rows.push(DecodedRow {
            observation: Observation {
                region: regions.value(i).to_string(),
                date,
                latitude: latitudes.value(i),
                longitude: longitudes.value(i),
                values,
            },
            target: targets.filter(|a| !a.is_null(i)).map(|a| a.value(i)),
            region_code: codes.filter(|a| !a.is_null(i)).map(|a| a.value(i)),
        });
    }

    Ok(())
}

fn typed_column<'a, A: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a A> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PipelineError::Persistence(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| PipelineError::Persistence(format!("Invalid {} column type", name)))
}

fn required<T>(value: Option<T>, column: &str) -> Result<T> {
    value.ok_or_else(|| PipelineError::Persistence(format!("Null value in {} column", column)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn observation(day: u32, temp: Option<f64>) -> Observation {
        let mut values = WeatherValues::new()
            .with(WeatherField::Precipitation, 0.0)
            .with(WeatherField::Pressure, 86.2);
        values.set(WeatherField::Temperature, temp);
        Observation {
            region: "Kaski".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 12, day).unwrap(),
            latitude: 28.21,
            longitude: 83.99,
            values,
        }
    }

    #[test]
    fn test_series_keeps_dates_and_nulls() -> Result<()> {
        let codec = ParquetCodec::new();
        let rows = vec![observation(30, Some(8.5)), observation(31, None)];

        let decoded = codec.decode_observations(codec.encode_observations(&rows)?)?;
        assert_eq!(decoded, rows);
        Ok(())
    }

    #[test]
    fn test_encoded_table_carries_target_and_code() -> Result<()> {
        let codec = ParquetCodec::new().with_compression("zstd")?;
        let rows = vec![EncodedObservation {
            labeled: LabeledObservation {
                observation: observation(1, Some(4.0)),
                target: 5.5,
            },
            region_code: 34,
        }];

        let decoded = codec.decode_encoded(codec.encode_encoded(&rows)?)?;
        assert_eq!(decoded, rows);
        Ok(())
    }

    #[test]
    fn test_empty_table_round_trips() -> Result<()> {
        let codec = ParquetCodec::new();
        let bytes = codec.encode_labeled(&[])?;
        assert!(codec.decode_labeled(bytes)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_series_table_is_not_a_labeled_table() -> Result<()> {
        let codec = ParquetCodec::new();
        let bytes = codec.encode_observations(&[observation(2, Some(1.0))])?;
        assert!(matches!(
            codec.decode_labeled(bytes),
            Err(PipelineError::Persistence(_))
        ));
        Ok(())
    }

    #[test]
    fn test_unknown_compression_rejected() {
        assert!(ParquetCodec::new().with_compression("brotli9000").is_err());
    }
}
