use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::inference::InferenceContext;
use crate::ingest::{IngestReport, Ingestor};
use crate::models::{GeoIndex, PredictionRecord};
use crate::processors::{
    clean, label_next_day, CleanReport, InterpolationReport, Interpolator, LabelReport,
    MissingValueReport, RegionEncoder,
};
use crate::storage::{read_raw_series, ArtifactStore, FsArtifactStore, ParquetCodec};
use crate::training::{ModelArtifact, Trainer};
use crate::utils::constants::*;
use crate::utils::generate_run_id;

#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub clean: CleanReport,
    pub interpolation: InterpolationReport,
    pub missing_before: MissingValueReport,
    pub missing_after: MissingValueReport,
}

impl ProcessReport {
    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str(&self.missing_before.generate_summary("Missing Values Before Interpolation"));
        summary.push('\n');
        summary.push_str(&self.missing_after.generate_summary("Missing Values After Interpolation"));
        summary.push_str(&format!(
            "\nCleaning: {} of {} rows kept, {} invalid values removed\n",
            self.clean.output_rows, self.clean.input_rows, self.clean.invalid_values
        ));
        summary.push_str(&format!(
            "Interpolation: {} regions, {} values interpolated, {} mean-filled\n",
            self.interpolation.regions_processed,
            self.interpolation.values_interpolated,
            self.interpolation.values_mean_filled
        ));
        if !self.interpolation.regions_skipped.is_empty() {
            summary.push_str(&format!(
                "Skipped (too few rows): {}\n",
                self.interpolation.regions_skipped.join(", ")
            ));
        }
        summary
    }
}

#[derive(Debug)]
pub struct TrainReport {
    pub label: LabelReport,
    pub encoded_regions: usize,
    pub incomplete_examples: usize,
    pub artifact: ModelArtifact,
}

impl TrainReport {
    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str(&format!(
            "Labeled rows: {} (window {:?}..={:?})\n",
            self.label.labeled_rows, self.label.window_start_year, self.label.window_end_year
        ));
        summary.push_str(&format!("Encoded regions: {}\n", self.encoded_regions));
        if self.incomplete_examples > 0 {
            summary.push_str(&format!(
                "Dropped incomplete examples: {}\n",
                self.incomplete_examples
            ));
        }
        summary.push('\n');
        summary.push_str(&self.artifact.generate_summary());
        summary
    }
}

/// Runs the stages in order against one artifact store.
///
/// Each stage reads the complete output of the previous one and refuses to
/// start when that output is missing.
pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<dyn ArtifactStore>,
    geo: GeoIndex,
    codec: ParquetCodec,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, store: Arc<dyn ArtifactStore>, geo: GeoIndex) -> Self {
        Self {
            config,
            store,
            geo,
            codec: ParquetCodec::new(),
            show_progress: false,
        }
    }

    /// Filesystem store at `store_dir`, geo table from the override file or
    /// the built-in district list, Parquet settings from `processing`.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let codec = ParquetCodec::new()
            .with_compression(&config.processing.compression)?
            .with_row_group_size(config.processing.row_group_size);
        let store = FsArtifactStore::new(&config.store_dir)?;
        let geo = match &config.geo_index_path {
            Some(path) => GeoIndex::from_json_file(path)?,
            None => GeoIndex::nepal_districts(),
        };
        tracing::debug!(
            "Artifact store at {}, {} regions in geo index",
            store.root().display(),
            geo.len()
        );
        Ok(Self::new(config, Arc::new(store), geo).with_codec(codec))
    }

    pub fn with_codec(mut self, codec: ParquetCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn geo(&self) -> &GeoIndex {
        &self.geo
    }

    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }

    fn require(&self, artifact: &str, command: &str) -> Result<Vec<u8>> {
        if !self.store.exists(artifact) {
            return Err(PipelineError::Persistence(format!(
                "{} not found; run `weatherwave {}` first",
                artifact, command
            )));
        }
        self.store.read(artifact)
    }

    pub async fn fetch(&self, today: NaiveDate) -> Result<IngestReport> {
        tracing::info!("Starting fetch stage");
        Ingestor::from_config(&self.config)?
            .with_progress(self.show_progress)
            .run(self.store.as_ref(), &self.geo, today)
            .await
    }

    /// Clean the raw series and repair its gaps.
    pub fn process(&self) -> Result<ProcessReport> {
        tracing::info!("Starting process stage");
        let raw = read_raw_series(&self.require(RAW_SERIES_ARTIFACT, "fetch")?)?;
        if raw.skipped_rows > 0 {
            tracing::warn!("Dropped {} raw rows that failed to parse", raw.skipped_rows);
        }

        let (cleaned, clean_report) = clean(&raw.records);
        if cleaned.is_empty() {
            return Err(PipelineError::DataQuality(
                "No usable records after cleaning".to_string(),
            ));
        }
        self.store
            .write(CLEANED_SERIES_ARTIFACT, &self.codec.encode_observations(&cleaned)?)?;

        let missing_before = MissingValueReport::from_observations(&cleaned);
        missing_before.log("before interpolation");

        let (interpolated, interpolation) = Interpolator::new().interpolate(&cleaned);
        if interpolated.is_empty() {
            return Err(PipelineError::DataQuality(
                "No region has enough rows to interpolate".to_string(),
            ));
        }
        let missing_after = MissingValueReport::from_observations(&interpolated);
        missing_after.log("after interpolation");

        self.store.write(
            INTERPOLATED_SERIES_ARTIFACT,
            &self.codec.encode_observations(&interpolated)?,
        )?;
        tracing::info!("Interpolated series saved: {} rows", interpolated.len());

        Ok(ProcessReport {
            clean: clean_report,
            interpolation,
            missing_before,
            missing_after,
        })
    }

    /// Label, encode, fit and persist a matched encoder/model pair.
    pub fn train(&self, now: DateTime<Utc>) -> Result<TrainReport> {
        tracing::info!("Starting train stage");
        let series = self
            .codec
            .decode_observations(self.require(INTERPOLATED_SERIES_ARTIFACT, "process")?)?;

        let (labeled, label) = label_next_day(&series, self.config.processing.window_years);
        if labeled.is_empty() {
            return Err(PipelineError::DataQuality(
                "No labeled rows in the training window".to_string(),
            ));
        }
        self.store
            .write(LABELED_SERIES_ARTIFACT, &self.codec.encode_labeled(&labeled)?)?;

        let run_id = generate_run_id(now);
        let vocabulary = self
            .geo
            .regions()
            .map(str::to_string)
            .chain(labeled.iter().map(|row| row.observation.region.clone()));
        let encoder = RegionEncoder::fit(vocabulary, run_id.clone(), now)?;
        let encoded = encoder.encode_rows(labeled)?;
        self.store
            .write(ENCODED_SERIES_ARTIFACT, &self.codec.encode_encoded(&encoded)?)?;

        let trainer = Trainer::new(self.config.training.clone());
        let outcome = trainer.train(&encoded, &encoder, &run_id, now)?;

        // Encoder first: a model must never be visible without its encoder
        self.store.write(ENCODER_ARTIFACT, &encoder.to_json()?)?;
        trainer.persist(&outcome.artifact, self.store.as_ref())?;

        Ok(TrainReport {
            label,
            encoded_regions: encoder.len(),
            incomplete_examples: outcome.incomplete_examples,
            artifact: outcome.artifact,
        })
    }

    pub fn inference_context(&self) -> Result<InferenceContext> {
        InferenceContext::load(self.store.as_ref(), self.geo.clone())
    }

    /// Predict sampled rows of the encoded series against their actual targets.
    pub fn sample(&self, count: usize, seed: u64) -> Result<Vec<PredictionRecord>> {
        let context = self.inference_context()?;
        let encoded = self
            .codec
            .decode_encoded(self.require(ENCODED_SERIES_ARTIFACT, "train")?)?;
        context.backtest(&encoded, count, seed)
    }

    /// Fetch, process and train in sequence.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<(IngestReport, ProcessReport, TrainReport)> {
        let ingest = self.fetch(now.date_naive()).await?;
        let process = self.process()?;
        let train = self.train(now)?;
        Ok((ingest, process, train))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawObservation, RegionLocation, WeatherField, WeatherValues};
    use crate::storage::write_raw_series;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn pipeline(dir: &TempDir) -> Pipeline {
        let mut config = PipelineConfig::default();
        config.store_dir = dir.path().to_path_buf();
        config.training.n_trees = 6;
        let geo = GeoIndex::new(vec![
            RegionLocation::new("Kaski", 28.3, 84.0),
            RegionLocation::new("Lalitpur", 27.5, 85.3),
        ])
        .unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        Pipeline::new(config, Arc::new(store), geo)
    }

    fn raw_rows() -> Vec<RawObservation> {
        let mut rows = Vec::new();
        for (r, (region, lat, lon)) in [("Kaski", 28.3, 84.0), ("Lalitpur", 27.5, 85.3)].iter().enumerate() {
            for d in 0..8i64 {
                let temp = 15.0 + r as f64 * 4.0 + d as f64 * 0.5;
                let values = WeatherField::ALL
                    .iter()
                    .fold(WeatherValues::new(), |v, f| v.with(*f, 3.0))
                    .with(WeatherField::Temperature, if d == 3 { -999.0 } else { temp })
                    .with(WeatherField::MaxTemperature, temp + 5.0)
                    .with(WeatherField::MinTemperature, temp - 5.0);
                rows.push(RawObservation::new(
                    *region,
                    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap() + chrono::Duration::days(d),
                    *lat,
                    *lon,
                    values,
                ));
            }
        }
        rows
    }

    #[test]
    fn test_stage_refuses_missing_input() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir);
        assert!(matches!(pipeline.process(), Err(PipelineError::Persistence(msg)) if msg.contains("fetch")));
        assert!(matches!(
            pipeline.train(Utc::now()),
            Err(PipelineError::Persistence(msg)) if msg.contains("process")
        ));
    }

    #[test]
    fn test_process_then_train_writes_every_artifact() -> Result<()> {
        let dir = TempDir::new()?;
        let pipeline = pipeline(&dir);
        pipeline
            .store()
            .write(RAW_SERIES_ARTIFACT, &write_raw_series(&raw_rows())?)?;

        let processed = pipeline.process()?;
        assert_eq!(processed.missing_before.missing(WeatherField::Temperature), 2);
        assert_eq!(processed.missing_after.missing(WeatherField::Temperature), 0);

        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap();
        let trained = pipeline.train(now)?;
        assert_eq!(trained.label.labeled_rows, 14);
        assert_eq!(trained.encoded_regions, 2);

        for name in [
            CLEANED_SERIES_ARTIFACT,
            INTERPOLATED_SERIES_ARTIFACT,
            LABELED_SERIES_ARTIFACT,
            ENCODED_SERIES_ARTIFACT,
            ENCODER_ARTIFACT,
            MODEL_ARTIFACT,
        ] {
            assert!(pipeline.store().exists(name), "{} missing", name);
        }

        let context = pipeline.inference_context()?;
        assert_eq!(context.model().run_id, trained.artifact.run_id);
        assert_eq!(context.encoder().run_id, trained.artifact.run_id);

        let samples = pipeline.sample(3, 42)?;
        assert_eq!(samples.len(), 3);
        Ok(())
    }

    #[test]
    fn test_from_config_applies_parquet_settings() -> Result<()> {
        use parquet::basic::Compression;
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let dir = TempDir::new()?;
        let mut config = PipelineConfig::default();
        config.store_dir = dir.path().to_path_buf();
        config.processing.compression = "brotli9000".to_string();
        assert!(matches!(
            Pipeline::from_config(config.clone()),
            Err(PipelineError::Config(_))
        ));

        config.processing.compression = "gzip".to_string();
        config.processing.row_group_size = 4;
        let pipeline = Pipeline::from_config(config)?;
        pipeline
            .store()
            .write(RAW_SERIES_ARTIFACT, &write_raw_series(&raw_rows())?)?;
        let processed = pipeline.process()?;

        let reader = SerializedFileReader::new(bytes::Bytes::from(
            pipeline.store().read(CLEANED_SERIES_ARTIFACT)?,
        ))?;
        let metadata = reader.metadata();
        assert_eq!(
            metadata.num_row_groups(),
            processed.clean.output_rows.div_ceil(4)
        );
        assert!(matches!(
            metadata.row_group(0).column(0).compression(),
            Compression::GZIP(_)
        ));
        Ok(())
    }

    #[test]
    fn test_gated_training_persists_nothing() -> Result<()> {
        let dir = TempDir::new()?;
        let mut pipeline = pipeline(&dir);
        pipeline.config.training.min_r2 = Some(2.0);
        pipeline
            .store()
            .write(RAW_SERIES_ARTIFACT, &write_raw_series(&raw_rows())?)?;
        pipeline.process()?;

        let result = pipeline.train(Utc::now());
        assert!(matches!(result, Err(PipelineError::DataQuality(_))));
        assert!(!pipeline.store().exists(MODEL_ARTIFACT));
        assert!(!pipeline.store().exists(ENCODER_ARTIFACT));
        Ok(())
    }
}
