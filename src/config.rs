use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::utils::constants::*;

pub const ENV_PREFIX: &str = "WEATHERWAVE";
pub const DEFAULT_CONFIG_FILE: &str = "weatherwave.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory acting as the artifact container
    pub store_dir: PathBuf,
    /// Optional JSON override for the district coordinate table
    pub geo_index_path: Option<PathBuf>,
    pub upstream: UpstreamConfig,
    pub processing: ProcessingConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
    pub request_delay_ms: u64,
    pub max_concurrent_fetches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub window_years: i32,
    pub quorum_threshold: f64,
    pub epoch_start: NaiveDate,
    /// Parquet codec for the processed tables: snappy, gzip, lz4, zstd or none
    pub compression: String,
    pub row_group_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Refuse to persist a model scoring below this R²
    pub min_r2: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("ml-files"),
            geo_index_path: None,
            upstream: UpstreamConfig::default(),
            processing: ProcessingConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            max_concurrent_fetches: 1,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        let (y, m, d) = DEFAULT_EPOCH_START;
        Self {
            window_years: DEFAULT_WINDOW_YEARS,
            quorum_threshold: DEFAULT_QUORUM_THRESHOLD,
            epoch_start: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
            compression: DEFAULT_COMPRESSION.to_string(),
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SEED,
            n_trees: DEFAULT_N_TREES,
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_leaf: DEFAULT_MIN_SAMPLES_LEAF,
            min_r2: None,
        }
    }
}

impl PipelineConfig {
    /// Defaults, then the optional file, then `WEATHERWAVE__*` environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let settings = config::Config::builder()
            .add_source(config::File::from(file).required(path.is_some()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: PipelineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let upstream = &self.upstream;
        if upstream.max_attempts == 0 {
            return Err(PipelineError::Config(
                "upstream.max_attempts must be at least 1".to_string(),
            ));
        }
        if upstream.max_concurrent_fetches == 0 {
            return Err(PipelineError::Config(
                "upstream.max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if upstream.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "upstream.timeout_secs must be positive".to_string(),
            ));
        }

        let processing = &self.processing;
        if !(processing.quorum_threshold > 0.0 && processing.quorum_threshold <= 1.0) {
            return Err(PipelineError::Config(format!(
                "processing.quorum_threshold must be in (0, 1], got {}",
                processing.quorum_threshold
            )));
        }
        if processing.window_years < 1 {
            return Err(PipelineError::Config(format!(
                "processing.window_years must be at least 1, got {}",
                processing.window_years
            )));
        }
        if processing.row_group_size == 0 {
            return Err(PipelineError::Config(
                "processing.row_group_size must be positive".to_string(),
            ));
        }

        let training = &self.training;
        if !(training.test_fraction > 0.0 && training.test_fraction < 1.0) {
            return Err(PipelineError::Config(format!(
                "training.test_fraction must be in (0, 1), got {}",
                training.test_fraction
            )));
        }
        if training.n_trees == 0 || training.max_depth == 0 || training.min_samples_leaf == 0 {
            return Err(PipelineError::Config(
                "training.n_trees, max_depth and min_samples_leaf must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
