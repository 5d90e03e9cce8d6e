use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("Data quality error: {0}")]
    DataQuality(String),

    #[error("Unknown region '{region}': not in the fitted encoder vocabulary")]
    UnknownEntity { region: String },

    #[error("No historical data for region '{region}'")]
    NoHistoricalData { region: String },

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Model error: {0}")]
    Model(#[from] smartcore::error::Failed),
}

impl PipelineError {
    /// True for errors that belong to a single region's unit of work and
    /// should be logged and skipped rather than abort the batch.
    pub fn is_per_region(&self) -> bool {
        matches!(
            self,
            PipelineError::InputValidation(_)
                | PipelineError::Upstream(_)
                | PipelineError::Http(_)
                | PipelineError::DataQuality(_)
        )
    }
}
