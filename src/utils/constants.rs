/// Artifact names inside the store container
pub const RAW_SERIES_ARTIFACT: &str = "raw_data.csv";
pub const CLEANED_SERIES_ARTIFACT: &str = "raw_data_processed.parquet";
pub const INTERPOLATED_SERIES_ARTIFACT: &str = "raw_data_interpolated.parquet";
pub const LABELED_SERIES_ARTIFACT: &str = "labeled.parquet";
pub const ENCODED_SERIES_ARTIFACT: &str = "encoded.parquet";
pub const ENCODER_ARTIFACT: &str = "label_encoder.json";
pub const MODEL_ARTIFACT: &str = "weather_model.json";
pub const MODEL_VERSIONS_PREFIX: &str = "models";

/// Upstream source
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://power.larc.nasa.gov";
pub const UPSTREAM_DAILY_POINT_PATH: &str = "/api/temporal/daily/point";
pub const UPSTREAM_COMMUNITY: &str = "ag";
pub const UPSTREAM_DATE_FORMAT: &str = "%Y%m%d";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_SECS: u64 = 2;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1000;

/// Out-of-band markers the upstream uses for "no data"
pub const SENTINEL_VALUES: [f64; 2] = [-999.0, 999.0];

/// Watermark
pub const DEFAULT_QUORUM_THRESHOLD: f64 = 0.70;
pub const DEFAULT_EPOCH_START: (i32, u32, u32) = (2010, 1, 1);

/// Windowing
pub const DEFAULT_WINDOW_YEARS: i32 = 10;

/// Training defaults
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_N_TREES: usize = 100;
pub const DEFAULT_MAX_DEPTH: usize = 16;
pub const DEFAULT_MIN_SAMPLES_LEAF: usize = 1;
pub const MODEL_FORMAT_VERSION: u32 = 2;

/// Parquet defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const DEFAULT_COMPRESSION: &str = "snappy";
