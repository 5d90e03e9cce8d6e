use crate::utils::constants::{MODEL_ARTIFACT, MODEL_VERSIONS_PREFIX};
use chrono::{DateTime, Utc};

/// Generate a training run id with format: YYYYMMDDTHHMMSSmmmZ
pub fn generate_run_id(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

/// Versioned model artifact name: models/weather_model-{run_id}.json
pub fn versioned_model_name(run_id: &str) -> String {
    let stem = MODEL_ARTIFACT.trim_end_matches(".json");
    format!("{}/{}-{}.json", MODEL_VERSIONS_PREFIX, stem, run_id)
}
