use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub region: String,
    pub date: NaiveDate,
    pub actual: Option<f64>,
    pub predicted: f64,
}

impl PredictionRecord {
    pub fn absolute_error(&self) -> Option<f64> {
        self.actual.map(|actual| (actual - self.predicted).abs())
    }
}

/// Answer to a by-name or by-coordinate query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPrediction {
    pub region_used: String,
    /// Date of the most recent row the prediction was built from
    pub based_on: NaiveDate,
    pub predicted_value: f64,
    /// Degree-space distance from the query point, for coordinate queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}
