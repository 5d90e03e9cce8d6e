use serde::{Deserialize, Serialize};

use super::Observation;

/// An interpolated row paired with the same region's next-row temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledObservation {
    pub observation: Observation,
    pub target: f64,
}

/// A labeled row carrying its region code from the fitted encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedObservation {
    pub labeled: LabeledObservation,
    pub region_code: u32,
}

impl EncodedObservation {
    pub fn observation(&self) -> &Observation {
        &self.labeled.observation
    }

    pub fn target(&self) -> f64 {
        self.labeled.target
    }
}
