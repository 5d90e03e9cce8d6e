use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{PipelineError, Result};
use crate::models::{EncodedObservation, LabeledObservation};

/// Fitted region name <-> integer code bijection.
///
/// Codes follow lexicographic order of the fitted vocabulary, so a class
/// list fully determines the mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEncoder {
    pub run_id: String,
    pub fitted_at: DateTime<Utc>,
    classes: Vec<String>,
}

impl RegionEncoder {
    pub fn fit<I, S>(regions: I, run_id: impl Into<String>, fitted_at: DateTime<Utc>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: BTreeSet<String> = regions
            .into_iter()
            .map(|r| r.as_ref().trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if classes.is_empty() {
            return Err(PipelineError::DataQuality(
                "Cannot fit region encoder on an empty vocabulary".to_string(),
            ));
        }
        if u32::try_from(classes.len()).is_err() {
            return Err(PipelineError::DataQuality(format!(
                "Region vocabulary too large: {}",
                classes.len()
            )));
        }

        Ok(Self {
            run_id: run_id.into(),
            fitted_at,
            classes: classes.into_iter().collect(),
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn contains(&self, region: &str) -> bool {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(region))
            .is_ok()
    }

    pub fn encode(&self, region: &str) -> Result<u32> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(region))
            .map(|idx| idx as u32)
            .map_err(|_| PipelineError::UnknownEntity {
                region: region.to_string(),
            })
    }

    pub fn decode(&self, code: u32) -> Result<&str> {
        self.classes
            .get(code as usize)
            .map(String::as_str)
            .ok_or_else(|| PipelineError::UnknownEntity {
                region: format!("#{}", code),
            })
    }

    pub fn encode_rows(&self, labeled: Vec<LabeledObservation>) -> Result<Vec<EncodedObservation>> {
        labeled
            .into_iter()
            .map(|row| {
                let region_code = self.encode(&row.observation.region)?;
                Ok(EncodedObservation {
                    labeled: row,
                    region_code,
                })
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse a persisted table, rejecting one whose classes are not a
    /// sorted, duplicate-free list.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let encoder: RegionEncoder = serde_json::from_slice(bytes)?;
        let ordered = encoder.classes.windows(2).all(|pair| pair[0] < pair[1]);
        if !ordered || encoder.classes.is_empty() {
            return Err(PipelineError::Persistence(
                "Region encoder classes must be non-empty, sorted and unique".to_string(),
            ));
        }
        Ok(encoder)
    }
}
