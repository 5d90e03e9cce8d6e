use crate::error::{PipelineError, Result};
use crate::models::{Observation, WeatherField};

const LATITUDE_FEATURE: &str = "latitude";
const LONGITUDE_FEATURE: &str = "longitude";
const REGION_CODE_FEATURE: &str = "region_code";

/// Range features derived from a max/min pair on the same row
const DERIVED_RANGES: [(&str, WeatherField, WeatherField); 3] = [
    (
        "temp_range",
        WeatherField::MaxTemperature,
        WeatherField::MinTemperature,
    ),
    (
        "wind_range_10m",
        WeatherField::MaxWindSpeed10m,
        WeatherField::MinWindSpeed10m,
    ),
    (
        "wind_range_50m",
        WeatherField::MaxWindSpeed50m,
        WeatherField::MinWindSpeed50m,
    ),
];

/// Fixed feature order shared by training and inference.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::current()
    }
}

impl FeatureSchema {
    pub fn current() -> Self {
        let mut names = vec![LATITUDE_FEATURE.to_string(), LONGITUDE_FEATURE.to_string()];
        names.extend(WeatherField::ALL.iter().map(|f| f.column_name().to_string()));
        names.extend(DERIVED_RANGES.iter().map(|(name, _, _)| name.to_string()));
        names.push(REGION_CODE_FEATURE.to_string());
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Fail unless `persisted` names the same features in the same order
    pub fn verify(&self, persisted: &[String]) -> Result<()> {
        if persisted.len() != self.names.len() {
            return Err(PipelineError::SchemaMismatch(format!(
                "model expects {} features, pipeline builds {}",
                persisted.len(),
                self.names.len()
            )));
        }
        if let Some((idx, (expected, actual))) = persisted
            .iter()
            .zip(&self.names)
            .enumerate()
            .find(|(_, (a, b))| a != b)
        {
            return Err(PipelineError::SchemaMismatch(format!(
                "feature {} is '{}' in the model but '{}' in the pipeline",
                idx, expected, actual
            )));
        }
        Ok(())
    }

    /// Build the feature vector for one row.
    ///
    /// Every input must be present; a gap is reported, never defaulted.
    pub fn assemble(&self, observation: &Observation, region_code: u32) -> Result<Vec<f64>> {
        let mut features = Vec::with_capacity(self.names.len());
        features.push(observation.latitude);
        features.push(observation.longitude);

        for field in WeatherField::ALL {
            features.push(required(observation, field)?);
        }
        for (_, max_field, min_field) in DERIVED_RANGES {
            features.push(required(observation, max_field)? - required(observation, min_field)?);
        }
        features.push(f64::from(region_code));

        Ok(features)
    }
}

fn required(observation: &Observation, field: WeatherField) -> Result<f64> {
    observation
        .get(field)
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            PipelineError::DataQuality(format!(
                "{} on {} has no {} value",
                observation.region, observation.date, field
            ))
        })
}
