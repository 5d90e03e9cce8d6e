use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::features::FeatureSchema;
use super::forest::{feature_matrix, ForestParams, TemperatureForest};
use super::metrics::{mae, r2};
use super::split::train_test_split;
use crate::config::TrainingConfig;
use crate::error::{PipelineError, Result};
use crate::models::EncodedObservation;
use crate::processors::RegionEncoder;
use crate::storage::ArtifactStore;
use crate::utils::constants::{MODEL_ARTIFACT, MODEL_FORMAT_VERSION};
use crate::utils::versioned_model_name;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mae: f64,
    pub r2: f64,
    pub train_samples: usize,
    pub test_samples: usize,
}

/// Persisted model: the forest plus everything needed to check it is used
/// with the right encoder and feature layout.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub run_id: String,
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub encoder_run_id: String,
    pub metrics: ModelMetrics,
    pub forest: TemperatureForest,
}

impl ModelArtifact {
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)?;
        if artifact.format_version != MODEL_FORMAT_VERSION {
            return Err(PipelineError::SchemaMismatch(format!(
                "model format version {} is not supported (expected {})",
                artifact.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if artifact.feature_names.len() != artifact.forest.n_features() {
            return Err(PipelineError::SchemaMismatch(format!(
                "model lists {} feature names but was fitted on {}",
                artifact.feature_names.len(),
                artifact.forest.n_features()
            )));
        }
        Ok(artifact)
    }

    /// Fail unless `encoder` is the table this model was trained with
    pub fn check_encoder(&self, encoder: &RegionEncoder) -> Result<()> {
        if self.encoder_run_id != encoder.run_id {
            return Err(PipelineError::SchemaMismatch(format!(
                "model {} was trained with encoder {} but encoder {} is loaded",
                self.run_id, self.encoder_run_id, encoder.run_id
            )));
        }
        Ok(())
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        self.forest.predict(features)
    }

    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("=== Model ===\n");
        summary.push_str(&format!("Run: {}\n", self.run_id));
        summary.push_str(&format!("Trained at: {}\n", self.trained_at.to_rfc3339()));
        summary.push_str(&format!(
            "Forest: {} trees, max depth {}, {} features\n",
            self.forest.params().n_trees,
            self.forest.params().max_depth,
            self.feature_names.len()
        ));
        summary.push_str(&format!(
            "Samples: {} train / {} test\n",
            self.metrics.train_samples, self.metrics.test_samples
        ));
        summary.push_str(&format!("Mean Absolute Error (MAE): {:.2}\n", self.metrics.mae));
        summary.push_str(&format!("R-squared (R2) Score: {:.2}\n", self.metrics.r2));
        summary
    }
}

/// Result of a training run before persistence
#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    /// Examples dropped for a missing feature input
    pub incomplete_examples: usize,
}

pub struct Trainer {
    config: TrainingConfig,
    schema: FeatureSchema,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            schema: FeatureSchema::current(),
        }
    }

    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.config.n_trees,
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
            seed: self.config.seed,
        }
    }

    /// Split, fit, evaluate and apply the optional R² gate.
    pub fn train(
        &self,
        encoded: &[EncodedObservation],
        encoder: &RegionEncoder,
        run_id: &str,
        trained_at: DateTime<Utc>,
    ) -> Result<TrainingOutcome> {
        let mut examples: Vec<(Vec<f64>, f64)> = Vec::with_capacity(encoded.len());
        let mut incomplete_examples = 0;
        for row in encoded {
            match self.schema.assemble(row.observation(), row.region_code) {
                Ok(features) if row.target().is_finite() => examples.push((features, row.target())),
                Ok(_) | Err(PipelineError::DataQuality(_)) => incomplete_examples += 1,
                Err(e) => return Err(e),
            }
        }
        if incomplete_examples > 0 {
            tracing::warn!(
                "Dropped {} examples with missing feature values",
                incomplete_examples
            );
        }
        tracing::info!("Training on {} complete examples", examples.len());

        if examples.is_empty() {
            return Err(PipelineError::DataQuality(
                "No complete examples to train on".to_string(),
            ));
        }
        let (rows, targets): (Vec<Vec<f64>>, Vec<f64>) = examples.into_iter().unzip();
        let split = train_test_split(
            &feature_matrix(&rows)?,
            &targets,
            self.config.test_fraction,
            self.config.seed,
        )?;
        tracing::info!(
            "Data split into training ({} samples) and testing ({} samples)",
            split.y_train.len(),
            split.y_test.len()
        );

        let forest = TemperatureForest::fit(&split.x_train, &split.y_train, self.forest_params())?;
        let predicted = forest.predict_matrix(&split.x_test)?;
        let metrics = ModelMetrics {
            mae: mae(&split.y_test, &predicted),
            r2: r2(&split.y_test, &predicted),
            train_samples: split.y_train.len(),
            test_samples: split.y_test.len(),
        };
        tracing::info!("Model evaluation: MAE {:.3}, R2 {:.3}", metrics.mae, metrics.r2);

        if let Some(min_r2) = self.config.min_r2 {
            if !(metrics.r2 >= min_r2) {
                return Err(PipelineError::DataQuality(format!(
                    "R2 {:.3} is below the required {:.3}; model not persisted",
                    metrics.r2, min_r2
                )));
            }
        }

        Ok(TrainingOutcome {
            artifact: ModelArtifact {
                format_version: MODEL_FORMAT_VERSION,
                run_id: run_id.to_string(),
                trained_at,
                feature_names: self.schema.names().to_vec(),
                encoder_run_id: encoder.run_id.clone(),
                metrics,
                forest,
            },
            incomplete_examples,
        })
    }

    /// Write the model under its run-versioned name, then the stable name.
    pub fn persist(&self, artifact: &ModelArtifact, store: &dyn ArtifactStore) -> Result<()> {
        let bytes = artifact.to_json()?;
        let versioned = versioned_model_name(&artifact.run_id);
        store.write(&versioned, &bytes)?;
        store.write(MODEL_ARTIFACT, &bytes)?;
        tracing::info!("Trained model saved to {} and {}", MODEL_ARTIFACT, versioned);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabeledObservation, Observation, WeatherField, WeatherValues};
    use crate::storage::FsArtifactStore;
    use chrono::{NaiveDate, TimeZone};
    use tempfile::TempDir;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
    }

    fn encoded_rows(encoder: &RegionEncoder) -> Vec<EncodedObservation> {
        let mut rows = Vec::new();
        for (r, region) in encoder.classes().iter().enumerate() {
            for d in 0..30u32 {
                let temp = 10.0 + r as f64 * 5.0 + (d % 7) as f64;
                let values = WeatherField::ALL
                    .iter()
                    .fold(WeatherValues::new(), |v, f| v.with(*f, 1.0))
                    .with(WeatherField::Temperature, temp)
                    .with(WeatherField::MaxTemperature, temp + 4.0)
                    .with(WeatherField::MinTemperature, temp - 4.0);
                let observation = Observation {
                    region: region.clone(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(d as i64),
                    latitude: 27.0 + r as f64,
                    longitude: 85.0,
                    values,
                };
                rows.push(EncodedObservation {
                    labeled: LabeledObservation {
                        observation,
                        target: temp + 0.5,
                    },
                    region_code: encoder.encode(region).unwrap(),
                });
            }
        }
        rows
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            n_trees: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_train_and_persist_both_names() -> Result<()> {
        let encoder = RegionEncoder::fit(["Ilam", "Jhapa"], "enc-1", at())?;
        let mut rows = encoded_rows(&encoder);
        rows[0].labeled.observation.values.set(WeatherField::Pressure, None);

        let trainer = Trainer::new(small_config());
        let outcome = trainer.train(&rows, &encoder, "run-1", at())?;
        assert_eq!(outcome.incomplete_examples, 1);

        let artifact = &outcome.artifact;
        assert_eq!(artifact.encoder_run_id, "enc-1");
        assert_eq!(artifact.feature_names.len(), 21);
        assert_eq!(artifact.metrics.train_samples + artifact.metrics.test_samples, 59);
        assert!(artifact.metrics.mae.is_finite());

        let dir = TempDir::new()?;
        let store = FsArtifactStore::new(dir.path())?;
        trainer.persist(artifact, &store)?;
        assert!(store.exists(MODEL_ARTIFACT));
        assert!(store.exists("models/weather_model-run-1.json"));

        let stored = store.read(MODEL_ARTIFACT)?;
        let restored = ModelArtifact::from_json(&stored)?;
        assert_eq!(restored.run_id, artifact.run_id);
        assert_eq!(restored.metrics, artifact.metrics);
        assert_eq!(restored.to_json()?, stored);

        let features = FeatureSchema::current().assemble(rows[1].observation(), rows[1].region_code)?;
        assert_eq!(restored.predict(&features)?, artifact.predict(&features)?);
        Ok(())
    }

    #[test]
    fn test_quality_gate_blocks_weak_model() -> Result<()> {
        let encoder = RegionEncoder::fit(["Ilam", "Jhapa"], "enc-1", at())?;
        let rows = encoded_rows(&encoder);
        let config = TrainingConfig {
            min_r2: Some(1.5),
            ..small_config()
        };
        let result = Trainer::new(config).train(&rows, &encoder, "run-2", at());
        assert!(matches!(result, Err(PipelineError::DataQuality(_))));
        Ok(())
    }

    #[test]
    fn test_encoder_pairing_checked() -> Result<()> {
        let encoder = RegionEncoder::fit(["Ilam", "Jhapa"], "enc-1", at())?;
        let other = RegionEncoder::fit(["Ilam", "Jhapa"], "enc-2", at())?;
        let outcome = Trainer::new(small_config()).train(&encoded_rows(&encoder), &encoder, "run-3", at())?;

        assert!(outcome.artifact.check_encoder(&encoder).is_ok());
        assert!(matches!(
            outcome.artifact.check_encoder(&other),
            Err(PipelineError::SchemaMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn test_unknown_format_version_rejected() -> Result<()> {
        let encoder = RegionEncoder::fit(["Ilam", "Jhapa"], "enc-1", at())?;
        let mut artifact = Trainer::new(small_config())
            .train(&encoded_rows(&encoder), &encoder, "run-4", at())?
            .artifact;
        artifact.format_version = 99;
        let bytes = artifact.to_json()?;
        assert!(matches!(
            ModelArtifact::from_json(&bytes),
            Err(PipelineError::SchemaMismatch(_))
        ));
        Ok(())
    }
}
