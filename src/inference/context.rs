use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};
use crate::models::{EncodedObservation, GeoIndex, Observation, PredictionRecord, RegionPrediction};
use crate::processors::RegionEncoder;
use crate::storage::{ArtifactStore, ParquetCodec};
use crate::training::{FeatureSchema, ModelArtifact};
use crate::utils::constants::{ENCODER_ARTIFACT, INTERPOLATED_SERIES_ARTIFACT, MODEL_ARTIFACT};
use crate::utils::validate_coordinates;

/// Everything a prediction needs, loaded once and shared read-only.
///
/// Holds a matched model/encoder pair, the most recent interpolated row of
/// every region, and the coordinate table used for nearest-region lookups.
#[derive(Debug)]
pub struct InferenceContext {
    model: ModelArtifact,
    encoder: RegionEncoder,
    schema: FeatureSchema,
    latest: BTreeMap<String, Observation>,
    geo: GeoIndex,
}

impl InferenceContext {
    pub fn new(
        model: ModelArtifact,
        encoder: RegionEncoder,
        series: &[Observation],
        geo: GeoIndex,
    ) -> Result<Self> {
        model.check_encoder(&encoder)?;
        // Every coordinate resolution must land on a region the encoder knows
        let unencoded: Vec<&str> = geo.regions().filter(|r| !encoder.contains(r)).collect();
        if !unencoded.is_empty() {
            return Err(PipelineError::SchemaMismatch(format!(
                "geo index regions missing from encoder {}: {}",
                encoder.run_id,
                unencoded.join(", ")
            )));
        }
        let schema = FeatureSchema::current();
        schema.verify(&model.feature_names)?;

        Ok(Self {
            model,
            encoder,
            schema,
            latest: latest_rows(series),
            geo,
        })
    }

    /// Load the stable model, encoder and interpolated series from `store`.
    pub fn load(store: &dyn ArtifactStore, geo: GeoIndex) -> Result<Self> {
        for name in [MODEL_ARTIFACT, ENCODER_ARTIFACT] {
            if !store.exists(name) {
                return Err(PipelineError::ModelUnavailable(format!(
                    "{} not found; run `weatherwave train` first",
                    name
                )));
            }
        }
        if !store.exists(INTERPOLATED_SERIES_ARTIFACT) {
            return Err(PipelineError::Persistence(format!(
                "{} not found; run `weatherwave process` first",
                INTERPOLATED_SERIES_ARTIFACT
            )));
        }

        let model = ModelArtifact::from_json(&store.read(MODEL_ARTIFACT)?)?;
        let encoder = RegionEncoder::from_json(&store.read(ENCODER_ARTIFACT)?)?;
        let series = ParquetCodec::new().decode_observations(store.read(INTERPOLATED_SERIES_ARTIFACT)?)?;
        tracing::info!(
            "Loaded model {} ({} regions, {} series rows)",
            model.run_id,
            encoder.len(),
            series.len()
        );

        Self::new(model, encoder, &series, geo)
    }

    pub fn model(&self) -> &ModelArtifact {
        &self.model
    }

    pub fn encoder(&self) -> &RegionEncoder {
        &self.encoder
    }

    pub fn latest_row(&self, region: &str) -> Option<&Observation> {
        self.latest.get(region)
    }

    pub fn predict_by_name(&self, region: &str) -> Result<RegionPrediction> {
        let region = region.trim();
        if region.is_empty() {
            return Err(PipelineError::InputValidation(
                "Region name must not be empty".to_string(),
            ));
        }

        let code = self.encoder.encode(region)?;
        let row = self
            .latest
            .get(region)
            .ok_or_else(|| PipelineError::NoHistoricalData {
                region: region.to_string(),
            })?;
        let features = self.schema.assemble(row, code)?;
        let predicted_value = self.model.predict(&features)?;

        tracing::debug!("Predicted {:.2} for {} from {}", predicted_value, region, row.date);
        Ok(RegionPrediction {
            region_used: region.to_string(),
            based_on: row.date,
            predicted_value,
            distance: None,
        })
    }

    /// Resolve the nearest region in degree space, then predict for it.
    pub fn predict_by_coordinate(&self, latitude: f64, longitude: f64) -> Result<RegionPrediction> {
        validate_coordinates(latitude, longitude)?;
        let resolution = self
            .geo
            .nearest(latitude, longitude)
            .ok_or_else(|| PipelineError::Config("Geo index has no regions".to_string()))?;
        tracing::debug!(
            "({}, {}) resolved to {} at distance {:.4}",
            latitude,
            longitude,
            resolution.location.region,
            resolution.distance
        );

        let mut prediction = self.predict_by_name(&resolution.location.region)?;
        prediction.distance = Some(resolution.distance);
        Ok(prediction)
    }

    /// Predict `n` seeded-sampled encoded rows and pair each with its actual target.
    pub fn backtest(&self, rows: &[EncodedObservation], n: usize, seed: u64) -> Result<Vec<PredictionRecord>> {
        let mut rng = StdRng::seed_from_u64(seed);
        rows.choose_multiple(&mut rng, n)
            .map(|row| {
                let observation = row.observation();
                let code = self.encoder.encode(&observation.region)?;
                let features = self.schema.assemble(observation, code)?;
                Ok(PredictionRecord {
                    region: observation.region.clone(),
                    date: observation.date,
                    actual: Some(row.target()),
                    predicted: self.model.predict(&features)?,
                })
            })
            .collect()
    }
}

fn latest_rows(series: &[Observation]) -> BTreeMap<String, Observation> {
    let mut latest: BTreeMap<String, Observation> = BTreeMap::new();
    for row in series {
        match latest.get(&row.region) {
            Some(current) if current.date >= row.date => {}
            _ => {
                latest.insert(row.region.clone(), row.clone());
            }
        }
    }
    latest
}
