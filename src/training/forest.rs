use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::{PipelineError, Result};
use crate::utils::constants::{DEFAULT_MAX_DEPTH, DEFAULT_MIN_SAMPLES_LEAF, DEFAULT_N_TREES, DEFAULT_SEED};

type ForestModel = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_N_TREES,
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_leaf: DEFAULT_MIN_SAMPLES_LEAF,
            seed: DEFAULT_SEED,
        }
    }
}

impl ForestParams {
    /// Every feature is a split candidate, as in a regression forest's default.
    fn to_smartcore(self, n_features: usize) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters::default()
            .with_n_trees(self.n_trees)
            .with_max_depth(u16::try_from(self.max_depth).unwrap_or(u16::MAX))
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_m(n_features)
            .with_seed(self.seed)
    }
}

/// Row-major feature rows as a dense matrix; rows must be non-empty,
/// rectangular and finite.
pub fn feature_matrix(rows: &[Vec<f64>]) -> Result<DenseMatrix<f64>> {
    let Some(first) = rows.first() else {
        return Err(PipelineError::DataQuality(
            "Feature matrix needs at least one row".to_string(),
        ));
    };
    let n_features = first.len();
    if n_features == 0 {
        return Err(PipelineError::SchemaMismatch(
            "Feature rows are empty".to_string(),
        ));
    }
    if let Some(row) = rows.iter().position(|r| r.len() != n_features) {
        return Err(PipelineError::SchemaMismatch(format!(
            "row {} has {} features, expected {}",
            row,
            rows[row].len(),
            n_features
        )));
    }
    if rows.iter().flatten().any(|v| !v.is_finite()) {
        return Err(PipelineError::DataQuality(
            "Feature rows contain non-finite values".to_string(),
        ));
    }
    Ok(DenseMatrix::from_2d_vec(&rows.to_vec()))
}

/// Bagged regression forest over the fixed feature layout.
#[derive(Serialize, Deserialize)]
pub struct TemperatureForest {
    n_features: usize,
    params: ForestParams,
    model: ForestModel,
}

impl std::fmt::Debug for TemperatureForest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemperatureForest")
            .field("n_features", &self.n_features)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl TemperatureForest {
    /// Fit on a prepared matrix. The bootstrap draws come from `params.seed`,
    /// so equal inputs give equal forests.
    pub fn fit(x: &DenseMatrix<f64>, y: &Vec<f64>, params: ForestParams) -> Result<Self> {
        let (n_rows, n_features) = x.shape();
        if n_rows == 0 || n_rows != y.len() {
            return Err(PipelineError::DataQuality(format!(
                "Training needs matching, non-empty inputs ({} rows, {} targets)",
                n_rows,
                y.len()
            )));
        }
        if params.n_trees == 0 || params.max_depth == 0 || params.min_samples_leaf == 0 {
            return Err(PipelineError::Config(
                "n_trees, max_depth and min_samples_leaf must be positive".to_string(),
            ));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::DataQuality(
                "Training targets contain non-finite values".to_string(),
            ));
        }

        let model = RandomForestRegressor::fit(x, y, params.to_smartcore(n_features))?;
        tracing::debug!(
            "Fitted {} trees on {} rows x {} features",
            params.n_trees,
            n_rows,
            n_features
        );

        Ok(Self {
            n_features,
            params,
            model,
        })
    }

    /// Validate and convert row-major input, then fit.
    pub fn fit_rows(x: &[Vec<f64>], y: &[f64], params: ForestParams) -> Result<Self> {
        Self::fit(&feature_matrix(x)?, &y.to_vec(), params)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// The vector length must match training; it is never padded.
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.n_features {
            return Err(PipelineError::SchemaMismatch(format!(
                "expected {} features, got {}",
                self.n_features,
                features.len()
            )));
        }
        let predicted = self.predict_matrix(&feature_matrix(&[features.to_vec()])?)?;
        predicted
            .first()
            .copied()
            .ok_or_else(|| PipelineError::ModelUnavailable("forest returned no prediction".to_string()))
    }

    pub fn predict_matrix(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>> {
        let (_, n_features) = x.shape();
        if n_features != self.n_features {
            return Err(PipelineError::SchemaMismatch(format!(
                "expected {} features, got {}",
                self.n_features, n_features
            )));
        }
        Ok(self.model.predict(x)?)
    }

    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        self.predict_matrix(&feature_matrix(rows)?)
    }
}
