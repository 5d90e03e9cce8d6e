pub mod features;
pub mod forest;
pub mod metrics;
pub mod split;
pub mod trainer;

pub use features::FeatureSchema;
pub use forest::{feature_matrix, ForestParams, TemperatureForest};
pub use metrics::{mae, r2};
pub use split::{train_test_split, DatasetSplit};
pub use trainer::{ModelArtifact, ModelMetrics, Trainer, TrainingOutcome};
