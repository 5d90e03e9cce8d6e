use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::model_selection;

use crate::error::{PipelineError, Result};

pub struct DatasetSplit {
    pub x_train: DenseMatrix<f64>,
    pub x_test: DenseMatrix<f64>,
    pub y_train: Vec<f64>,
    pub y_test: Vec<f64>,
}

/// Rows the test side receives: `floor(n * test_fraction)`, computed the way
/// smartcore computes it.
fn test_rows(n: usize, test_fraction: f64) -> usize {
    ((n as f32) * (test_fraction as f32)) as usize
}

/// Seeded shuffle split. Both sides must keep at least one row; smartcore
/// panics on an empty test side, so that case is rejected first.
pub fn train_test_split(
    x: &DenseMatrix<f64>,
    y: &Vec<f64>,
    test_fraction: f64,
    seed: u64,
) -> Result<DatasetSplit> {
    let (n, _) = x.shape();
    if n != y.len() {
        return Err(PipelineError::SchemaMismatch(format!(
            "{} feature rows but {} targets",
            n,
            y.len()
        )));
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::Config(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }
    let n_test = test_rows(n, test_fraction);
    if n < 2 || n_test == 0 || n_test >= n {
        return Err(PipelineError::DataQuality(format!(
            "{} examples are too few to hold out {:.0}% for testing",
            n,
            test_fraction * 100.0
        )));
    }

    let (x_train, x_test, y_train, y_test) =
        model_selection::train_test_split(x, y, test_fraction as f32, true, Some(seed));
    Ok(DatasetSplit {
        x_train,
        x_test,
        y_train,
        y_test,
    })
}
