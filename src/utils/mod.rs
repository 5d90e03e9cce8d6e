pub mod constants;
pub mod coordinates;
pub mod filename;
pub mod progress;

pub use constants::*;
pub use coordinates::{degree_distance, validate_coordinates};
pub use filename::{generate_run_id, versioned_model_name};
pub use progress::ProgressReporter;
