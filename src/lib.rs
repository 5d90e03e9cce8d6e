pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod processors;
pub mod storage;
pub mod training;
pub mod utils;

pub use error::{PipelineError, Result};
