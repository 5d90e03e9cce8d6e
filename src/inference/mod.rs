pub mod context;

pub use context::InferenceContext;
