pub mod client;
pub mod ingestor;
pub mod merge;
pub mod retry;
pub mod watermark;

pub use client::PowerClient;
pub use ingestor::{FetchOutcome, IngestReport, Ingestor};
pub use merge::merge_series;
pub use retry::RetryPolicy;
pub use watermark::{find_resume_watermark, plan_fetch_window, FetchPlan, ResumePoint};
