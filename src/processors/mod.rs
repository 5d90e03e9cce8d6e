pub mod cleaner;
pub mod encoder;
pub mod interpolator;
pub mod quality;
pub mod target;

pub use cleaner::{clean, clean_observations, CleanReport};
pub use encoder::RegionEncoder;
pub use interpolator::{InterpolationReport, Interpolator};
pub use quality::MissingValueReport;
pub use target::{filter_recent_years, label_next_day, LabelReport};
