pub mod parquet_codec;
pub mod raw_csv;
pub mod store;

pub use parquet_codec::ParquetCodec;
pub use raw_csv::{read_raw_series, write_raw_series, RawSeries};
pub use store::{ArtifactStore, FsArtifactStore};
