pub mod dedup;
pub mod fetcher;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod sources;
pub mod store;
pub mod types;

pub use dedup::{dedupe, DEFAULT_LOOKBACK_DAYS};
pub use fetcher::Fetcher;
pub use pipeline::IngestPipeline;
pub use store::{DraftStore, StoreStats, DEFAULT_DATA_DIR};
pub use types::*;
