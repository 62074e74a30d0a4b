pub mod source_json;
pub mod writer;

pub use source_json::{feature_summary, FeatureSummary, JsonSourceReader};
pub use writer::AnvilRegionWriter;
