pub mod block;
pub mod chunk;
pub mod column;
pub mod level;
pub mod region;
pub mod source;

pub use block::{blocks, BlockState};
pub use chunk::{Chunk, ChunkFlags, ChunkSection};
pub use column::{BlockColumn, Stratum};
pub use level::LevelInfo;
pub use region::{Region, RegionWriter};
pub use source::{
    FeatureClass, FeatureInstance, FeatureKind, Footprint, InMemorySource, Network, Orientation,
    SourceCell, SourceDocument, SourceReader, SourceSnapshot, Species, Wealth, ZoneType,
};
