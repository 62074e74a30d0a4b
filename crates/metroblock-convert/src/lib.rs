pub mod assembler;
pub mod compositor;
pub mod config;
pub mod feature;
pub mod mapper;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod seam;
pub mod terrain;
mod worker;

pub use assembler::RegionAssembler;
pub use compositor::{ChunkCompositor, FinishedColumn, SeamContext};
pub use config::{Aggregation, ConversionConfig, ScaleFactor, StrataLayer, StrataProfile, WorldLimits};
pub use feature::{FeaturePlacer, RoadClaim, RoadSurface};
pub use mapper::CoordinateMapper;
pub use orchestrator::Converter;
pub use progress::{NoProgress, Phase, ProgressEvent, ProgressListener};
pub use report::{ConversionReport, RegionOutcome, RegionReport};
pub use seam::Priority;
pub use terrain::TerrainSynthesizer;
