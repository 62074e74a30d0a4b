//! City simulation saves to block-based worlds.
//!
//! The pipeline lives in [`convert`]; [`world`] holds the block, chunk and
//! region model together with the source and writer contracts.

pub use metroblock_common as common;
pub use metroblock_convert as convert;
pub use metroblock_logger as logger;
pub use metroblock_nbt as nbt;
pub use metroblock_world as world;

// Re-export commonly used items
pub use metroblock_common::{ConvertError, Rect, Result};
pub use metroblock_convert::{ConversionConfig, ConversionReport, Converter, RegionOutcome};
pub use metroblock_logger::{log, LogSeverity};
pub use metroblock_world::{Region, RegionWriter, SourceReader};
