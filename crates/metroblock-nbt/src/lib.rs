//! Named binary tag codec used for chunk and level documents, and the
//! Anvil region container that stores chunk documents on disk.
//!
//! Compounds keep their keys in a `BTreeMap`, so encoding the same tag twice
//! always yields the same bytes.

mod codec;
mod file;
pub mod region;
mod tag;

pub use file::NbtFile;
pub use region::AnvilRegion;
pub use tag::{Compound, Tag};
