use metroblock_common::types::CHUNKS_PER_REGION;
use metroblock_common::{ConvertError, RegionPos, Result};
use metroblock_world::{Chunk, Region};
use std::collections::BTreeMap;

/// Groups sealed chunks into regions.
#[derive(Debug, Default)]
pub struct RegionAssembler {
    regions: BTreeMap<RegionPos, Region>,
}

impl RegionAssembler {
    pub fn new() -> Self {
        RegionAssembler::default()
    }

    /// Files a chunk under its region. Returns the region once all of its
    /// slots are filled.
    pub fn insert(&mut self, chunk: Chunk) -> Result<Option<Region>> {
        let pos = chunk.pos().region();
        let region = self
            .regions
            .entry(pos)
            .or_insert_with(|| Region::new(pos));
        region.insert(chunk)?;

        if region.is_full() {
            Ok(self.regions.remove(&pos))
        } else {
            Ok(None)
        }
    }

    pub fn chunk_count(&self, pos: RegionPos) -> usize {
        self.regions.get(&pos).map_or(0, Region::chunk_count)
    }

    /// Takes a region out. With `end_of_input` the missing slots stay empty;
    /// without it a region with missing slots is an error.
    pub fn finish(&mut self, pos: RegionPos, end_of_input: bool) -> Result<Region> {
        let filled = self.chunk_count(pos);
        if !end_of_input && filled < CHUNKS_PER_REGION {
            return Err(ConvertError::IncompleteRegion {
                region: pos,
                pending: CHUNKS_PER_REGION - filled,
            });
        }
        Ok(self.regions.remove(&pos).unwrap_or_else(|| Region::new(pos)))
    }
}
