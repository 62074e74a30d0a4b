use crate::chunk::Chunk;
use crate::level::LevelInfo;
use metroblock_common::types::CHUNKS_PER_REGION;
use metroblock_common::{ConvertError, RegionPos, Result};
use metroblock_nbt::AnvilRegion;

/// A 32×32 grid of chunk slots. Empty slots are left to the game's generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pos: RegionPos,
    chunks: Vec<Option<Chunk>>,
}

impl Region {
    pub fn new(pos: RegionPos) -> Self {
        Region {
            pos,
            chunks: vec![None; CHUNKS_PER_REGION],
        }
    }

    pub fn pos(&self) -> RegionPos {
        self.pos
    }

    pub fn insert(&mut self, chunk: Chunk) -> Result<()> {
        let chunk_pos = chunk.pos();
        if chunk_pos.region() != self.pos {
            return Err(ConvertError::Pipeline(format!(
                "{} does not belong to region {}",
                chunk_pos, self.pos
            )));
        }
        let slot = &mut self.chunks[chunk_pos.region_index()];
        if slot.is_some() {
            return Err(ConvertError::Pipeline(format!(
                "{} inserted twice into region {}",
                chunk_pos, self.pos
            )));
        }
        *slot = Some(chunk);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index).and_then(Option::as_ref)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().flatten()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks().count()
    }

    pub fn defaulted_count(&self) -> usize {
        self.chunks().filter(|c| c.flags().defaulted).count()
    }

    pub fn is_full(&self) -> bool {
        self.chunks.iter().all(Option::is_some)
    }

    /// Region file contents: every present chunk document in its slot.
    pub fn to_anvil(&self) -> Result<AnvilRegion> {
        let mut anvil = AnvilRegion::new();
        for (index, chunk) in self.chunks.iter().enumerate() {
            if let Some(chunk) = chunk {
                anvil
                    .insert(index, chunk.to_nbt())
                    .map_err(|e| ConvertError::Pipeline(format!("{}: {}", self.pos, e)))?;
            }
        }
        Ok(anvil)
    }
}

/// Destination for sealed regions.
pub trait RegionWriter: Send + Sync {
    /// Persists one region. Failures are reported as `DestinationWrite`.
    fn write_region(&self, region: Region) -> Result<()>;

    /// Called once after the last region with the world metadata.
    fn finish(&self, _level: &LevelInfo) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::blocks;
    use crate::chunk::ChunkFlags;
    use crate::column::BlockColumn;
    use assert_matches::assert_matches;
    use metroblock_common::ChunkPos;
    use metroblock_nbt::Tag;

    fn chunk(x: i32, z: i32) -> Chunk {
        let columns = vec![BlockColumn::new(0, 16, &blocks::STONE); 256];
        Chunk::seal(
            ChunkPos::new(x, z),
            &columns,
            "minecraft:plains",
            ChunkFlags::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_insert_into_slot() {
        let mut region = Region::new(RegionPos::new(-1, 0));
        region.insert(chunk(-1, 3)).unwrap();
        assert_eq!(region.chunk_count(), 1);
        assert_eq!(region.get(3 * 32 + 31).map(Chunk::pos), Some(ChunkPos::new(-1, 3)));
        assert!(!region.is_full());
    }

    #[test]
    fn test_insert_rejects_foreign_and_duplicate() {
        let mut region = Region::new(RegionPos::new(0, 0));
        assert_matches!(region.insert(chunk(32, 0)), Err(ConvertError::Pipeline(_)));
        region.insert(chunk(1, 1)).unwrap();
        assert_matches!(region.insert(chunk(1, 1)), Err(ConvertError::Pipeline(_)));
    }

    #[test]
    fn test_anvil_slots_follow_chunk_positions() {
        let mut region = Region::new(RegionPos::new(0, 0));
        region.insert(chunk(5, 0)).unwrap();
        region.insert(chunk(0, 1)).unwrap();
        let anvil = region.to_anvil().unwrap();
        assert_eq!(anvil.len(), 2);
        assert_eq!(
            anvil.get(32).and_then(|c| c.get("zPos")).and_then(Tag::as_i32),
            Some(1)
        );
        assert_eq!(
            anvil.get(5).and_then(|c| c.get("xPos")).and_then(Tag::as_i32),
            Some(5)
        );
        assert!(anvil.get(1).is_none());
    }
}
