use crate::block::{blocks, BlockState};
use crate::column::BlockColumn;
use crate::level::DATA_VERSION;
use metroblock_common::types::COLUMNS_PER_CHUNK;
use metroblock_common::{ChunkPos, ConvertError, Result};
use metroblock_nbt::Tag;
use std::collections::HashMap;

pub const SECTION_HEIGHT: i32 = 16;
const BLOCKS_PER_SECTION: usize = 16 * 16 * 16;
const MIN_BITS_PER_BLOCK: u32 = 4;

/// Generation flags carried with a sealed chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkFlags {
    /// The chunk was substituted with flat default terrain
    pub defaulted: bool,
}

/// Bits needed to store `count` distinct values, never below `min`.
fn bits_for(count: usize, min: u32) -> u32 {
    let needed = usize::BITS - count.saturating_sub(1).leading_zeros();
    needed.max(min)
}

/// Packs values into longs without letting an entry straddle two longs.
fn pack(values: &[u32], bits: u32) -> Vec<i64> {
    let per_long = (64 / bits) as usize;
    let mut longs = vec![0u64; values.len().div_ceil(per_long)];
    for (i, value) in values.iter().enumerate() {
        let offset = (i % per_long) as u32 * bits;
        longs[i / per_long] |= (*value as u64) << offset;
    }
    longs.into_iter().map(|l| l as i64).collect()
}

fn unpack(longs: &[i64], bits: u32, index: usize) -> u32 {
    let per_long = (64 / bits) as usize;
    let offset = (index % per_long) as u32 * bits;
    let mask = (1u64 << bits) - 1;
    ((longs[index / per_long] as u64 >> offset) & mask) as u32
}

/// A 16×16×16 cube of blocks in palette form. Blocks are indexed
/// `y * 256 + z * 16 + x`; palette entries are kept in first-appearance order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSection {
    y: i32,
    block_count: u16,
    palette: Vec<BlockState>,
    bits_per_block: u32,
    data: Vec<i64>,
}

impl ChunkSection {
    fn from_states(y: i32, states: &[&BlockState]) -> Self {
        let mut palette: Vec<BlockState> = Vec::new();
        let mut state_to_index: HashMap<&BlockState, u32> = HashMap::new();
        let mut indices = Vec::with_capacity(states.len());
        let mut block_count = 0u16;

        for state in states {
            let index = *state_to_index.entry(*state).or_insert_with(|| {
                palette.push((*state).clone());
                (palette.len() - 1) as u32
            });
            if !state.is_air() {
                block_count += 1;
            }
            indices.push(index);
        }

        let (bits_per_block, data) = if palette.len() <= 1 {
            (0, Vec::new())
        } else {
            let bits = bits_for(palette.len(), MIN_BITS_PER_BLOCK);
            (bits, pack(&indices, bits))
        };

        ChunkSection {
            y,
            block_count,
            palette,
            bits_per_block,
            data,
        }
    }

    /// Section index along y (world y divided by 16).
    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn block_count(&self) -> u16 {
        self.block_count
    }

    pub fn palette(&self) -> &[BlockState] {
        &self.palette
    }

    pub fn bits_per_block(&self) -> u32 {
        self.bits_per_block
    }

    pub fn data(&self) -> &[i64] {
        &self.data
    }

    pub fn get_block_state_at(&self, x: usize, y: usize, z: usize) -> &BlockState {
        if self.data.is_empty() {
            return &self.palette[0];
        }
        let index = unpack(&self.data, self.bits_per_block, y * 256 + z * 16 + x);
        &self.palette[index as usize]
    }

    fn to_nbt(&self, biome: &str) -> Tag {
        let palette = self
            .palette
            .iter()
            .map(|state| {
                let entry = Tag::compound().with("Name", state.name().into());
                let properties = state.properties();
                if properties.is_empty() {
                    entry
                } else {
                    let props = properties
                        .into_iter()
                        .fold(Tag::compound(), |tag, (k, v)| tag.with(k, v.into()));
                    entry.with("Properties", props)
                }
            })
            .collect();

        let mut block_states = Tag::compound().with("palette", Tag::List(palette));
        if !self.data.is_empty() {
            block_states.insert("data", Tag::LongArray(self.data.clone()));
        }

        Tag::compound()
            .with("Y", Tag::Byte(self.y as i8))
            .with("block_states", block_states)
            .with(
                "biomes",
                Tag::compound().with("palette", Tag::List(vec![biome.into()])),
            )
    }
}

/// A sealed 16×16 chunk. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pos: ChunkPos,
    min_y: i32,
    height: u32,
    sections: Vec<ChunkSection>,
    heightmap: Vec<i64>,
    biome: String,
    flags: ChunkFlags,
}

impl Chunk {
    /// Seals 256 finalized columns, indexed `z * 16 + x`, into sections.
    pub fn seal(
        pos: ChunkPos,
        columns: &[BlockColumn],
        biome: &str,
        flags: ChunkFlags,
    ) -> Result<Chunk> {
        if columns.len() != COLUMNS_PER_CHUNK {
            return Err(ConvertError::Pipeline(format!(
                "{} sealed with {} columns",
                pos,
                columns.len()
            )));
        }
        let min_y = columns[0].min_y();
        let height = columns[0].height();
        if min_y.rem_euclid(SECTION_HEIGHT) != 0 || height % SECTION_HEIGHT as u32 != 0 {
            return Err(ConvertError::Pipeline(format!(
                "{}: world range {}+{} is not section aligned",
                pos, min_y, height
            )));
        }
        if let Some(bad) = columns
            .iter()
            .position(|c| c.min_y() != min_y || c.height() != height || !c.is_well_formed())
        {
            return Err(ConvertError::Pipeline(format!(
                "{}: column {} does not match the chunk's vertical range",
                pos, bad
            )));
        }

        let section_count = (height / SECTION_HEIGHT as u32) as usize;
        let air: &BlockState = &blocks::AIR;
        let mut states: Vec<Vec<&BlockState>> =
            vec![vec![air; BLOCKS_PER_SECTION]; section_count];

        for (i, column) in columns.iter().enumerate() {
            let (x, z) = (i % 16, i / 16);
            for (start, end, stratum) in column.bounds() {
                for world_y in start..end {
                    let rel = (world_y - min_y) as usize;
                    let (section, y) = (rel / 16, rel % 16);
                    states[section][y * 256 + z * 16 + x] = &stratum.block;
                }
            }
        }

        let sections = states
            .iter()
            .enumerate()
            .map(|(i, section)| {
                ChunkSection::from_states(min_y.div_euclid(SECTION_HEIGHT) + i as i32, section)
            })
            .collect();

        let bits = bits_for(height as usize + 1, 1);
        let heights: Vec<u32> = columns
            .iter()
            .map(|c| c.top_non_air().map_or(0, |top| (top - min_y + 1) as u32))
            .collect();

        Ok(Chunk {
            pos,
            min_y,
            height,
            sections,
            heightmap: pack(&heights, bits),
            biome: biome.to_owned(),
            flags,
        })
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn min_y(&self) -> i32 {
        self.min_y
    }

    pub fn sections(&self) -> &[ChunkSection] {
        &self.sections
    }

    pub fn biome(&self) -> &str {
        &self.biome
    }

    pub fn flags(&self) -> ChunkFlags {
        self.flags
    }

    /// Packed MOTION_BLOCKING heightmap.
    pub fn heightmap(&self) -> &[i64] {
        &self.heightmap
    }

    /// Heightmap value at a local column: top non-air y minus `min_y` plus one.
    pub fn surface_height(&self, x: usize, z: usize) -> u32 {
        unpack(
            &self.heightmap,
            bits_for(self.height as usize + 1, 1),
            z * 16 + x,
        )
    }

    pub fn block_at(&self, x: usize, y: i32, z: usize) -> Option<&BlockState> {
        if x >= 16 || z >= 16 || y < self.min_y {
            return None;
        }
        let rel = (y - self.min_y) as usize;
        let section = self.sections.get(rel / 16)?;
        Some(section.get_block_state_at(x, rel % 16, z))
    }

    /// Rebuilds the column at a local position from the packed sections.
    pub fn column(&self, x: usize, z: usize) -> BlockColumn {
        let mut column = BlockColumn::air(self.min_y, self.height);
        let mut run_start = self.min_y;
        let mut current = self.block_at(x, self.min_y, z);
        for y in self.min_y..=self.min_y + self.height as i32 {
            let state = self.block_at(x, y, z);
            if state != current {
                if let Some(block) = current.filter(|b| !b.is_air()) {
                    column.fill(run_start, y, block);
                }
                run_start = y;
                current = state;
            }
        }
        column
    }

    pub fn to_nbt(&self) -> Tag {
        let sections = self
            .sections
            .iter()
            .map(|section| section.to_nbt(&self.biome))
            .collect();

        Tag::compound()
            .with("DataVersion", Tag::Int(DATA_VERSION))
            .with("xPos", Tag::Int(self.pos.x))
            .with("zPos", Tag::Int(self.pos.z))
            .with("yPos", Tag::Int(self.min_y.div_euclid(SECTION_HEIGHT)))
            .with("Status", "minecraft:full".into())
            .with("LastUpdate", Tag::Long(0))
            .with("InhabitedTime", Tag::Long(0))
            .with("isLightOn", Tag::Byte(0))
            .with("Defaulted", self.flags.defaulted.into())
            .with("sections", Tag::List(sections))
            .with(
                "Heightmaps",
                Tag::compound().with("MOTION_BLOCKING", Tag::LongArray(self.heightmap.clone())),
            )
            .with("block_entities", Tag::List(Vec::new()))
    }
}
