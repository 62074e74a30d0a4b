use crate::feature::{lay_surface, RoadClaim, RoadSurface};
use crate::seam::road_edge;
use metroblock_common::types::COLUMNS_PER_CHUNK;
use metroblock_common::{ChunkPos, ColumnPos, ConvertError, Result};
use metroblock_world::{BlockColumn, Chunk, ChunkFlags};
use std::collections::{HashMap, HashSet};

const PLAINS: &str = "minecraft:plains";
const RIVER: &str = "minecraft:river";

/// Road claims of the columns just outside a chunk, indexed along the edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeamContext {
    /// `z = min_z - 1`, indexed by local x
    pub north: [Option<RoadClaim>; 16],
    /// `z = max_z`, indexed by local x
    pub south: [Option<RoadClaim>; 16],
    /// `x = min_x - 1`, indexed by local z
    pub west: [Option<RoadClaim>; 16],
    /// `x = max_x`, indexed by local z
    pub east: [Option<RoadClaim>; 16],
}

impl SeamContext {
    fn neighbors(&self, local_x: usize, local_z: usize) -> Vec<Option<RoadClaim>> {
        let mut neighbors = Vec::new();
        if local_z == 0 {
            neighbors.push(self.north[local_x]);
        }
        if local_z == 15 {
            neighbors.push(self.south[local_x]);
        }
        if local_x == 0 {
            neighbors.push(self.west[local_z]);
        }
        if local_x == 15 {
            neighbors.push(self.east[local_z]);
        }
        neighbors
    }
}

/// A column with terrain and features applied, waiting for its chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedColumn {
    pub column: BlockColumn,
    pub road: Option<RoadSurface>,
}

#[derive(Debug)]
struct OpenChunk {
    seams: SeamContext,
    columns: Vec<Option<FinishedColumn>>,
    received: usize,
}

/// Collects finished columns in any order and seals each chunk exactly once,
/// when its 256th column arrives.
#[derive(Debug, Default)]
pub struct ChunkCompositor {
    open: HashMap<ChunkPos, OpenChunk>,
    sealed: HashSet<ChunkPos>,
}

impl ChunkCompositor {
    pub fn new() -> Self {
        ChunkCompositor::default()
    }

    pub fn open(&mut self, pos: ChunkPos, seams: SeamContext) -> Result<()> {
        if self.sealed.contains(&pos) || self.open.contains_key(&pos) {
            return Err(ConvertError::Pipeline(format!("{} opened twice", pos)));
        }
        self.open.insert(
            pos,
            OpenChunk {
                seams,
                columns: vec![None; COLUMNS_PER_CHUNK],
                received: 0,
            },
        );
        Ok(())
    }

    pub fn is_open(&self, pos: ChunkPos) -> bool {
        self.open.contains_key(&pos)
    }

    /// Chunks opened but not sealed yet.
    pub fn pending(&self) -> Vec<ChunkPos> {
        let mut pending: Vec<ChunkPos> = self.open.keys().copied().collect();
        pending.sort();
        pending
    }

    /// Takes one column. Returns the sealed chunk when this was its last
    /// missing column.
    pub fn accept(&mut self, pos: ColumnPos, finished: FinishedColumn) -> Result<Option<Chunk>> {
        let chunk = pos.chunk();
        let open = self.open.get_mut(&chunk).ok_or_else(|| {
            ConvertError::Pipeline(format!("column ({}, {}) for unopened {}", pos.x, pos.z, chunk))
        })?;

        let (local_x, local_z) = pos.local();
        let slot = &mut open.columns[local_z * 16 + local_x];
        if slot.is_some() {
            return Err(ConvertError::Pipeline(format!(
                "column ({}, {}) delivered twice",
                pos.x, pos.z
            )));
        }
        *slot = Some(finished);
        open.received += 1;

        if open.received < COLUMNS_PER_CHUNK {
            return Ok(None);
        }
        match self.open.remove(&chunk) {
            Some(open) => {
                self.sealed.insert(chunk);
                seal(chunk, open).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Replaces a chunk, open or not yet started, with the given columns and
    /// marks it defaulted. Columns already received are dropped.
    pub fn substitute(&mut self, pos: ChunkPos, columns: &[BlockColumn]) -> Result<Chunk> {
        if self.sealed.contains(&pos) {
            return Err(ConvertError::Pipeline(format!("{} is already sealed", pos)));
        }
        self.open.remove(&pos);
        self.sealed.insert(pos);
        Chunk::seal(
            pos,
            columns,
            biome_of(columns),
            ChunkFlags { defaulted: true },
        )
    }
}

fn biome_of(columns: &[BlockColumn]) -> &'static str {
    let wet = columns
        .iter()
        .filter(|c| c.surface().is_some_and(|(_, block)| block.is_water()))
        .count();
    if wet * 2 > columns.len() {
        RIVER
    } else {
        PLAINS
    }
}

fn seal(pos: ChunkPos, open: OpenChunk) -> Result<Chunk> {
    let mut columns = Vec::with_capacity(COLUMNS_PER_CHUNK);
    for (i, slot) in open.columns.into_iter().enumerate() {
        let Some(mut finished) = slot else {
            return Err(ConvertError::Pipeline(format!(
                "{} sealed without column {}",
                pos, i
            )));
        };
        if let Some(road) = finished.road {
            let neighbors = open.seams.neighbors(i % 16, i / 16);
            if let Some(adopted) = road_edge(Some(&road.claim), &neighbors) {
                lay_surface(&mut finished.column, road.deck, &adopted);
            }
        }
        columns.push(finished.column);
    }
    Chunk::seal(pos, &columns, biome_of(&columns), ChunkFlags::default())
}
