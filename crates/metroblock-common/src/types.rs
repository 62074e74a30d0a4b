use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, crate::error::ConvertError>;

/// Columns along one edge of a chunk
pub const CHUNK_WIDTH: i32 = 16;
/// Chunks along one edge of a region
pub const REGION_WIDTH: i32 = 32;
pub const COLUMNS_PER_CHUNK: usize = (CHUNK_WIDTH * CHUNK_WIDTH) as usize;
pub const CHUNKS_PER_REGION: usize = (REGION_WIDTH * REGION_WIDTH) as usize;

/// Half-open integer rectangle on the horizontal plane: `min_x <= x < max_x`, same for z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: i32,
    pub min_z: i32,
    pub max_x: i32,
    pub max_z: i32,
}

impl Rect {
    pub fn new(min_x: i32, min_z: i32, max_x: i32, max_z: i32) -> Self {
        Rect {
            min_x,
            min_z,
            max_x,
            max_z,
        }
    }

    pub fn with_size(min_x: i32, min_z: i32, width: i32, depth: i32) -> Self {
        Rect::new(min_x, min_z, min_x + width, min_z + depth)
    }

    pub fn width(&self) -> i32 {
        (self.max_x - self.min_x).max(0)
    }

    pub fn depth(&self) -> i32 {
        (self.max_z - self.min_z).max(0)
    }

    pub fn area(&self) -> usize {
        self.width() as usize * self.depth() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.depth() == 0
    }

    pub fn contains(&self, x: i32, z: i32) -> bool {
        x >= self.min_x && x < self.max_x && z >= self.min_z && z < self.max_z
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.is_empty()
            || (other.min_x >= self.min_x
                && other.min_z >= self.min_z
                && other.max_x <= self.max_x
                && other.max_z <= self.max_z)
    }

    /// Overlap of two rectangles, possibly empty.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let min_x = self.min_x.max(other.min_x);
        let min_z = self.min_z.max(other.min_z);
        Rect::new(
            min_x,
            min_z,
            self.max_x.min(other.max_x).max(min_x),
            self.max_z.min(other.max_z).max(min_z),
        )
    }

    /// Grows the rectangle by `margin` on every side.
    pub fn expand(&self, margin: i32) -> Rect {
        Rect::new(
            self.min_x - margin,
            self.min_z - margin,
            self.max_x + margin,
            self.max_z + margin,
        )
    }

    /// Row-major index of `(x, z)` inside the rectangle.
    pub fn index_of(&self, x: i32, z: i32) -> Option<usize> {
        if !self.contains(x, z) {
            return None;
        }
        Some((z - self.min_z) as usize * self.width() as usize + (x - self.min_x) as usize)
    }

    /// Iterates positions row by row (z outer, x inner).
    pub fn iter(&self) -> impl Iterator<Item = (i32, i32)> {
        let (min_x, max_x) = (self.min_x, self.max_x);
        (self.min_z..self.max_z).flat_map(move |z| (min_x..max_x).map(move |x| (x, z)))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}) x [{}, {})",
            self.min_x, self.max_x, self.min_z, self.max_z
        )
    }
}

/// A cell of the simulation source grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub x: i32,
    pub z: i32,
}

impl CellPos {
    pub fn new(x: i32, z: i32) -> Self {
        CellPos { x, z }
    }
}

/// A block column of the target world, in world block coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnPos {
    pub x: i32,
    pub z: i32,
}

impl ColumnPos {
    pub fn new(x: i32, z: i32) -> Self {
        ColumnPos { x, z }
    }

    pub fn chunk(&self) -> ChunkPos {
        ChunkPos::new(self.x.div_euclid(CHUNK_WIDTH), self.z.div_euclid(CHUNK_WIDTH))
    }

    /// Position inside the owning chunk, both in `0..16`.
    pub fn local(&self) -> (usize, usize) {
        (
            self.x.rem_euclid(CHUNK_WIDTH) as usize,
            self.z.rem_euclid(CHUNK_WIDTH) as usize,
        )
    }

    pub fn offset(&self, dx: i32, dz: i32) -> ColumnPos {
        ColumnPos::new(self.x + dx, self.z + dz)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        ChunkPos { x, z }
    }

    pub fn region(&self) -> RegionPos {
        RegionPos::new(self.x.div_euclid(REGION_WIDTH), self.z.div_euclid(REGION_WIDTH))
    }

    /// Slot of this chunk inside its region, `z * 32 + x`.
    pub fn region_index(&self) -> usize {
        let local_x = self.x.rem_euclid(REGION_WIDTH);
        let local_z = self.z.rem_euclid(REGION_WIDTH);
        (local_z * REGION_WIDTH + local_x) as usize
    }

    /// World columns covered by this chunk.
    pub fn columns(&self) -> Rect {
        Rect::with_size(
            self.x * CHUNK_WIDTH,
            self.z * CHUNK_WIDTH,
            CHUNK_WIDTH,
            CHUNK_WIDTH,
        )
    }

    pub fn column(&self, local_x: usize, local_z: usize) -> ColumnPos {
        ColumnPos::new(
            self.x * CHUNK_WIDTH + local_x as i32,
            self.z * CHUNK_WIDTH + local_z as i32,
        )
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk({}, {})", self.x, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub fn new(x: i32, z: i32) -> Self {
        RegionPos { x, z }
    }

    /// Chunk coordinates covered by this region.
    pub fn chunks(&self) -> Rect {
        Rect::with_size(
            self.x * REGION_WIDTH,
            self.z * REGION_WIDTH,
            REGION_WIDTH,
            REGION_WIDTH,
        )
    }

    /// World columns covered by this region.
    pub fn columns(&self) -> Rect {
        let span = REGION_WIDTH * CHUNK_WIDTH;
        Rect::with_size(self.x * span, self.z * span, span, span)
    }

    pub fn chunk_at(&self, index: usize) -> ChunkPos {
        let index = index as i32;
        ChunkPos::new(
            self.x * REGION_WIDTH + index % REGION_WIDTH,
            self.z * REGION_WIDTH + index / REGION_WIDTH,
        )
    }
}

impl fmt::Display for RegionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r.{}.{}", self.x, self.z)
    }
}
