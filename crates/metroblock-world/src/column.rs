use crate::block::{blocks, BlockState};

/// A run of one block type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stratum {
    pub block: BlockState,
    pub len: u32,
}

/// The vertical stack of blocks at one position, stored as strata from the
/// bottom of the world upwards. The strata always cover exactly `height`
/// blocks and two neighbouring strata never hold the same block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockColumn {
    min_y: i32,
    height: u32,
    strata: Vec<Stratum>,
}

impl BlockColumn {
    pub fn new(min_y: i32, height: u32, fill: &BlockState) -> Self {
        BlockColumn {
            min_y,
            height,
            strata: vec![Stratum {
                block: fill.clone(),
                len: height,
            }],
        }
    }

    pub fn air(min_y: i32, height: u32) -> Self {
        BlockColumn::new(min_y, height, &blocks::AIR)
    }

    pub fn min_y(&self) -> i32 {
        self.min_y
    }

    /// One past the highest block.
    pub fn max_y(&self) -> i32 {
        self.min_y + self.height as i32
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn strata(&self) -> &[Stratum] {
        &self.strata
    }

    /// Replaces `[from, to)` with `block`, clamped to the column.
    pub fn fill(&mut self, from: i32, to: i32, block: &BlockState) {
        let from = from.max(self.min_y);
        let to = to.min(self.max_y());
        if from >= to {
            return;
        }

        let mut next = Vec::with_capacity(self.strata.len() + 2);
        let mut inserted = false;
        for (start, end, stratum) in self.bounds() {
            if start < from {
                push_run(&mut next, &stratum.block, (end.min(from) - start) as u32);
            }
            if !inserted && end > from {
                push_run(&mut next, block, (to - from) as u32);
                inserted = true;
            }
            if end > to {
                push_run(&mut next, &stratum.block, (end - start.max(to)) as u32);
            }
        }
        self.strata = next;
    }

    pub fn set(&mut self, y: i32, block: &BlockState) {
        self.fill(y, y + 1, block);
    }

    pub fn block_at(&self, y: i32) -> Option<&BlockState> {
        self.bounds()
            .find(|(start, end, _)| y >= *start && y < *end)
            .map(|(_, _, stratum)| &stratum.block)
    }

    /// Highest y holding a non-air block.
    pub fn top_non_air(&self) -> Option<i32> {
        let mut top = self.max_y();
        for stratum in self.strata.iter().rev() {
            if !stratum.block.is_air() {
                return Some(top - 1);
            }
            top -= stratum.len as i32;
        }
        None
    }

    /// Highest non-air block and its y.
    pub fn surface(&self) -> Option<(i32, &BlockState)> {
        let y = self.top_non_air()?;
        self.block_at(y).map(|block| (y, block))
    }

    /// Iterates `(start, end, stratum)` with half-open world y bounds.
    pub fn bounds(&self) -> impl Iterator<Item = (i32, i32, &Stratum)> {
        let mut start = self.min_y;
        self.strata.iter().map(move |stratum| {
            let run = (start, start + stratum.len as i32, stratum);
            start += stratum.len as i32;
            run
        })
    }

    pub fn is_well_formed(&self) -> bool {
        let total: u64 = self.strata.iter().map(|s| s.len as u64).sum();
        total == self.height as u64
            && self.strata.iter().all(|s| s.len > 0)
            && self.strata.windows(2).all(|w| w[0].block != w[1].block)
    }
}

fn push_run(strata: &mut Vec<Stratum>, block: &BlockState, len: u32) {
    if len == 0 {
        return;
    }
    match strata.last_mut() {
        Some(last) if last.block == *block => last.len += len,
        _ => strata.push(Stratum {
            block: block.clone(),
            len,
        }),
    }
}
