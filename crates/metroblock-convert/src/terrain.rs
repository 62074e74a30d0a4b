use crate::config::{ConversionConfig, StrataProfile};
use metroblock_world::{blocks, BlockColumn, BlockState, SourceCell, SourceSnapshot, Wealth, ZoneType};

/// Depth of the retaining wall placed under zoned lots
const FOUNDATION_DEPTH: i32 = 15;

/// Turns an aggregated cell sample into a terrain column.
#[derive(Debug, Clone)]
pub struct TerrainSynthesizer {
    min_y: i32,
    height: u32,
    sea_level: i32,
    beach_height: i32,
    rock_slope: Option<f64>,
    strata: StrataProfile,
}

/// Retaining wall material for a lot
pub fn retaining_wall(zone: ZoneType, wealth: Wealth) -> &'static BlockState {
    match (zone, wealth) {
        (ZoneType::Agricultural, _) => &*blocks::DIRT,
        (ZoneType::Residential | ZoneType::Commercial | ZoneType::Industrial, Wealth::Low) => {
            &*blocks::LIGHT_GRAY_CONCRETE
        }
        (ZoneType::Residential | ZoneType::Commercial | ZoneType::Industrial, Wealth::Medium) => {
            &*blocks::COBBLED_DEEPSLATE
        }
        (ZoneType::Residential | ZoneType::Commercial | ZoneType::Industrial, Wealth::High) => {
            &*blocks::BRICKS
        }
        _ => &*blocks::DRIPSTONE_BLOCK,
    }
}

impl TerrainSynthesizer {
    pub fn new(config: &ConversionConfig) -> Self {
        TerrainSynthesizer {
            min_y: config.world.min_y,
            height: config.world.height,
            sea_level: config.sea_level,
            beach_height: config.beach_height,
            rock_slope: config.rock_slope,
            strata: config.strata.clone(),
        }
    }

    fn max_y(&self) -> i32 {
        self.min_y + self.height as i32
    }

    /// Solid terrain top for a layer, clamped to the world.
    pub fn ground(&self, layer: i32) -> i32 {
        layer.clamp(self.min_y, self.max_y() - 1)
    }

    pub fn synthesize(&self, sample: &SourceCell, layer: i32) -> BlockColumn {
        let mut column = BlockColumn::air(self.min_y, self.height);
        let floor = &self.strata.floor;

        if layer < self.min_y {
            column.set(self.min_y, floor);
            if sample.water {
                column.fill(self.min_y + 1, self.sea_level + 1, &blocks::WATER);
            }
            return column;
        }

        let top = self.ground(layer);
        column.fill(self.min_y + 1, top + 1, self.strata.fill_block());
        column.set(self.min_y, floor);

        let steep = matches!(self.rock_slope, Some(limit) if sample.slope >= limit);
        let shore = sample.water || top <= self.sea_level + self.beach_height;
        let last = self.strata.layers.len() - 1;

        let mut cursor = top;
        for (i, layer) in self.strata.layers[..last].iter().enumerate() {
            let block = if sample.water && i < 2 {
                &*blocks::SAND
            } else if steep && i == 0 {
                self.strata.fill_block()
            } else if shore && i < 2 {
                &*blocks::SAND
            } else {
                &layer.block
            };
            let bottom = (cursor - layer.depth as i32 + 1).max(self.min_y + 1);
            column.fill(bottom, cursor + 1, block);
            cursor -= layer.depth as i32;
        }

        if sample.zone.is_zoned() && !sample.water {
            let wall = retaining_wall(sample.zone, sample.wealth);
            column.fill((top - FOUNDATION_DEPTH).max(self.min_y + 1), top, wall);
        }

        if sample.water && top < self.sea_level {
            column.fill(top + 1, self.sea_level + 1, &blocks::WATER);
        }

        column
    }
}

/// Runs `passes` rounds of neighbour averaging over the snapshot's
/// elevations, first along x, then along z. A cell is only updated when both
/// neighbours on that axis are present. Returns a new snapshot.
pub fn smooth(snapshot: &SourceSnapshot, passes: u32) -> SourceSnapshot {
    let area = snapshot.area();
    let width = area.width() as usize;
    let depth = area.depth() as usize;
    let mut heights: Vec<f64> = snapshot.cells().iter().map(|c| c.elevation).collect();
    if width == 0 || depth == 0 {
        return snapshot.clone();
    }

    for _ in 0..passes {
        let previous = heights.clone();
        for z in 0..depth {
            for x in 1..width.saturating_sub(1) {
                let i = z * width + x;
                heights[i] = (previous[i] + (previous[i - 1] + previous[i + 1]) / 2.0) / 2.0;
            }
        }

        let previous = heights.clone();
        for z in 1..depth.saturating_sub(1) {
            for x in 0..width {
                let i = z * width + x;
                heights[i] =
                    (previous[i] + (previous[i - width] + previous[i + width]) / 2.0) / 2.0;
            }
        }
    }

    snapshot.with_elevations(&heights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metroblock_common::Rect;
    use metroblock_world::{InMemorySource, SourceReader};

    fn synth(sea_level: i32) -> TerrainSynthesizer {
        TerrainSynthesizer::new(&ConversionConfig {
            sea_level,
            ..Default::default()
        })
    }

    fn runs(column: &BlockColumn) -> Vec<(i32, i32, String)> {
        column
            .bounds()
            .map(|(s, e, st)| (s, e, st.block.name().trim_start_matches("minecraft:").to_owned()))
            .collect()
    }

    #[test]
    fn test_default_profile() {
        let column = synth(5).synthesize(&SourceCell::ground(10.0), 10);
        assert!(column.is_well_formed());
        assert_eq!(
            runs(&column),
            vec![
                (-64, -63, "bedrock".to_owned()),
                (-63, 7, "stone".to_owned()),
                (7, 10, "dirt".to_owned()),
                (10, 11, "grass_block".to_owned()),
                (11, 320, "air".to_owned()),
            ]
        );
    }

    #[test]
    fn test_water_cell_fills_to_sea_level() {
        let cell = SourceCell {
            elevation: 0.0,
            water: true,
            ..Default::default()
        };
        let column = synth(5).synthesize(&cell, 0);
        assert_eq!(column.block_at(0), Some(&*blocks::SAND));
        assert_eq!(column.block_at(-1), Some(&*blocks::SAND));
        assert_eq!(column.block_at(1), Some(&*blocks::WATER));
        assert_eq!(column.block_at(5), Some(&*blocks::WATER));
        assert_eq!(column.block_at(6), Some(&*blocks::AIR));
        assert_eq!(column.top_non_air(), Some(5));
    }

    #[test]
    fn test_below_floor_is_single_floor_block() {
        let cell = SourceCell {
            water: true,
            ..Default::default()
        };
        let column = synth(-60).synthesize(&cell, -100);
        assert_eq!(
            runs(&column),
            vec![
                (-64, -63, "bedrock".to_owned()),
                (-63, -59, "water".to_owned()),
                (-59, 320, "air".to_owned()),
            ]
        );
        let dry = synth(-60).synthesize(&SourceCell::default(), -100);
        assert_eq!(dry.top_non_air(), Some(-64));
    }

    #[test]
    fn test_top_is_clamped_to_ceiling() {
        let column = synth(62).synthesize(&SourceCell::ground(1000.0), 1000);
        assert_eq!(column.top_non_air(), Some(319));
        assert!(column.is_well_formed());
    }

    #[test]
    fn test_beach_and_rock_face() {
        let beach = synth(5).synthesize(&SourceCell::ground(7.0), 7);
        assert_eq!(beach.block_at(7), Some(&*blocks::SAND));
        assert_eq!(beach.block_at(4), Some(&*blocks::SAND));
        assert_eq!(beach.block_at(3), Some(&*blocks::STONE));

        let steep = TerrainSynthesizer::new(&ConversionConfig {
            sea_level: 5,
            rock_slope: Some(0.5),
            ..Default::default()
        });
        let cell = SourceCell {
            elevation: 30.0,
            slope: 0.8,
            ..Default::default()
        };
        let column = steep.synthesize(&cell, 30);
        assert_eq!(column.block_at(30), Some(&*blocks::STONE));
        assert_eq!(column.block_at(29), Some(&*blocks::DIRT));
    }

    #[test]
    fn test_zoned_foundation() {
        let cell = SourceCell {
            elevation: 40.0,
            zone: ZoneType::Residential,
            wealth: Wealth::High,
            ..Default::default()
        };
        let column = synth(5).synthesize(&cell, 40);
        assert_eq!(column.block_at(40), Some(&*blocks::GRASS_BLOCK));
        assert_eq!(column.block_at(39), Some(&*blocks::BRICKS));
        assert_eq!(column.block_at(25), Some(&*blocks::BRICKS));
        assert_eq!(column.block_at(24), Some(&*blocks::STONE));
        assert_eq!(
            retaining_wall(ZoneType::Agricultural, Wealth::High),
            &*blocks::DIRT
        );
        assert_eq!(
            retaining_wall(ZoneType::Civic, Wealth::Low),
            &*blocks::DRIPSTONE_BLOCK
        );
    }

    #[test]
    fn test_smoothing_averages_interior_only() {
        let mut source = InMemorySource::flat(Rect::new(0, 0, 3, 3), SourceCell::ground(0.0));
        source.cell_mut(1, 1).unwrap().elevation = 16.0;
        let snapshot = source.read_area(Rect::new(0, 0, 3, 3)).unwrap();

        let smoothed = smooth(&snapshot, 1);
        // x pass: 16 -> 8, then z pass: 8 -> 4
        assert_eq!(smoothed.cell(1, 1).unwrap().elevation, 4.0);
        assert_eq!(smoothed.cell(1, 0).unwrap().elevation, 0.0);
        assert_eq!(smoothed.cell(0, 1).unwrap().elevation, 0.0);
        assert_eq!(smoothed.cell(2, 2).unwrap().elevation, 0.0);
        // source untouched
        assert_eq!(snapshot.cell(1, 1).unwrap().elevation, 16.0);
        assert_eq!(smooth(&snapshot, 0), snapshot);
    }
}
