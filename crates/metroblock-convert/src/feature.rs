use crate::config::ConversionConfig;
use crate::mapper::CoordinateMapper;
use crate::seam::{winner, Priority};
use metroblock_common::{ChunkPos, ColumnPos, Rect, Result};
use metroblock_world::source::touches;
use metroblock_world::{
    blocks, BlockColumn, BlockState, FeatureInstance, FeatureKind, Network, Orientation,
    SourceSnapshot, Species, Wealth, ZoneType,
};

/// A road's hold on a column, enough to redraw its surface elsewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoadClaim {
    pub feature: u64,
    pub network: Network,
    pub orientation: Orientation,
}

impl RoadClaim {
    pub fn surface(&self) -> &'static BlockState {
        match self.network {
            Network::Street => &*blocks::ANDESITE,
            Network::Road => &*blocks::GRAY_CONCRETE,
            Network::Avenue => &*blocks::BLACK_CONCRETE,
            Network::Rail => &*blocks::GRAVEL,
        }
    }

    fn track(&self) -> Option<&'static BlockState> {
        match (self.network, self.orientation) {
            (Network::Rail, Orientation::North | Orientation::South) => {
                Some(&*blocks::RAIL_NORTH_SOUTH)
            }
            (Network::Rail, Orientation::East | Orientation::West) => Some(&*blocks::RAIL_EAST_WEST),
            _ => None,
        }
    }
}

/// Road deck placed on a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoadSurface {
    pub claim: RoadClaim,
    pub deck: i32,
}

/// Draws a road deck at `deck` and clears everything above it.
pub fn lay_surface(column: &mut BlockColumn, deck: i32, claim: &RoadClaim) {
    column.fill(deck + 1, column.max_y(), &blocks::AIR);
    column.set(deck, claim.surface());
    if let Some(track) = claim.track() {
        column.set(deck + 1, track);
    }
}

pub fn building_material(zone: ZoneType, wealth: Wealth) -> &'static BlockState {
    match (zone, wealth) {
        (ZoneType::Residential, Wealth::Low) => &*blocks::OAK_PLANKS,
        (ZoneType::Residential, Wealth::Medium) => &*blocks::BRICKS,
        (ZoneType::Residential, Wealth::High) => &*blocks::QUARTZ_BLOCK,
        (ZoneType::Commercial, Wealth::Low) => &*blocks::TERRACOTTA,
        (ZoneType::Commercial, Wealth::Medium) => &*blocks::WHITE_CONCRETE,
        (ZoneType::Commercial, Wealth::High) => &*blocks::POLISHED_ANDESITE,
        (ZoneType::Industrial, Wealth::Low) => &*blocks::GRAY_CONCRETE,
        (ZoneType::Industrial, _) => &*blocks::IRON_BLOCK,
        (ZoneType::Agricultural, _) => &*blocks::HAY_BLOCK,
        (ZoneType::Park | ZoneType::Civic | ZoneType::None, _) => &*blocks::STONE_BRICKS,
    }
}

fn tree_blocks(species: Species) -> (&'static BlockState, &'static BlockState) {
    match species {
        Species::Oak => (&*blocks::OAK_LOG, &*blocks::OAK_LEAVES),
        Species::Birch => (&*blocks::BIRCH_LOG, &*blocks::BIRCH_LEAVES),
        Species::Spruce => (&*blocks::SPRUCE_LOG, &*blocks::SPRUCE_LEAVES),
        Species::Jungle => (&*blocks::JUNGLE_LOG, &*blocks::JUNGLE_LEAVES),
    }
}

/// Overlays features on terrain columns.
#[derive(Debug, Clone)]
pub struct FeaturePlacer {
    mapper: CoordinateMapper,
    priority: Priority,
    min_y: i32,
    max_y: i32,
}

impl FeaturePlacer {
    pub fn new(config: &ConversionConfig, mapper: CoordinateMapper) -> Self {
        FeaturePlacer {
            mapper,
            priority: Priority::new(&config.feature_priority),
            min_y: config.world.min_y,
            max_y: config.world.max_y(),
        }
    }

    pub fn priority(&self) -> &Priority {
        &self.priority
    }

    fn touching<'a>(
        &self,
        snapshot: &'a SourceSnapshot,
        columns: Rect,
    ) -> impl Iterator<Item = &'a FeatureInstance> {
        let area = self.mapper.source_bounds(columns);
        snapshot
            .features()
            .iter()
            .filter(move |feature| touches(&feature.footprint.reach(), &area))
    }

    /// Features a chunk needs: every feature touching the chunk, which must
    /// be well formed, plus the valid ones touching the ring of columns
    /// around it. Sorted by id.
    pub fn chunk_features<'a>(
        &self,
        snapshot: &'a SourceSnapshot,
        chunk: ChunkPos,
    ) -> Result<Vec<&'a FeatureInstance>> {
        let columns = chunk.columns();
        for feature in self.touching(snapshot, columns) {
            feature.validate()?;
        }
        Ok(self
            .touching(snapshot, columns.expand(1))
            .filter(|feature| feature.validate().is_ok())
            .collect())
    }

    /// Features whose footprint holds the column center, winner first.
    pub fn covering<'a>(
        &self,
        candidates: &[&'a FeatureInstance],
        column: ColumnPos,
    ) -> Vec<&'a FeatureInstance> {
        let [x, z] = self.mapper.source_point(column);
        let mut covering: Vec<&FeatureInstance> = candidates
            .iter()
            .copied()
            .filter(|feature| feature.footprint.contains(x, z))
            .collect();
        covering.sort_by_key(|feature| self.priority.key(feature));
        covering
    }

    /// Road claim of a column, if a road owns it.
    pub fn claim(&self, candidates: &[&FeatureInstance], column: ColumnPos) -> Option<RoadClaim> {
        let covering = self.covering(candidates, column);
        let owner = covering
            .iter()
            .copied()
            .reduce(|a, b| winner(a, b, &self.priority))?;
        match owner.kind {
            FeatureKind::Road { network } => Some(RoadClaim {
                feature: owner.id,
                network,
                orientation: owner.orientation,
            }),
            _ => None,
        }
    }

    fn top_of(&self, feature: &FeatureInstance) -> Option<i32> {
        feature
            .height
            .map(|h| self.mapper.elevation_to_layer(h).min(self.max_y - 1))
    }

    /// Applies `covering` (winner first) onto a terrain column whose solid
    /// top is `ground`. Lower priorities are drawn first so the winner ends
    /// on top. Returns the road deck when a road owns the column.
    pub fn place(
        &self,
        column: &mut BlockColumn,
        ground: i32,
        covering: &[&FeatureInstance],
        pos: ColumnPos,
    ) -> Option<RoadSurface> {
        let mut road = None;
        for feature in covering.iter().rev() {
            road = match &feature.kind {
                FeatureKind::Road { network } => {
                    Some(self.place_road(column, ground, feature, *network))
                }
                FeatureKind::Building { zone, wealth } => {
                    if let Some(top) = self.top_of(feature) {
                        column.fill(ground + 1, top + 1, building_material(*zone, *wealth));
                    }
                    None
                }
                FeatureKind::Vegetation { species } => {
                    self.place_tree(column, ground, feature, *species, pos);
                    None
                }
                FeatureKind::Water => {
                    if let Some(top) = self.top_of(feature) {
                        column.fill(ground + 1, top + 1, &blocks::WATER);
                    }
                    None
                }
            };
        }
        road
    }

    fn place_road(
        &self,
        column: &mut BlockColumn,
        ground: i32,
        feature: &FeatureInstance,
        network: Network,
    ) -> RoadSurface {
        let deck = feature
            .height
            .map(|grade| self.mapper.elevation_to_layer(grade))
            .unwrap_or(ground)
            .clamp(self.min_y + 1, self.max_y - 2);
        if deck > ground + 1 {
            column.fill(ground + 1, deck, &blocks::GRAVEL);
        }
        let claim = RoadClaim {
            feature: feature.id,
            network,
            orientation: feature.orientation,
        };
        lay_surface(column, deck, &claim);
        RoadSurface { claim, deck }
    }

    fn place_tree(
        &self,
        column: &mut BlockColumn,
        ground: i32,
        feature: &FeatureInstance,
        species: Species,
        pos: ColumnPos,
    ) {
        let Some(top) = self.top_of(feature) else {
            return;
        };
        if top <= ground {
            return;
        }
        let (log, leaves) = tree_blocks(species);
        column.fill((top - 2).max(ground + 1), top + 1, leaves);

        let trunk = feature
            .footprint
            .center()
            .map(|center| self.mapper.column_at_source_point(center));
        if trunk == Some(pos) {
            column.fill(ground + 1, top, log);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::TerrainSynthesizer;
    use assert_matches::assert_matches;
    use metroblock_common::ConvertError;
    use metroblock_world::{Footprint, InMemorySource, SourceCell, SourceReader};

    fn config() -> ConversionConfig {
        ConversionConfig {
            sea_level: 5,
            ..Default::default()
        }
    }

    fn placer(area: Rect) -> FeaturePlacer {
        let config = config();
        FeaturePlacer::new(&config, CoordinateMapper::new(&config, area))
    }

    fn rect(id: u64, kind: FeatureKind, min: [f64; 2], max: [f64; 2], height: Option<f64>) -> FeatureInstance {
        FeatureInstance {
            id,
            kind,
            footprint: Footprint::Rect { min, max },
            height,
            orientation: Orientation::East,
        }
    }

    fn terrain(ground: i32) -> BlockColumn {
        TerrainSynthesizer::new(&config()).synthesize(&SourceCell::ground(ground as f64), ground)
    }

    #[test]
    fn test_building_stratum() {
        let placer = placer(Rect::new(0, 0, 16, 16));
        let house = rect(
            1,
            FeatureKind::Building {
                zone: ZoneType::None,
                wealth: Wealth::Low,
            },
            [2.0, 2.0],
            [6.0, 6.0],
            Some(20.0),
        );
        let covering = placer.covering(&[&house], ColumnPos::new(3, 3));
        assert_eq!(covering.len(), 1);

        let mut column = terrain(10);
        assert_eq!(placer.place(&mut column, 10, &covering, ColumnPos::new(3, 3)), None);
        assert_eq!(column.block_at(10), Some(&*blocks::GRASS_BLOCK));
        assert_eq!(column.block_at(11), Some(&*blocks::STONE_BRICKS));
        assert_eq!(column.block_at(20), Some(&*blocks::STONE_BRICKS));
        assert_eq!(column.block_at(21), Some(&*blocks::AIR));
        assert!(placer.covering(&[&house], ColumnPos::new(6, 3)).is_empty());
    }

    #[test]
    fn test_road_overrides_building_and_clears_above() {
        let placer = placer(Rect::new(0, 0, 16, 16));
        let house = rect(
            1,
            FeatureKind::Building {
                zone: ZoneType::Commercial,
                wealth: Wealth::High,
            },
            [0.0, 0.0],
            [4.0, 4.0],
            Some(30.0),
        );
        let street = rect(
            7,
            FeatureKind::Road {
                network: Network::Street,
            },
            [0.0, 0.0],
            [16.0, 1.0],
            None,
        );
        let pos = ColumnPos::new(1, 0);
        let covering = placer.covering(&[&house, &street], pos);
        assert_eq!(covering[0].id, 7);

        let mut column = terrain(10);
        let surface = placer.place(&mut column, 10, &covering, pos).unwrap();
        assert_eq!(surface.deck, 10);
        assert_eq!(surface.claim.feature, 7);
        assert_eq!(column.block_at(10), Some(&*blocks::ANDESITE));
        assert_eq!(column.top_non_air(), Some(10));
        assert_eq!(placer.claim(&[&house, &street], pos), Some(surface.claim));
    }

    #[test]
    fn test_graded_rail_embankment() {
        let placer = placer(Rect::new(0, 0, 16, 16));
        let rail = rect(
            3,
            FeatureKind::Road {
                network: Network::Rail,
            },
            [0.0, 0.0],
            [16.0, 1.0],
            Some(14.0),
        );
        let mut column = terrain(10);
        let surface = placer
            .place(&mut column, 10, &[&rail], ColumnPos::new(0, 0))
            .unwrap();
        assert_eq!(surface.deck, 14);
        assert_eq!(column.block_at(11), Some(&*blocks::GRAVEL));
        assert_eq!(column.block_at(14), Some(&*blocks::GRAVEL));
        assert_eq!(column.block_at(15), Some(&*blocks::RAIL_EAST_WEST));
        assert_eq!(column.top_non_air(), Some(15));

        // a cut lowers the deck below the terrain
        let mut cut = terrain(10);
        let lowered = rect(4, FeatureKind::Road { network: Network::Road }, [0.0, 0.0], [1.0, 1.0], Some(8.0));
        placer.place(&mut cut, 10, &[&lowered], ColumnPos::new(0, 0));
        assert_eq!(cut.top_non_air(), Some(8));
        assert_eq!(cut.block_at(8), Some(&*blocks::GRAY_CONCRETE));
    }

    #[test]
    fn test_tree_trunk_and_canopy() {
        let placer = placer(Rect::new(0, 0, 16, 16));
        let tree = rect(
            5,
            FeatureKind::Vegetation {
                species: Species::Birch,
            },
            [4.0, 4.0],
            [7.0, 7.0],
            Some(16.0),
        );
        let mut trunk = terrain(10);
        placer.place(&mut trunk, 10, &[&tree], ColumnPos::new(5, 5));
        assert_eq!(trunk.block_at(11), Some(&*blocks::BIRCH_LOG));
        assert_eq!(trunk.block_at(15), Some(&*blocks::BIRCH_LOG));
        assert_eq!(trunk.block_at(16), Some(&*blocks::BIRCH_LEAVES));

        let mut edge = terrain(10);
        placer.place(&mut edge, 10, &[&tree], ColumnPos::new(4, 4));
        assert_eq!(edge.block_at(13), Some(&*blocks::AIR));
        assert_eq!(edge.block_at(14), Some(&*blocks::BIRCH_LEAVES));
        assert_eq!(edge.block_at(16), Some(&*blocks::BIRCH_LEAVES));
    }

    #[test]
    fn test_feature_clipped_to_ceiling() {
        let placer = placer(Rect::new(0, 0, 16, 16));
        let tower = rect(
            2,
            FeatureKind::Building {
                zone: ZoneType::Industrial,
                wealth: Wealth::High,
            },
            [0.0, 0.0],
            [1.0, 1.0],
            Some(10_000.0),
        );
        let mut column = terrain(10);
        placer.place(&mut column, 10, &[&tower], ColumnPos::new(0, 0));
        assert_eq!(column.top_non_air(), Some(319));
        assert!(column.is_well_formed());
    }

    #[test]
    fn test_chunk_features_validates_owned_features() {
        let good = rect(1, FeatureKind::Water, [1.0, 1.0], [3.0, 3.0], Some(12.0));
        let bad = rect(2, FeatureKind::Water, [20.0, 1.0], [20.0, 3.0], Some(12.0));
        let source = InMemorySource::flat(Rect::new(0, 0, 48, 16), SourceCell::ground(10.0))
            .with_feature(good)
            .with_feature(bad);
        let snapshot = source.read_area(Rect::new(0, 0, 48, 16)).unwrap();
        let placer = placer(Rect::new(0, 0, 48, 16));

        let first = placer.chunk_features(&snapshot, ChunkPos::new(0, 0)).unwrap();
        assert_eq!(first.iter().map(|f| f.id).collect::<Vec<_>>(), vec![1]);

        assert_matches!(
            placer.chunk_features(&snapshot, ChunkPos::new(1, 0)),
            Err(ConvertError::MalformedFeature { id: 2, .. })
        );
        assert!(placer.chunk_features(&snapshot, ChunkPos::new(2, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_non_finite_feature_fails_the_chunks_it_reaches() {
        let lost = rect(3, FeatureKind::Water, [f64::NAN, 2.0], [4.0, 6.0], Some(12.0));
        let source = InMemorySource::flat(Rect::new(0, 0, 48, 32), SourceCell::ground(10.0))
            .with_feature(lost);
        let snapshot = source.read_area(Rect::new(0, 0, 48, 32)).unwrap();
        let placer = placer(Rect::new(0, 0, 48, 32));

        assert_matches!(
            placer.chunk_features(&snapshot, ChunkPos::new(0, 0)),
            Err(ConvertError::MalformedFeature { id: 3, reason }) if reason.contains("non-finite")
        );
        assert!(placer.chunk_features(&snapshot, ChunkPos::new(1, 0)).unwrap().is_empty());
        assert!(placer.chunk_features(&snapshot, ChunkPos::new(0, 1)).unwrap().is_empty());
    }

    #[test]
    fn test_feature_ending_on_chunk_edge_stays_in_its_chunk() {
        let bad = rect(4, FeatureKind::Water, [10.0, 2.0], [16.0, 2.0], Some(12.0));
        let source = InMemorySource::flat(Rect::new(0, 0, 32, 16), SourceCell::ground(10.0))
            .with_feature(bad);
        let snapshot = source.read_area(Rect::new(0, 0, 32, 16)).unwrap();
        let placer = placer(Rect::new(0, 0, 32, 16));

        assert_matches!(
            placer.chunk_features(&snapshot, ChunkPos::new(0, 0)),
            Err(ConvertError::MalformedFeature { id: 4, .. })
        );
        assert!(placer.chunk_features(&snapshot, ChunkPos::new(1, 0)).unwrap().is_empty());
    }
}
