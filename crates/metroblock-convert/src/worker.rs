//! Blocking chunk jobs: every column of one chunk is mapped, synthesized and
//! overlaid with features, then streamed to the region's compositor.

use crate::compositor::{FinishedColumn, SeamContext};
use crate::config::ConversionConfig;
use crate::feature::FeaturePlacer;
use crate::mapper::CoordinateMapper;
use crate::terrain::TerrainSynthesizer;
use metroblock_common::types::COLUMNS_PER_CHUNK;
use metroblock_common::{ChunkPos, ColumnPos, ConvertError, Result};
use metroblock_logger::{log, LogSeverity};
use metroblock_world::{BlockColumn, SourceCell, SourceSnapshot};
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use LogSeverity::*;

#[derive(Debug)]
pub(crate) enum ChunkMessage {
    /// Sent before any column of the chunk
    Begin { pos: ChunkPos, seams: SeamContext },
    Column { pos: ColumnPos, column: FinishedColumn },
    /// The chunk cannot be built from its source data
    Failed { pos: ChunkPos, reason: String },
}

/// Per-run column stages, shared read-only by all chunk jobs.
#[derive(Debug, Clone)]
pub(crate) struct ColumnPipeline {
    mapper: CoordinateMapper,
    terrain: TerrainSynthesizer,
    placer: FeaturePlacer,
}

impl ColumnPipeline {
    pub fn new(config: &ConversionConfig, mapper: CoordinateMapper) -> Self {
        ColumnPipeline {
            terrain: TerrainSynthesizer::new(config),
            placer: FeaturePlacer::new(config, mapper.clone()),
            mapper,
        }
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    fn sample(&self, snapshot: &SourceSnapshot, column: ColumnPos) -> Result<SourceCell> {
        self.mapper
            .sample(snapshot, self.mapper.clamp_column(column))
            .ok_or_else(|| {
                ConvertError::Pipeline(format!(
                    "no source cells for column ({}, {})",
                    column.x, column.z
                ))
            })
    }

    /// Flat stand-in for a chunk: terrain at the mean elevation of its
    /// columns, without features or water.
    pub fn default_columns(&self, snapshot: &SourceSnapshot, pos: ChunkPos) -> Vec<BlockColumn> {
        let elevations: Vec<f64> = pos
            .columns()
            .iter()
            .filter_map(|(x, z)| self.sample(snapshot, ColumnPos::new(x, z)).ok())
            .map(|cell| cell.elevation)
            .collect();
        let mean = if elevations.is_empty() {
            0.0
        } else {
            elevations.iter().sum::<f64>() / elevations.len() as f64
        };

        let layer = self.mapper.elevation_to_layer(mean);
        let column = self.terrain.synthesize(&SourceCell::ground(mean), layer);
        vec![column; COLUMNS_PER_CHUNK]
    }

    /// Builds one chunk and streams it over `sender`. Never panics: a failing
    /// or panicking job reports `Failed` instead.
    pub fn run_chunk(
        &self,
        snapshot: &SourceSnapshot,
        pos: ChunkPos,
        sender: &mpsc::Sender<ChunkMessage>,
        token: &CancellationToken,
    ) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.compose_chunk(snapshot, pos, sender, token)
        }));

        let reason = match result {
            Ok(Ok(())) => return,
            Ok(Err(err)) => {
                log(format!("Substituting {}: {}", pos, err), Warning);
                err.to_string()
            }
            Err(_) => {
                log(format!("Worker for {} panicked", pos), Error);
                "worker panicked".to_owned()
            }
        };
        // a closed channel means the region was abandoned
        let _ = sender.blocking_send(ChunkMessage::Failed { pos, reason });
    }

    fn compose_chunk(
        &self,
        snapshot: &SourceSnapshot,
        pos: ChunkPos,
        sender: &mpsc::Sender<ChunkMessage>,
        token: &CancellationToken,
    ) -> Result<()> {
        let features = self.placer.chunk_features(snapshot, pos)?;
        let columns = pos.columns();

        let claim = |x: i32, z: i32| self.placer.claim(&features, ColumnPos::new(x, z));
        let mut seams = SeamContext::default();
        for i in 0..16 {
            let (x, z) = (columns.min_x + i as i32, columns.min_z + i as i32);
            seams.north[i] = claim(x, columns.min_z - 1);
            seams.south[i] = claim(x, columns.max_z);
            seams.west[i] = claim(columns.min_x - 1, z);
            seams.east[i] = claim(columns.max_x, z);
        }
        if sender.blocking_send(ChunkMessage::Begin { pos, seams }).is_err() {
            return Ok(());
        }

        for (x, z) in columns.iter() {
            if token.is_cancelled() {
                return Ok(());
            }
            let column_pos = ColumnPos::new(x, z);
            let sample = self.sample(snapshot, column_pos)?;
            let layer = self.mapper.elevation_to_layer(sample.elevation);
            let mut column = self.terrain.synthesize(&sample, layer);

            let covering = self.placer.covering(&features, column_pos);
            let road = self.placer.place(
                &mut column,
                self.terrain.ground(layer),
                &covering,
                column_pos,
            );

            let message = ChunkMessage::Column {
                pos: column_pos,
                column: FinishedColumn { column, road },
            };
            if sender.blocking_send(message).is_err() {
                return Ok(());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metroblock_common::Rect;
    use metroblock_world::{
        FeatureInstance, FeatureKind, Footprint, InMemorySource, Network, Orientation,
        SourceReader,
    };

    fn pipeline(area: Rect) -> ColumnPipeline {
        let config = ConversionConfig {
            sea_level: 5,
            ..Default::default()
        };
        ColumnPipeline::new(&config, CoordinateMapper::new(&config, area))
    }

    fn drain(mut receiver: mpsc::Receiver<ChunkMessage>) -> Vec<ChunkMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn street(id: u64, min: [f64; 2], max: [f64; 2], height: Option<f64>) -> FeatureInstance {
        FeatureInstance {
            id,
            kind: FeatureKind::Road {
                network: Network::Street,
            },
            footprint: Footprint::Rect { min, max },
            height,
            orientation: Orientation::North,
        }
    }

    #[test]
    fn test_chunk_streams_begin_then_columns() {
        let area = Rect::new(0, 0, 32, 16);
        let source = InMemorySource::flat(area, SourceCell::ground(10.0))
            .with_feature(street(4, [15.0, 0.0], [17.0, 16.0], None));
        let snapshot = source.read_area(area).unwrap();
        let pipeline = pipeline(area);

        let (sender, receiver) = mpsc::channel(COLUMNS_PER_CHUNK + 8);
        pipeline.run_chunk(&snapshot, ChunkPos::new(0, 0), &sender, &CancellationToken::new());
        let messages = drain(receiver);

        assert_eq!(messages.len(), COLUMNS_PER_CHUNK + 1);
        match &messages[0] {
            ChunkMessage::Begin { pos, seams } => {
                assert_eq!(*pos, ChunkPos::new(0, 0));
                // the street continues into the next chunk
                assert_eq!(seams.east[3].map(|c| c.feature), Some(4));
                assert!(seams.west.iter().all(Option::is_none));
            }
            other => panic!("unexpected first message {:?}", other),
        }
        for message in &messages[1..] {
            let ChunkMessage::Column { pos, column } = message else {
                panic!("unexpected message {:?}", message);
            };
            assert_eq!(column.column.top_non_air(), Some(10));
            assert_eq!(column.road.is_some(), pos.x == 15);
        }
    }

    #[test]
    fn test_malformed_feature_fails_chunk() {
        let area = Rect::new(0, 0, 16, 16);
        let source = InMemorySource::flat(area, SourceCell::ground(3.0)).with_feature(
            FeatureInstance {
                id: 12,
                kind: FeatureKind::Water,
                footprint: Footprint::Polygon {
                    points: vec![[1.0, 1.0], [2.0, 2.0]],
                },
                height: Some(4.0),
                orientation: Orientation::North,
            },
        );
        let snapshot = source.read_area(area).unwrap();

        let (sender, receiver) = mpsc::channel(COLUMNS_PER_CHUNK + 8);
        pipeline(area).run_chunk(&snapshot, ChunkPos::new(0, 0), &sender, &CancellationToken::new());
        let messages = drain(receiver);

        assert_eq!(messages.len(), 1);
        let ChunkMessage::Failed { pos, reason } = &messages[0] else {
            panic!("expected a failure, got {:?}", messages[0]);
        };
        assert_eq!(*pos, ChunkPos::new(0, 0));
        assert!(reason.contains("#12"), "{}", reason);
    }

    #[test]
    fn test_cancelled_chunk_stops_early() {
        let area = Rect::new(0, 0, 16, 16);
        let snapshot = InMemorySource::flat(area, SourceCell::ground(3.0))
            .read_area(area)
            .unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let (sender, receiver) = mpsc::channel(COLUMNS_PER_CHUNK + 8);
        pipeline(area).run_chunk(&snapshot, ChunkPos::new(0, 0), &sender, &token);
        let messages = drain(receiver);
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ChunkMessage::Begin { .. }));
    }

    #[test]
    fn test_default_columns_use_mean_elevation() {
        let area = Rect::new(0, 0, 16, 16);
        let mut source = InMemorySource::flat(area, SourceCell::ground(10.0));
        for x in 0..16 {
            source.cell_mut(x, 0).unwrap().elevation = 26.0;
            source.cell_mut(x, 1).unwrap().water = true;
        }
        let snapshot = source.read_area(area).unwrap();

        let columns = pipeline(area).default_columns(&snapshot, ChunkPos::new(0, 0));
        assert_eq!(columns.len(), COLUMNS_PER_CHUNK);
        // (16 * 26 + 240 * 10) / 256 = 11
        assert!(columns.iter().all(|c| c.top_non_air() == Some(11)));
        assert!(columns
            .iter()
            .all(|c| !c.surface().is_some_and(|(_, b)| b.is_water())));
    }
}
