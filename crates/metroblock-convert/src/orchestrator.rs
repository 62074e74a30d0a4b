use crate::assembler::RegionAssembler;
use crate::compositor::ChunkCompositor;
use crate::config::ConversionConfig;
use crate::mapper::CoordinateMapper;
use crate::progress::{NoProgress, Phase, ProgressEvent, ProgressListener};
use crate::report::{ConversionReport, RegionOutcome, RegionReport};
use crate::terrain::smooth;
use crate::worker::{ChunkMessage, ColumnPipeline};
use futures::future::join_all;
use metroblock_common::types::CHUNK_WIDTH;
use metroblock_common::{ChunkPos, ColumnPos, ConvertError, Rect, RegionPos, Result};
use metroblock_logger::{log, LogSeverity};
use metroblock_world::{LevelInfo, Region, RegionWriter, SourceReader};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use LogSeverity::*;

const CHANNEL_CAPACITY: usize = 1024;

/// Chunks of one region, in z-then-x order
#[derive(Debug, Clone)]
struct RegionPlan {
    pos: RegionPos,
    chunks: Vec<ChunkPos>,
}

#[derive(Debug)]
struct BuiltRegion {
    region: Region,
    outcome: RegionOutcome,
    spawn_y: Option<i32>,
}

/// Every chunk touching `target`, grouped by region in region order.
fn plan(target: Rect) -> Vec<RegionPlan> {
    if target.is_empty() {
        return Vec::new();
    }
    let chunks = Rect::new(
        target.min_x.div_euclid(CHUNK_WIDTH),
        target.min_z.div_euclid(CHUNK_WIDTH),
        (target.max_x - 1).div_euclid(CHUNK_WIDTH) + 1,
        (target.max_z - 1).div_euclid(CHUNK_WIDTH) + 1,
    );

    let mut regions: BTreeMap<RegionPos, Vec<ChunkPos>> = BTreeMap::new();
    for (x, z) in chunks.iter() {
        let chunk = ChunkPos::new(x, z);
        regions.entry(chunk.region()).or_default().push(chunk);
    }
    regions
        .into_iter()
        .map(|(pos, chunks)| RegionPlan { pos, chunks })
        .collect()
}

fn center(target: Rect) -> ColumnPos {
    ColumnPos::new(
        target.min_x + target.width() / 2,
        target.min_z + target.depth() / 2,
    )
}

/// Drives a conversion: plans regions from the mapped area, builds them in
/// parallel batches and hands them to the writer in region order.
pub struct Converter {
    reader: Arc<dyn SourceReader>,
    writer: Arc<dyn RegionWriter>,
    config: ConversionConfig,
    progress: Arc<dyn ProgressListener>,
    token: CancellationToken,
    workers: Arc<Semaphore>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Converter {
    pub fn new(
        reader: Arc<dyn SourceReader>,
        writer: Arc<dyn RegionWriter>,
        config: ConversionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Converter {
            reader,
            writer,
            workers: Arc::new(Semaphore::new(config.column_workers)),
            config,
            progress: Arc::new(NoProgress),
            token: CancellationToken::new(),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressListener>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Cancelling the token lets the in-flight batch finish and fails the rest.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Same area and configuration, same id.
    pub fn run_id(&self, area: Rect) -> Uuid {
        let config = serde_json::to_string(&self.config).unwrap_or_default();
        let name = format!("{}|{}", area, config);
        Uuid::new_v3(&Uuid::NAMESPACE_OID, name.as_bytes())
    }

    pub async fn convert(&self, area: Rect) -> ConversionReport {
        let run_id = self.run_id(area);
        let mut report = ConversionReport::new(run_id);

        let reader = Arc::clone(&self.reader);
        let extent = match task::spawn_blocking(move || reader.extent()).await {
            Ok(extent) => extent,
            Err(err) => Err(ConvertError::SourceRead(format!("reader task failed: {}", err))),
        };
        let (mapper, extent_error) = match extent {
            Ok(extent) => (
                CoordinateMapper::new(&self.config, area.intersect(&extent)),
                None,
            ),
            Err(err) => (CoordinateMapper::new(&self.config, area), Some(err)),
        };

        // an area that cannot be placed in the world has no regions to plan
        let bounds = mapper.check_bounds();
        let target = mapper.target_rect();
        let plans = match bounds {
            Ok(()) => plan(target),
            Err(_) => Vec::new(),
        };
        log(
            format!(
                "Run {}: {} source cells, {} regions",
                run_id,
                mapper.area().area(),
                plans.len()
            ),
            Info,
        );
        self.progress.on_event(&ProgressEvent::RunStarted {
            run_id,
            regions: plans.len(),
        });

        let mut fatal = extent_error.or(bounds.err());
        let pipeline = Arc::new(ColumnPipeline::new(&self.config, mapper));
        let spawn = center(target);
        let mut spawn_y = None;

        for batch in plans.chunks(self.config.parallel_regions) {
            if let Some(err) = &fatal {
                for plan in batch {
                    self.finish_region(&mut report, RegionReport::failed(plan.pos, err.to_string()));
                }
                continue;
            }
            if self.token.is_cancelled() {
                for plan in batch {
                    self.finish_region(&mut report, RegionReport::failed(plan.pos, "cancelled"));
                }
                continue;
            }

            let built = join_all(
                batch
                    .iter()
                    .map(|plan| self.build_region(&pipeline, plan, spawn)),
            )
            .await;

            for (plan, result) in batch.iter().zip(built) {
                if let Some(err) = &fatal {
                    self.finish_region(&mut report, RegionReport::failed(plan.pos, err.to_string()));
                    continue;
                }
                let result = match result {
                    Ok(built) => {
                        spawn_y = spawn_y.or(built.spawn_y);
                        self.write_region(built).await
                    }
                    Err(err) => Err(err),
                };
                let region_report = match result {
                    Ok(region_report) => region_report,
                    Err(err) => {
                        log(format!("Region {} failed: {}", plan.pos, err), Error);
                        let failed = RegionReport::failed(plan.pos, err.to_string());
                        if err.is_fatal() {
                            fatal = Some(err);
                        }
                        failed
                    }
                };
                self.finish_region(&mut report, region_report);
            }
        }

        if fatal.is_none() {
            let level = LevelInfo {
                name: self.config.level_name.clone(),
                spawn: (
                    spawn.x,
                    spawn_y.unwrap_or(self.config.sea_level + 1),
                    spawn.z,
                ),
                min_y: self.config.world.min_y,
                height: self.config.world.height,
                sea_level: self.config.sea_level,
            };
            let writer = Arc::clone(&self.writer);
            let finished = task::spawn_blocking(move || writer.finish(&level))
                .await
                .map_err(|err| ConvertError::DestinationWrite(err.to_string()))
                .and_then(|result| result);
            if let Err(err) = finished {
                fatal = Some(err);
            }
        }
        if fatal.is_none() && self.token.is_cancelled() {
            fatal = Some(ConvertError::Cancelled);
        }
        if let Some(err) = &fatal {
            log(format!("Run {} stopped: {}", run_id, err), Error);
        }
        report.fatal = fatal;

        self.progress.on_event(&ProgressEvent::RunFinished {
            run_id,
            failed: report.failed_count(),
        });
        report
    }

    fn finish_region(&self, report: &mut ConversionReport, region: RegionReport) {
        log(
            format!("Region {}: {}", region.region, region.outcome),
            Debug,
        );
        self.progress.on_event(&ProgressEvent::RegionFinished {
            region: region.region,
            outcome: region.outcome.clone(),
        });
        report.regions.push(region);
    }

    async fn write_region(&self, built: BuiltRegion) -> Result<RegionReport> {
        let pos = built.region.pos();
        self.progress.on_event(&ProgressEvent::RegionPhase {
            region: pos,
            phase: Phase::Writing,
        });
        let chunks = built.region.chunk_count();
        let defaulted_chunks = built.region.defaulted_count();

        let writer = Arc::clone(&self.writer);
        let region = built.region;
        task::spawn_blocking(move || writer.write_region(region))
            .await
            .map_err(|err| ConvertError::DestinationWrite(err.to_string()))??;

        Ok(RegionReport {
            region: pos,
            outcome: built.outcome,
            chunks,
            defaulted_chunks,
        })
    }

    /// One region under its timeout. Timing out drops the region's receiver
    /// and cancels its chunk jobs.
    async fn build_region(
        &self,
        pipeline: &Arc<ColumnPipeline>,
        plan: &RegionPlan,
        spawn: ColumnPos,
    ) -> Result<BuiltRegion> {
        let after = self.config.region_timeout();
        let token = CancellationToken::new();
        let _guard = token.clone().drop_guard();

        match tokio::time::timeout(after, self.compose_region(pipeline, plan, spawn, token)).await {
            Ok(result) => result,
            Err(_) => Err(ConvertError::RegionTimeout {
                region: plan.pos,
                after,
            }),
        }
    }

    async fn compose_region(
        &self,
        pipeline: &Arc<ColumnPipeline>,
        plan: &RegionPlan,
        spawn: ColumnPos,
        token: CancellationToken,
    ) -> Result<BuiltRegion> {
        let pos = plan.pos;
        log(
            format!("Converting region {} ({} chunks)", pos, plan.chunks.len()),
            Info,
        );
        self.progress.on_event(&ProgressEvent::RegionStarted {
            region: pos,
            chunks: plan.chunks.len(),
        });

        self.progress.on_event(&ProgressEvent::RegionPhase {
            region: pos,
            phase: Phase::Reading,
        });
        let mapper = pipeline.mapper();
        let columns = pos.columns().intersect(&mapper.target_rect()).expand(1);
        let cells = mapper
            .cells_for_columns(columns)
            .expand(self.config.smoothing_passes as i32 + 1);
        let reader = Arc::clone(&self.reader);
        let mut snapshot = task::spawn_blocking(move || reader.read_area(cells))
            .await
            .map_err(|err| ConvertError::SourceRead(format!("reader task failed: {}", err)))??;

        let passes = self.config.smoothing_passes;
        if passes > 0 {
            self.progress.on_event(&ProgressEvent::RegionPhase {
                region: pos,
                phase: Phase::Smoothing,
            });
            snapshot = task::spawn_blocking(move || smooth(&snapshot, passes))
                .await
                .map_err(|err| ConvertError::Pipeline(format!("smoothing failed: {}", err)))?;
        }
        let snapshot = Arc::new(snapshot);

        self.progress.on_event(&ProgressEvent::RegionPhase {
            region: pos,
            phase: Phase::Composing,
        });
        let (sender, mut receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let producer = {
            let chunks = plan.chunks.clone();
            let pipeline = Arc::clone(pipeline);
            let snapshot = Arc::clone(&snapshot);
            let workers = Arc::clone(&self.workers);
            let token = token.clone();
            tokio::spawn(async move {
                let mut jobs = Vec::with_capacity(chunks.len());
                for chunk in chunks {
                    if token.is_cancelled() {
                        break;
                    }
                    let Ok(permit) = Arc::clone(&workers).acquire_owned().await else {
                        break;
                    };
                    let pipeline = Arc::clone(&pipeline);
                    let snapshot = Arc::clone(&snapshot);
                    let sender = sender.clone();
                    let token = token.clone();
                    jobs.push(task::spawn_blocking(move || {
                        let _permit = permit;
                        pipeline.run_chunk(&snapshot, chunk, &sender, &token);
                    }));
                }
                for job in jobs {
                    let _ = job.await;
                }
            })
        };

        let mut compositor = ChunkCompositor::new();
        let mut assembler = RegionAssembler::new();
        let mut full = None;
        let mut sealed = 0;
        let mut substituted = Vec::new();

        while let Some(message) = receiver.recv().await {
            let chunk = match message {
                ChunkMessage::Begin { pos, seams } => {
                    compositor.open(pos, seams)?;
                    continue;
                }
                ChunkMessage::Column { pos, column } => match compositor.accept(pos, column)? {
                    Some(chunk) => chunk,
                    None => continue,
                },
                ChunkMessage::Failed { pos, reason } => {
                    let columns = pipeline.default_columns(&snapshot, pos);
                    substituted.push(format!("{}: {}", pos, reason));
                    compositor.substitute(pos, &columns)?
                }
            };

            sealed += 1;
            self.progress.on_event(&ProgressEvent::ChunkSealed {
                chunk: chunk.pos(),
                defaulted: chunk.flags().defaulted,
            });
            if let Some(region) = assembler.insert(chunk)? {
                full = Some(region);
            }
        }
        producer
            .await
            .map_err(|err| ConvertError::Pipeline(format!("chunk producer failed: {}", err)))?;

        let region = match full {
            Some(region) => region,
            None => assembler.finish(pos, sealed == plan.chunks.len())?,
        };

        let spawn_chunk = spawn.chunk();
        let spawn_y = (spawn_chunk.region() == pos)
            .then(|| region.get(spawn_chunk.region_index()))
            .flatten()
            .map(|chunk| {
                let (x, z) = spawn.local();
                chunk.min_y() + chunk.surface_height(x, z) as i32
            });

        let outcome = if substituted.is_empty() {
            RegionOutcome::Converted
        } else {
            RegionOutcome::ConvertedWithDefaults(substituted.join("; "))
        };
        Ok(BuiltRegion {
            region,
            outcome,
            spawn_y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScaleFactor;
    use assert_matches::assert_matches;
    use metroblock_world::{InMemorySource, SourceCell, SourceSnapshot};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MemoryWriter {
        regions: Mutex<Vec<Region>>,
        level: Mutex<Option<LevelInfo>>,
    }

    impl RegionWriter for MemoryWriter {
        fn write_region(&self, region: Region) -> Result<()> {
            self.regions.lock().unwrap().push(region);
            Ok(())
        }

        fn finish(&self, level: &LevelInfo) -> Result<()> {
            *self.level.lock().unwrap() = Some(level.clone());
            Ok(())
        }
    }

    struct SlowReader(InMemorySource);

    impl SourceReader for SlowReader {
        fn extent(&self) -> Result<Rect> {
            self.0.extent()
        }

        fn read_area(&self, area: Rect) -> Result<SourceSnapshot> {
            std::thread::sleep(Duration::from_millis(2500));
            self.0.read_area(area)
        }
    }

    fn config() -> ConversionConfig {
        ConversionConfig {
            sea_level: 5,
            column_workers: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_groups_chunks_by_region() {
        let plans = plan(Rect::new(-20, 0, 520, 16));
        let regions: Vec<RegionPos> = plans.iter().map(|p| p.pos).collect();
        assert_eq!(
            regions,
            vec![RegionPos::new(-1, 0), RegionPos::new(0, 0), RegionPos::new(1, 0)]
        );
        assert_eq!(plans[0].chunks, vec![ChunkPos::new(-2, 0), ChunkPos::new(-1, 0)]);
        assert_eq!(plans[1].chunks.len(), 32);
        assert_eq!(plans[2].chunks, vec![ChunkPos::new(32, 0)]);
        assert!(plan(Rect::new(0, 0, 0, 10)).is_empty());
    }

    #[tokio::test]
    async fn test_convert_single_region() {
        let source = InMemorySource::flat(Rect::new(0, 0, 20, 20), SourceCell::ground(10.0));
        let writer = Arc::new(MemoryWriter::default());
        let converter = Converter::new(Arc::new(source), writer.clone(), config()).unwrap();

        let report = converter.convert(Rect::new(0, 0, 20, 20)).await;
        assert!(report.is_success(), "{:?}", report);
        assert_eq!(report.regions.len(), 1);
        assert_eq!(report.regions[0].outcome, RegionOutcome::Converted);
        assert_eq!(report.regions[0].chunks, 4);

        let regions = writer.regions.lock().unwrap();
        let chunk = regions[0].get(ChunkPos::new(1, 1).region_index()).unwrap();
        // columns past the area edge repeat the edge samples
        assert_eq!(chunk.column(15, 15).top_non_air(), Some(10));

        let level = writer.level.lock().unwrap().clone().unwrap();
        assert_eq!(level.spawn, (10, 11, 10));
        assert_eq!(report.run_id, converter.run_id(Rect::new(0, 0, 20, 20)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let source = InMemorySource::flat(Rect::new(0, 0, 600, 16), SourceCell::ground(1.0));
        let writer = Arc::new(MemoryWriter::default());
        let converter = Converter::new(Arc::new(source), writer.clone(), config()).unwrap();
        converter.cancellation_token().cancel();

        let report = converter.convert(Rect::new(0, 0, 600, 16)).await;
        assert_eq!(report.regions.len(), 2);
        assert!(report
            .regions
            .iter()
            .all(|r| r.outcome == RegionOutcome::Failed("cancelled".to_owned())));
        assert_matches!(report.fatal, Some(ConvertError::Cancelled));
        assert!(writer.regions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_region_timeout() {
        let source = InMemorySource::flat(Rect::new(0, 0, 16, 16), SourceCell::ground(1.0));
        let writer = Arc::new(MemoryWriter::default());
        let config = ConversionConfig {
            region_timeout_secs: 1,
            ..config()
        };
        let converter =
            Converter::new(Arc::new(SlowReader(source)), writer.clone(), config).unwrap();

        let report = converter.convert(Rect::new(0, 0, 16, 16)).await;
        assert_matches!(
            &report.regions[0].outcome,
            RegionOutcome::Failed(reason) if reason.contains("timed out")
        );
        // a timeout fails the region, not the run
        assert!(report.fatal.is_none());
        assert!(writer.regions.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let source = InMemorySource::flat(Rect::new(0, 0, 1, 1), SourceCell::default());
        let config = ConversionConfig {
            parallel_regions: 0,
            ..Default::default()
        };
        let result = Converter::new(Arc::new(source), Arc::new(MemoryWriter::default()), config);
        assert_matches!(result, Err(ConvertError::Config(_)));
    }

    #[test]
    fn test_run_id_is_deterministic() {
        let make = |sea_level| {
            let source = InMemorySource::flat(Rect::new(0, 0, 1, 1), SourceCell::default());
            let config = ConversionConfig {
                sea_level,
                ..config()
            };
            Converter::new(Arc::new(source), Arc::new(MemoryWriter::default()), config).unwrap()
        };
        let area = Rect::new(0, 0, 1, 1);
        assert_eq!(make(5).run_id(area), make(5).run_id(area));
        assert_ne!(make(5).run_id(area), make(6).run_id(area));
        assert_eq!(make(5).run_id(area).get_version_num(), 3);
    }

    #[tokio::test]
    async fn test_out_of_bounds_origin_stops_before_planning() {
        let source = InMemorySource::flat(Rect::new(0, 0, 16, 16), SourceCell::ground(1.0));
        let writer = Arc::new(MemoryWriter::default());
        let config = ConversionConfig {
            scale: ScaleFactor::Up(4_000_000),
            ..config()
        };
        let converter = Converter::new(Arc::new(source), writer.clone(), config).unwrap();

        let report = converter.convert(Rect::new(0, 0, 16, 16)).await;
        assert_matches!(report.fatal, Some(ConvertError::OutOfBounds { .. }));
        assert!(report.regions.is_empty());
        assert!(writer.regions.lock().unwrap().is_empty());
        assert!(writer.level.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tall_terrain_is_clamped_not_defaulted() {
        let mut source = InMemorySource::flat(Rect::new(0, 0, 32, 16), SourceCell::ground(1e10));
        source.cell_mut(20, 4).unwrap().elevation = 12.0;
        let writer = Arc::new(MemoryWriter::default());
        let config = ConversionConfig {
            vertical_offset: 1,
            ..config()
        };
        let converter = Converter::new(Arc::new(source), writer.clone(), config).unwrap();

        let report = converter.convert(Rect::new(0, 0, 32, 16)).await;
        assert!(report.is_success(), "{:?}", report);
        assert_eq!(report.regions[0].outcome, RegionOutcome::Converted);

        let regions = writer.regions.lock().unwrap();
        let tall = regions[0].get(ChunkPos::new(0, 0).region_index()).unwrap();
        assert_eq!(tall.column(3, 3).top_non_air(), Some(319));
        let mixed = regions[0].get(ChunkPos::new(1, 0).region_index()).unwrap();
        assert_eq!(mixed.column(4, 4).top_non_air(), Some(13));
        assert_eq!(mixed.column(5, 4).top_non_air(), Some(319));
    }

    #[test]
    fn test_convert_blocks_on_tokio_test() {
        let source = InMemorySource::flat(Rect::new(0, 0, 2, 2), SourceCell::ground(0.0));
        let converter =
            Converter::new(Arc::new(source), Arc::new(MemoryWriter::default()), config()).unwrap();
        let report = tokio_test::block_on(converter.convert(Rect::new(5, 5, 9, 9)));
        // nothing of the area lies inside the save
        assert!(report.regions.is_empty());
        assert!(report.is_success());
    }
}
