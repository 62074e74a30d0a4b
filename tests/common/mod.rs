#![allow(dead_code)]

use metroblock::common::{ConvertError, Rect, RegionPos, Result};
use metroblock::convert::{ConversionConfig, ConversionReport, Converter, ProgressEvent, ProgressListener};
use metroblock::world::{
    FeatureInstance, FeatureKind, Footprint, InMemorySource, LevelInfo, Orientation, Region,
    RegionWriter, SourceCell,
};
use std::sync::{Arc, Mutex};

/// Keeps written regions in memory, in write order.
#[derive(Default)]
pub struct MemoryWriter {
    pub regions: Mutex<Vec<Region>>,
    pub level: Mutex<Option<LevelInfo>>,
}

impl MemoryWriter {
    pub fn regions(&self) -> Vec<Region> {
        self.regions.lock().unwrap().clone()
    }
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

/// Accepts the first `limit` regions, then rejects every later one.
#[derive(Default)]
pub struct FailingWriter {
    pub limit: usize,
    pub written: Mutex<Vec<RegionPos>>,
}

impl FailingWriter {
    pub fn after(limit: usize) -> Self {
        FailingWriter {
            limit,
            written: Mutex::new(Vec::new()),
        }
    }
}

impl RegionWriter for FailingWriter {
    fn write_region(&self, region: Region) -> Result<()> {
        let mut written = self.written.lock().unwrap();
        if written.len() >= self.limit {
            return Err(ConvertError::DestinationWrite(format!(
                "disk full while writing {}",
                region.pos()
            )));
        }
        written.push(region.pos());
        Ok(())
    }
}

/// Records every progress event.
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressListener for RecordingProgress {
    fn on_event(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn test_config() -> ConversionConfig {
    ConversionConfig {
        sea_level: 5,
        column_workers: 4,
        ..Default::default()
    }
}

pub fn flat_source(extent: Rect, elevation: f64) -> InMemorySource {
    InMemorySource::flat(extent, SourceCell::ground(elevation))
}

pub fn rect_feature(id: u64, kind: FeatureKind, min: [f64; 2], max: [f64; 2], height: Option<f64>) -> FeatureInstance {
    FeatureInstance {
        id,
        kind,
        footprint: Footprint::Rect { min, max },
        height,
        orientation: Orientation::North,
    }
}

pub async fn run(
    source: InMemorySource,
    config: ConversionConfig,
    area: Rect,
) -> (ConversionReport, Arc<MemoryWriter>) {
    let writer = Arc::new(MemoryWriter::default());
    let converter = Converter::new(Arc::new(source), writer.clone(), config).unwrap();
    let report = converter.convert(area).await;
    (report, writer)
}
