mod common;

use common::*;
use metroblock_cli::{AnvilRegionWriter, JsonSourceReader};
use metroblock_common::{Rect, RegionPos};
use metroblock_convert::{ConversionConfig, Converter, RegionOutcome};
use metroblock_nbt::{AnvilRegion, NbtFile, Tag};
use metroblock_world::{FeatureInstance, FeatureKind, Footprint, Orientation, Wealth, ZoneType};
use std::path::Path;
use std::sync::Arc;

fn house() -> FeatureInstance {
    FeatureInstance {
        id: 1,
        kind: FeatureKind::Building {
            zone: ZoneType::Residential,
            wealth: Wealth::Medium,
        },
        footprint: Footprint::Rect {
            min: [4.0, 4.0],
            max: [8.0, 8.0],
        },
        height: Some(20.0),
        orientation: Orientation::North,
    }
}

async fn convert(source: &Path, output: &Path) -> metroblock_convert::ConversionReport {
    let reader = Arc::new(JsonSourceReader::open(source).unwrap());
    let writer = Arc::new(AnvilRegionWriter::create(output, true).unwrap());
    let config = ConversionConfig {
        sea_level: 5,
        column_workers: 2,
        ..Default::default()
    };
    let converter = Converter::new(reader, writer, config).unwrap();
    converter.convert(Rect::new(0, 0, 24, 24)).await
}

#[tokio::test]
async fn test_json_source_to_anvil_world() {
    let dir = scratch_dir("world");
    let source = write_document(&dir, &flat_document(Rect::new(0, 0, 24, 24), 10.0, vec![house()]));
    let output = dir.join("world");

    let report = convert(&source, &output).await;
    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.regions[0].outcome, RegionOutcome::Converted);

    let path = output.join("region").join("r.0.0.mca");
    assert_eq!(std::fs::metadata(&path).unwrap().len() % 4096, 0);
    let region = AnvilRegion::load(&path).unwrap();
    assert_eq!(region.len(), 4);
    // 2x2 chunks occupy slots 0, 1, 32 and 33
    for slot in [0, 1, 32, 33] {
        let chunk = region.get(slot).unwrap();
        assert_eq!(chunk.get("DataVersion").and_then(Tag::as_i32), Some(3218));
        assert_eq!(chunk.get("Status").and_then(Tag::as_str), Some("minecraft:full"));
    }
    assert_eq!(region.get(33).and_then(|c| c.get("zPos")).and_then(Tag::as_i32), Some(1));

    let level = NbtFile::load(&output.join("level.dat")).unwrap();
    assert_eq!(
        level.root.get_path("Data/SpawnY").and_then(Tag::as_i32),
        Some(11)
    );
    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_rerun_writes_identical_regions() {
    let dir = scratch_dir("rerun");
    let source = write_document(&dir, &flat_document(Rect::new(0, 0, 24, 24), 7.5, vec![house()]));

    let first = convert(&source, &dir.join("a")).await;
    let second = convert(&source, &dir.join("b")).await;
    assert_eq!(first.run_id, second.run_id);

    let region = |root: &str| {
        std::fs::read(
            dir.join(root)
                .join("region")
                .join(format!("{}.mca", RegionPos::new(0, 0))),
        )
        .unwrap()
    };
    assert_eq!(region("a"), region("b"));
    std::fs::remove_dir_all(&dir).unwrap();
}
