use metroblock_common::Rect;
use metroblock_world::{FeatureInstance, SourceCell, SourceDocument};
use std::path::{Path, PathBuf};

/// Fresh directory under the system temp dir, unique per test and process.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("metroblock-cli-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn flat_document(extent: Rect, elevation: f64, features: Vec<FeatureInstance>) -> SourceDocument {
    SourceDocument {
        extent,
        cells: vec![SourceCell::ground(elevation); extent.area()],
        features,
    }
}

pub fn write_document(dir: &Path, document: &SourceDocument) -> PathBuf {
    let path = dir.join("city.json");
    std::fs::write(&path, serde_json::to_string(document).unwrap()).unwrap();
    path
}
