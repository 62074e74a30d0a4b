use metroblock_common::{ConvertError, Rect, Result};
use metroblock_world::{FeatureClass, InMemorySource, SourceDocument, SourceReader, SourceSnapshot};
use std::collections::BTreeMap;
use std::path::Path;

/// Source save stored as one JSON document.
#[derive(Debug, Clone)]
pub struct JsonSourceReader {
    source: InMemorySource,
}

impl JsonSourceReader {
    pub fn open(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConvertError::SourceRead(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
            .map_err(|e| ConvertError::SourceRead(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let document: SourceDocument = serde_json::from_str(text)
            .map_err(|e| ConvertError::SourceRead(format!("invalid source document: {}", e)))?;
        Ok(JsonSourceReader {
            source: InMemorySource::from_document(document)?,
        })
    }

    pub fn source(&self) -> &InMemorySource {
        &self.source
    }
}

impl SourceReader for JsonSourceReader {
    fn extent(&self) -> Result<Rect> {
        self.source.extent()
    }

    fn read_area(&self, area: Rect) -> Result<SourceSnapshot> {
        self.source.read_area(area)
    }
}

/// Feature diagnostics for a whole save
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSummary {
    pub counts: BTreeMap<FeatureClass, usize>,
    /// `(id, reason)` of every feature that would force a default chunk
    pub malformed: Vec<(u64, String)>,
}

pub fn feature_summary(source: &InMemorySource) -> FeatureSummary {
    let mut summary = FeatureSummary::default();
    for feature in source.features() {
        *summary.counts.entry(feature.class()).or_default() += 1;
        if let Err(err) = feature.validate() {
            summary.malformed.push((feature.id, err.to_string()));
        }
    }
    summary.malformed.sort();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const DOCUMENT: &str = r#"{
        "extent": {"min_x": 0, "min_z": 0, "max_x": 2, "max_z": 1},
        "cells": [
            {"elevation": 4.5, "zone": "residential", "wealth": "high"},
            {"elevation": 1.0, "water": true}
        ],
        "features": [
            {"id": 3, "type": "building", "zone": "commercial",
             "footprint": {"shape": "rect", "min": [0.0, 0.0], "max": [1.0, 1.0]}, "height": 12.0},
            {"id": 1, "type": "road", "network": "rail", "orientation": "east",
             "footprint": {"shape": "polygon", "points": [[0.0, 0.0], [2.0, 0.0], [2.0, 0.5]]}},
            {"id": 2, "type": "vegetation", "species": "oak",
             "footprint": {"shape": "rect", "min": [1.0, 0.0], "max": [1.0, 1.0]}, "height": 3.0}
        ]
    }"#;

    #[test]
    fn test_parse_document() {
        let reader = JsonSourceReader::parse(DOCUMENT).unwrap();
        assert_eq!(reader.extent().unwrap(), Rect::new(0, 0, 2, 1));

        let snapshot = reader.read_area(Rect::new(0, 0, 2, 1)).unwrap();
        assert_eq!(snapshot.cell(0, 0).unwrap().elevation, 4.5);
        assert!(snapshot.cell(1, 0).unwrap().water);
        let ids: Vec<u64> = snapshot.features().iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_feature_summary() {
        let reader = JsonSourceReader::parse(DOCUMENT).unwrap();
        let summary = feature_summary(reader.source());
        assert_eq!(summary.counts[&FeatureClass::Road], 1);
        assert_eq!(summary.counts[&FeatureClass::Building], 1);
        assert_eq!(summary.malformed.len(), 1);
        assert_eq!(summary.malformed[0].0, 2);
    }

    #[test]
    fn test_rejects_bad_documents() {
        assert_matches!(
            JsonSourceReader::parse("{\"extent\": 3}"),
            Err(ConvertError::SourceRead(_))
        );
        let short = r#"{"extent": {"min_x": 0, "min_z": 0, "max_x": 2, "max_z": 2}, "cells": []}"#;
        assert_matches!(JsonSourceReader::parse(short), Err(ConvertError::SourceRead(_)));
        assert_matches!(
            JsonSourceReader::open(Path::new("/nonexistent/city.json")),
            Err(ConvertError::SourceRead(_))
        );
    }
}
