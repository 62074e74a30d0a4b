//! Read-only model of the simulation save: a grid of cells plus discrete
//! features, and the reader contract that produces snapshots of it.

use metroblock_common::{ConvertError, Rect, Result};
use metroblock_logger::{log, LogSeverity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    #[default]
    None,
    Residential,
    Commercial,
    Industrial,
    Agricultural,
    Park,
    Civic,
}

impl ZoneType {
    pub fn is_zoned(&self) -> bool {
        !matches!(self, ZoneType::None)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wealth {
    #[default]
    Low,
    Medium,
    High,
}

/// One cell of the source grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceCell {
    pub elevation: f64,
    pub zone: ZoneType,
    pub wealth: Wealth,
    pub water: bool,
    pub slope: f64,
}

impl SourceCell {
    pub fn ground(elevation: f64) -> Self {
        SourceCell {
            elevation,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Street,
    Road,
    Avenue,
    Rail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Oak,
    Birch,
    Spruce,
    Jungle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    North,
    East,
    South,
    West,
}

/// Overlap classes used by the priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureClass {
    Road,
    Building,
    Vegetation,
    Water,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureKind {
    Road {
        network: Network,
    },
    Building {
        zone: ZoneType,
        #[serde(default)]
        wealth: Wealth,
    },
    Vegetation {
        species: Species,
    },
    Water,
}

impl FeatureKind {
    pub fn class(&self) -> FeatureClass {
        match self {
            FeatureKind::Road { .. } => FeatureClass::Road,
            FeatureKind::Building { .. } => FeatureClass::Building,
            FeatureKind::Vegetation { .. } => FeatureClass::Vegetation,
            FeatureKind::Water => FeatureClass::Water,
        }
    }
}

/// Axis-aligned bounds `[min_x, min_z, max_x, max_z]` in source coordinates
pub type Bounds = [f64; 4];

/// Feature outline in continuous source coordinates (one unit per cell).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Footprint {
    /// Half-open rectangle `min <= p < max`
    Rect { min: [f64; 2], max: [f64; 2] },
    Polygon { points: Vec<[f64; 2]> },
}

impl Footprint {
    fn points(&self) -> Vec<[f64; 2]> {
        match self {
            Footprint::Rect { min, max } => vec![*min, *max],
            Footprint::Polygon { points } => points.clone(),
        }
    }

    /// Bounding box, or `None` when any coordinate is not finite.
    pub fn bounds(&self) -> Option<Bounds> {
        let points = self.points();
        if points.is_empty() || points.iter().flatten().any(|v| !v.is_finite()) {
            return None;
        }
        Some(points.iter().fold(
            [f64::MAX, f64::MAX, f64::MIN, f64::MIN],
            |[min_x, min_z, max_x, max_z], [x, z]| {
                [min_x.min(*x), min_z.min(*z), max_x.max(*x), max_z.max(*z)]
            },
        ))
    }

    /// Box a footprint may claim, built from its finite coordinates. An
    /// axis without a single finite coordinate spans everything, so a
    /// footprint that cannot be located still reaches the chunks it may cover.
    pub fn reach(&self) -> Bounds {
        let mut reach = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
        for point in self.points() {
            for axis in 0..2 {
                let v = point[axis];
                if v.is_finite() {
                    reach[axis] = reach[axis].min(v);
                    reach[axis + 2] = reach[axis + 2].max(v);
                }
            }
        }
        for axis in 0..2 {
            if reach[axis] > reach[axis + 2] {
                reach[axis] = f64::NEG_INFINITY;
                reach[axis + 2] = f64::INFINITY;
            }
        }
        reach
    }

    pub fn center(&self) -> Option<[f64; 2]> {
        self.bounds()
            .map(|[min_x, min_z, max_x, max_z]| [(min_x + max_x) / 2.0, (min_z + max_z) / 2.0])
    }

    /// Point test; polygons use the even-odd rule.
    pub fn contains(&self, x: f64, z: f64) -> bool {
        match self {
            Footprint::Rect { min, max } => x >= min[0] && x < max[0] && z >= min[1] && z < max[1],
            Footprint::Polygon { points } => {
                let mut inside = false;
                let mut j = points.len().wrapping_sub(1);
                for i in 0..points.len() {
                    let [xi, zi] = points[i];
                    let [xj, zj] = points[j];
                    if (zi > z) != (zj > z) && x < (xj - xi) * (z - zi) / (zj - zi) + xi {
                        inside = !inside;
                    }
                    j = i;
                }
                inside
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.points().iter().flatten().any(|v| !v.is_finite()) {
            return Err("footprint has non-finite coordinates".to_owned());
        }
        match self {
            Footprint::Rect { min, max } => {
                if min[0] >= max[0] || min[1] >= max[1] {
                    return Err(format!(
                        "rectangle [{}, {}]..[{}, {}] is empty or inverted",
                        min[0], min[1], max[0], max[1]
                    ));
                }
            }
            Footprint::Polygon { points } => {
                if points.len() < 3 {
                    return Err(format!(
                        "polygon needs at least 3 points, got {}",
                        points.len()
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInstance {
    pub id: u64,
    #[serde(flatten)]
    pub kind: FeatureKind,
    pub footprint: Footprint,
    /// Absolute source elevation of the feature top; a road's grade
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub orientation: Orientation,
}

impl FeatureInstance {
    pub fn class(&self) -> FeatureClass {
        self.kind.class()
    }

    pub fn validate(&self) -> Result<()> {
        let malformed = |reason: String| ConvertError::MalformedFeature {
            id: self.id,
            reason,
        };
        self.footprint.validate().map_err(malformed)?;
        match (&self.kind, self.height) {
            (FeatureKind::Road { .. }, None) => Ok(()),
            (FeatureKind::Road { .. }, Some(grade)) if !grade.is_finite() => {
                Err(malformed(format!("road grade {} is not finite", grade)))
            }
            (_, None) => Err(malformed("missing height".to_owned())),
            (_, Some(height)) if !height.is_finite() => {
                Err(malformed(format!("height {} is not finite", height)))
            }
            _ => Ok(()),
        }
    }
}

/// Immutable view of the cells and features of one source area.
/// Cells are stored row by row over `area`; features are sorted by id.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSnapshot {
    extent: Rect,
    area: Rect,
    cells: Vec<SourceCell>,
    features: Vec<FeatureInstance>,
}

impl SourceSnapshot {
    pub fn new(
        extent: Rect,
        area: Rect,
        cells: Vec<SourceCell>,
        mut features: Vec<FeatureInstance>,
    ) -> Result<Self> {
        if cells.len() != area.area() {
            return Err(ConvertError::SourceRead(format!(
                "area {} needs {} cells, got {}",
                area,
                area.area(),
                cells.len()
            )));
        }
        features.sort_by_key(|f| f.id);
        Ok(SourceSnapshot {
            extent,
            area,
            cells,
            features,
        })
    }

    /// Whole grid of the save, not only this snapshot.
    pub fn extent(&self) -> Rect {
        self.extent
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn cell(&self, x: i32, z: i32) -> Option<&SourceCell> {
        self.area.index_of(x, z).map(|i| &self.cells[i])
    }

    pub fn cells(&self) -> &[SourceCell] {
        &self.cells
    }

    pub fn features(&self) -> &[FeatureInstance] {
        &self.features
    }

    /// Copy of this snapshot with replaced elevations, in cell order.
    pub fn with_elevations(&self, elevations: &[f64]) -> SourceSnapshot {
        let cells = self
            .cells
            .iter()
            .zip(elevations)
            .map(|(cell, elevation)| SourceCell {
                elevation: *elevation,
                ..cell.clone()
            })
            .collect();
        SourceSnapshot {
            extent: self.extent,
            area: self.area,
            cells,
            features: self.features.clone(),
        }
    }
}

/// Parsed source save access.
pub trait SourceReader: Send + Sync {
    /// Cell extent of the whole save.
    fn extent(&self) -> Result<Rect>;

    /// Snapshot of the cells in `area` (clipped to the extent) and of every
    /// feature whose bounds touch it.
    fn read_area(&self, area: Rect) -> Result<SourceSnapshot>;
}

/// Serialized form of a whole source save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub extent: Rect,
    pub cells: Vec<SourceCell>,
    #[serde(default)]
    pub features: Vec<FeatureInstance>,
}

/// A source save held entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    extent: Rect,
    cells: Vec<SourceCell>,
    features: Vec<FeatureInstance>,
}

impl InMemorySource {
    pub fn new(extent: Rect, cells: Vec<SourceCell>, features: Vec<FeatureInstance>) -> Result<Self> {
        if cells.len() != extent.area() {
            return Err(ConvertError::SourceRead(format!(
                "extent {} needs {} cells, got {}",
                extent,
                extent.area(),
                cells.len()
            )));
        }
        Ok(InMemorySource {
            extent,
            cells,
            features,
        })
    }

    pub fn from_document(document: SourceDocument) -> Result<Self> {
        InMemorySource::new(document.extent, document.cells, document.features)
    }

    /// Uniform grid, handy for building test worlds.
    pub fn flat(extent: Rect, cell: SourceCell) -> Self {
        InMemorySource {
            extent,
            cells: vec![cell; extent.area()],
            features: Vec::new(),
        }
    }

    pub fn with_feature(mut self, feature: FeatureInstance) -> Self {
        self.features.push(feature);
        self
    }

    pub fn cell_mut(&mut self, x: i32, z: i32) -> Option<&mut SourceCell> {
        self.extent.index_of(x, z).map(|i| &mut self.cells[i])
    }

    pub fn features(&self) -> &[FeatureInstance] {
        &self.features
    }
}

/// Whether `bounds` reaches into the half-open `area`. A box ending exactly
/// on the low edge of `area` does not, unless it is flat on that axis.
pub fn touches(bounds: &Bounds, area: &Bounds) -> bool {
    let overlaps = |min: f64, max: f64, low: f64, high: f64| {
        min < high && (max > low || (min == max && min >= low))
    };
    overlaps(bounds[0], bounds[2], area[0], area[2]) && overlaps(bounds[1], bounds[3], area[1], area[3])
}

impl SourceReader for InMemorySource {
    fn extent(&self) -> Result<Rect> {
        Ok(self.extent)
    }

    fn read_area(&self, area: Rect) -> Result<SourceSnapshot> {
        let clipped = area.intersect(&self.extent);
        let cells = clipped
            .iter()
            .filter_map(|(x, z)| self.extent.index_of(x, z))
            .map(|i| self.cells[i].clone())
            .collect();

        let mut features = Vec::new();
        if !clipped.is_empty() {
            let area = [
                clipped.min_x as f64,
                clipped.min_z as f64,
                clipped.max_x as f64,
                clipped.max_z as f64,
            ];
            for feature in &self.features {
                if !touches(&feature.footprint.reach(), &area) {
                    continue;
                }
                if feature.footprint.bounds().is_none() {
                    log(
                        format!("Feature #{} has non-finite coordinates", feature.id),
                        LogSeverity::Debug,
                    );
                }
                features.push(feature.clone());
            }
        }

        SourceSnapshot::new(self.extent, clipped, cells, features)
    }
}
