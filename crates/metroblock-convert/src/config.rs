use metroblock_common::{ConvertError, Result};
use metroblock_world::{blocks, BlockState, FeatureClass};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Largest world border the engine accepts
const MAX_HORIZONTAL_LIMIT: i64 = 30_000_000;
/// Build height bound in either direction
const MAX_VERTICAL_EXTENT: i64 = 2032;

/// Horizontal scale between source cells and target columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleFactor {
    /// One cell becomes n×n columns
    Up(u32),
    /// n×n cells become one column
    Down(u32),
}

impl Default for ScaleFactor {
    fn default() -> Self {
        ScaleFactor::Up(1)
    }
}

impl ScaleFactor {
    pub fn factor(&self) -> u32 {
        match self {
            ScaleFactor::Up(n) | ScaleFactor::Down(n) => *n,
        }
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleFactor::Up(n) => write!(f, "up:{}", n),
            ScaleFactor::Down(n) => write!(f, "down:{}", n),
        }
    }
}

/// Parses `up:4`, `down:2` or a bare factor meaning `up`.
impl FromStr for ScaleFactor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (direction, factor) = s.split_once(':').unwrap_or(("up", s));
        let factor: u32 = factor
            .trim()
            .parse()
            .map_err(|_| format!("invalid scale factor '{}'", s))?;
        match direction.trim() {
            "up" => Ok(ScaleFactor::Up(factor)),
            "down" => Ok(ScaleFactor::Down(factor)),
            other => Err(format!("unknown scale direction '{}'", other)),
        }
    }
}

/// How downscaled cells are combined into one elevation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Mean,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldLimits {
    pub min_y: i32,
    pub height: u32,
    /// Largest absolute block x/z a column may use
    pub horizontal_limit: i64,
}

impl Default for WorldLimits {
    fn default() -> Self {
        WorldLimits {
            min_y: -64,
            height: 384,
            horizontal_limit: 29_999_984,
        }
    }
}

impl WorldLimits {
    /// One past the highest buildable y.
    pub fn max_y(&self) -> i32 {
        self.min_y + self.height as i32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrataLayer {
    pub block: BlockState,
    #[serde(default)]
    pub depth: u32,
}

impl StrataLayer {
    pub fn new(block: &BlockState, depth: u32) -> Self {
        StrataLayer {
            block: block.clone(),
            depth,
        }
    }
}

/// Ground material from the surface down. The last layer fills everything
/// between the layers above it and the floor, whatever its depth says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrataProfile {
    pub floor: BlockState,
    pub layers: Vec<StrataLayer>,
}

impl Default for StrataProfile {
    fn default() -> Self {
        StrataProfile {
            floor: blocks::BEDROCK.clone(),
            layers: vec![
                StrataLayer::new(&blocks::GRASS_BLOCK, 1),
                StrataLayer::new(&blocks::DIRT, 3),
                StrataLayer::new(&blocks::STONE, 0),
            ],
        }
    }
}

impl StrataProfile {
    pub fn fill_block(&self) -> &BlockState {
        self.layers.last().map_or(&self.floor, |layer| &layer.block)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub scale: ScaleFactor,
    pub aggregation: Aggregation,
    /// Target column of source cell (0, 0)
    pub origin: [i32; 2],
    pub vertical_scale: f64,
    pub vertical_offset: i32,
    pub sea_level: i32,
    pub world: WorldLimits,
    pub strata: StrataProfile,
    /// Land this far above sea level still gets a sand surface
    pub beach_height: i32,
    /// Slope at which the surface turns to bare rock
    pub rock_slope: Option<f64>,
    pub smoothing_passes: u32,
    /// Feature classes from highest to lowest priority
    pub feature_priority: Vec<FeatureClass>,
    pub region_timeout_secs: u64,
    pub parallel_regions: usize,
    pub column_workers: usize,
    pub level_name: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        ConversionConfig {
            scale: ScaleFactor::default(),
            aggregation: Aggregation::default(),
            origin: [0, 0],
            vertical_scale: 1.0,
            vertical_offset: 0,
            sea_level: 62,
            world: WorldLimits::default(),
            strata: StrataProfile::default(),
            beach_height: 2,
            rock_slope: None,
            smoothing_passes: 0,
            feature_priority: vec![
                FeatureClass::Road,
                FeatureClass::Building,
                FeatureClass::Vegetation,
                FeatureClass::Water,
            ],
            region_timeout_secs: 300,
            parallel_regions: 2,
            column_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            level_name: "Converted City".to_owned(),
        }
    }
}

impl ConversionConfig {
    pub fn load(path: &Path) -> Result<ConversionConfig> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConvertError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: ConversionConfig = serde_json::from_str(&text).map_err(|e| {
            ConvertError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(ConvertError::Config(msg));

        if self.scale.factor() == 0 {
            return fail("scale factor must be at least 1".to_owned());
        }
        if !self.vertical_scale.is_finite() || self.vertical_scale <= 0.0 {
            return fail(format!(
                "vertical scale must be positive, got {}",
                self.vertical_scale
            ));
        }
        if self.world.height == 0 || self.world.height % 16 != 0 || self.world.min_y % 16 != 0 {
            return fail(format!(
                "world range {}+{} must be a non-empty multiple of 16",
                self.world.min_y, self.world.height
            ));
        }
        if (self.world.min_y as i64) < -MAX_VERTICAL_EXTENT
            || self.world.min_y as i64 + self.world.height as i64 > MAX_VERTICAL_EXTENT
        {
            return fail(format!(
                "world range {}+{} exceeds y = ±{}",
                self.world.min_y, self.world.height, MAX_VERTICAL_EXTENT
            ));
        }
        if self.world.horizontal_limit <= 0 || self.world.horizontal_limit > MAX_HORIZONTAL_LIMIT {
            return fail(format!(
                "horizontal limit must lie in 1..={}, got {}",
                MAX_HORIZONTAL_LIMIT, self.world.horizontal_limit
            ));
        }
        if self
            .origin
            .iter()
            .any(|o| (*o as i64).abs() > self.world.horizontal_limit)
        {
            return fail(format!(
                "origin [{}, {}] lies outside the horizontal limit {}",
                self.origin[0], self.origin[1], self.world.horizontal_limit
            ));
        }
        if self.sea_level < self.world.min_y || self.sea_level >= self.world.max_y() {
            return fail(format!(
                "sea level {} lies outside the world",
                self.sea_level
            ));
        }
        if self.strata.layers.is_empty() {
            return fail("strata profile needs at least one layer".to_owned());
        }
        if let Some(slope) = self.rock_slope {
            if !slope.is_finite() || slope < 0.0 {
                return fail(format!("rock slope must be non-negative, got {}", slope));
            }
        }
        for class in [
            FeatureClass::Road,
            FeatureClass::Building,
            FeatureClass::Vegetation,
            FeatureClass::Water,
        ] {
            let count = self.feature_priority.iter().filter(|c| **c == class).count();
            if count != 1 {
                return fail(format!(
                    "feature priority must list {:?} exactly once",
                    class
                ));
            }
        }
        if self.region_timeout_secs == 0 {
            return fail("region timeout must be at least one second".to_owned());
        }
        if self.parallel_regions == 0 || self.column_workers == 0 {
            return fail("parallel regions and column workers must be at least 1".to_owned());
        }
        Ok(())
    }

    pub fn region_timeout(&self) -> Duration {
        Duration::from_secs(self.region_timeout_secs)
    }
}
