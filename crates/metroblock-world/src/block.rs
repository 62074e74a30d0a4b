use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A namespaced block state such as `minecraft:stone` or
/// `minecraft:rail[shape=east_west]`. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BlockState(Arc<str>);

impl BlockState {
    /// Adds the `minecraft:` namespace when none is given.
    pub fn new(name: &str) -> Self {
        if name.contains(':') {
            BlockState(Arc::from(name))
        } else {
            BlockState(Arc::from(format!("minecraft:{}", name)))
        }
    }

    pub fn with_properties(name: &str, properties: &[(&str, &str)]) -> Self {
        if properties.is_empty() {
            return BlockState::new(name);
        }
        let props: Vec<String> = properties
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        BlockState::new(&format!("{}[{}]", name, props.join(",")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Block id without properties.
    pub fn name(&self) -> &str {
        match self.0.find('[') {
            Some(start) => &self.0[..start],
            None => &self.0,
        }
    }

    pub fn properties(&self) -> Vec<(&str, &str)> {
        let Some(start) = self.0.find('[') else {
            return Vec::new();
        };
        self.0[start + 1..]
            .trim_end_matches(']')
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .collect()
    }

    pub fn is_air(&self) -> bool {
        matches!(
            self.name(),
            "minecraft:air" | "minecraft:cave_air" | "minecraft:void_air"
        )
    }

    pub fn is_water(&self) -> bool {
        self.name() == "minecraft:water"
    }
}

impl From<String> for BlockState {
    fn from(value: String) -> Self {
        BlockState::new(&value)
    }
}

impl From<BlockState> for String {
    fn from(value: BlockState) -> Self {
        value.0.to_string()
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Block states used by terrain, features and defaults
pub mod blocks {
    use super::BlockState;
    use once_cell::sync::Lazy;

    macro_rules! block {
        ($($ident:ident => $name:expr),* $(,)?) => {
            $(pub static $ident: Lazy<BlockState> = Lazy::new(|| BlockState::new($name));)*
        };
    }

    block! {
        AIR => "air",
        WATER => "water",
        BEDROCK => "bedrock",
        STONE => "stone",
        DIRT => "dirt",
        GRASS_BLOCK => "grass_block",
        SAND => "sand",
        GRAVEL => "gravel",
        ANDESITE => "andesite",
        GRAY_CONCRETE => "gray_concrete",
        BLACK_CONCRETE => "black_concrete",
        LIGHT_GRAY_CONCRETE => "light_gray_concrete",
        COBBLED_DEEPSLATE => "cobbled_deepslate",
        BRICKS => "bricks",
        DRIPSTONE_BLOCK => "dripstone_block",
        OAK_LOG => "oak_log",
        OAK_LEAVES => "oak_leaves",
        BIRCH_LOG => "birch_log",
        BIRCH_LEAVES => "birch_leaves",
        SPRUCE_LOG => "spruce_log",
        SPRUCE_LEAVES => "spruce_leaves",
        JUNGLE_LOG => "jungle_log",
        JUNGLE_LEAVES => "jungle_leaves",
        OAK_PLANKS => "oak_planks",
        SMOOTH_STONE => "smooth_stone",
        QUARTZ_BLOCK => "quartz_block",
        TERRACOTTA => "terracotta",
        WHITE_CONCRETE => "white_concrete",
        IRON_BLOCK => "iron_block",
        HAY_BLOCK => "hay_block",
        STONE_BRICKS => "stone_bricks",
        POLISHED_ANDESITE => "polished_andesite",
        RAIL_NORTH_SOUTH => "rail[shape=north_south]",
        RAIL_EAST_WEST => "rail[shape=east_west]",
    }
}
