use metroblock_nbt::Tag;

/// Data version written into chunks and `level.dat`
pub const DATA_VERSION: i32 = 3218;
pub const VERSION_NAME: &str = "1.19.3";

/// World-level metadata handed to the writer once all regions are done.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelInfo {
    pub name: String,
    pub spawn: (i32, i32, i32),
    pub min_y: i32,
    pub height: u32,
    pub sea_level: i32,
}

impl LevelInfo {
    /// `level.dat` root: creative flat world whose generator only adds air,
    /// so chunks outside the converted area stay empty.
    pub fn to_nbt(&self, last_played: i64) -> Tag {
        let generator = Tag::compound()
            .with("type", "minecraft:flat".into())
            .with(
                "settings",
                Tag::compound()
                    .with("biome", "minecraft:plains".into())
                    .with("features", false.into())
                    .with("lakes", false.into())
                    .with(
                        "layers",
                        Tag::List(vec![Tag::compound()
                            .with("block", "minecraft:air".into())
                            .with("height", Tag::Int(1))]),
                    )
                    .with("structure_overrides", Tag::List(Vec::new())),
            );

        let overworld = Tag::compound()
            .with("type", "minecraft:overworld".into())
            .with("generator", generator);

        let world_gen = Tag::compound()
            .with("seed", Tag::Long(0))
            .with("generate_features", false.into())
            .with("bonus_chest", false.into())
            .with(
                "dimensions",
                Tag::compound().with("minecraft:overworld", overworld),
            );

        let version = Tag::compound()
            .with("Id", Tag::Int(DATA_VERSION))
            .with("Name", VERSION_NAME.into())
            .with("Series", "main".into())
            .with("Snapshot", false.into());

        let data = Tag::compound()
            .with("DataVersion", Tag::Int(DATA_VERSION))
            .with("version", version)
            .with("LevelName", self.name.as_str().into())
            .with("SpawnX", Tag::Int(self.spawn.0))
            .with("SpawnY", Tag::Int(self.spawn.1))
            .with("SpawnZ", Tag::Int(self.spawn.2))
            .with("GameType", Tag::Int(1))
            .with("allowCommands", true.into())
            .with("initialized", true.into())
            .with("hardcore", false.into())
            .with("Difficulty", Tag::Byte(1))
            .with("LastPlayed", Tag::Long(last_played))
            .with("WorldGenSettings", world_gen);

        Tag::compound().with("Data", data)
    }
}
