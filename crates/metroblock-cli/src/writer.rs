use metroblock_common::{ConvertError, RegionPos, Result};
use metroblock_logger::systime::unix_timestamp_millis;
use metroblock_logger::{log, LogSeverity};
use metroblock_nbt::{AnvilRegion, NbtFile};
use metroblock_world::{LevelInfo, Region, RegionWriter};
use std::path::{Path, PathBuf};

/// Writes each region as an Anvil file `<root>/region/r.X.Z.mca` and the
/// world metadata as gzip NBT `<root>/level.dat`.
#[derive(Debug, Clone)]
pub struct AnvilRegionWriter {
    root: PathBuf,
}

fn write_error(path: &Path, err: std::io::Error) -> ConvertError {
    ConvertError::DestinationWrite(format!("{}: {}", path.display(), err))
}

impl AnvilRegionWriter {
    /// Prepares the output directory. A non-empty directory is only reused
    /// with `force`, which clears it first.
    pub fn create(root: &Path, force: bool) -> Result<Self> {
        let occupied = root
            .read_dir()
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if occupied {
            if !force {
                return Err(ConvertError::DestinationWrite(format!(
                    "output directory {} is not empty",
                    root.display()
                )));
            }
            log(format!("Clearing {}", root.display()), LogSeverity::Warning);
            std::fs::remove_dir_all(root).map_err(|e| write_error(root, e))?;
        }

        let writer = AnvilRegionWriter {
            root: root.to_path_buf(),
        };
        let regions = writer.region_dir();
        std::fs::create_dir_all(&regions).map_err(|e| write_error(&regions, e))?;
        Ok(writer)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn region_dir(&self) -> PathBuf {
        self.root.join("region")
    }

    pub fn region_path(&self, pos: RegionPos) -> PathBuf {
        self.region_dir().join(format!("{}.mca", pos))
    }

    pub fn level_path(&self) -> PathBuf {
        self.root.join("level.dat")
    }
}

impl RegionWriter for AnvilRegionWriter {
    fn write_region(&self, region: Region) -> Result<()> {
        let path = self.region_path(region.pos());
        region
            .to_anvil()?
            .save(&path)
            .map_err(|e| write_error(&path, e))?;
        log(format!("Wrote {}", path.display()), LogSeverity::Debug);
        Ok(())
    }

    fn finish(&self, level: &LevelInfo) -> Result<()> {
        let path = self.level_path();
        NbtFile::new("", level.to_nbt(unix_timestamp_millis()))
            .save(&path)
            .map_err(|e| write_error(&path, e))
    }
}
