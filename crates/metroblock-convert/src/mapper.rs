use crate::config::{Aggregation, ConversionConfig, ScaleFactor};
use metroblock_common::{ColumnPos, ConvertError, Rect, Result};
use metroblock_world::source::Bounds;
use metroblock_world::{SourceCell, SourceSnapshot, ZoneType};
use std::collections::BTreeMap;

/// Translates between source cells and target columns.
///
/// With `up:n` every cell covers an n×n block of columns; with `down:n`
/// every column aggregates an n×n block of cells. Cell `(0, 0)` starts at
/// the configured origin column.
#[derive(Debug, Clone)]
pub struct CoordinateMapper {
    scale: ScaleFactor,
    aggregation: Aggregation,
    origin: [i32; 2],
    vertical_scale: f64,
    vertical_offset: i32,
    horizontal_limit: i64,
    min_y: i32,
    max_y: i32,
    area: Rect,
}

/// Saturating conversion back to block coordinates.
fn narrow(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn narrow_rect([min_x, min_z, max_x, max_z]: [i64; 4]) -> Rect {
    Rect::new(narrow(min_x), narrow(min_z), narrow(max_x), narrow(max_z))
}

impl CoordinateMapper {
    /// `area` is the converted source area; contributing cells are clipped to it.
    pub fn new(config: &ConversionConfig, area: Rect) -> Self {
        CoordinateMapper {
            scale: config.scale,
            aggregation: config.aggregation,
            origin: config.origin,
            vertical_scale: config.vertical_scale,
            vertical_offset: config.vertical_offset,
            horizontal_limit: config.world.horizontal_limit,
            min_y: config.world.min_y,
            max_y: config.world.max_y(),
            area,
        }
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    /// Columns covered by the whole converted area. Only meaningful once
    /// `check_bounds` passed; coordinates past `i32` saturate.
    pub fn target_rect(&self) -> Rect {
        narrow_rect(self.columns_for_cells(self.area))
    }

    /// Fails with `OutOfBounds` on the first target corner outside the world.
    pub fn check_bounds(&self) -> Result<()> {
        if self.area.is_empty() {
            return Ok(());
        }
        let [min_x, min_z, max_x, max_z] = self.columns_for_cells(self.area);
        let limit = self.horizontal_limit;
        for (x, z) in [(min_x, min_z), (max_x - 1, max_z - 1)] {
            if x.abs() > limit || z.abs() > limit {
                return Err(ConvertError::OutOfBounds { x, z, limit });
            }
        }
        Ok(())
    }

    /// Column box `[min_x, min_z, max_x, max_z)` of a cell box, in `i64` so
    /// that no origin or scale can overflow it.
    fn columns_for_cells(&self, cells: Rect) -> [i64; 4] {
        let [ox, oz] = self.origin.map(i64::from);
        if cells.is_empty() {
            return [ox, oz, ox, oz];
        }
        let [min_x, min_z, max_x, max_z] =
            [cells.min_x, cells.min_z, cells.max_x, cells.max_z].map(i64::from);
        let n = self.scale.factor() as i64;
        match self.scale {
            ScaleFactor::Up(_) => [
                ox.saturating_add(min_x.saturating_mul(n)),
                oz.saturating_add(min_z.saturating_mul(n)),
                ox.saturating_add(max_x.saturating_mul(n)),
                oz.saturating_add(max_z.saturating_mul(n)),
            ],
            ScaleFactor::Down(_) => [
                ox + min_x.div_euclid(n),
                oz + min_z.div_euclid(n),
                ox + (max_x - 1).div_euclid(n) + 1,
                oz + (max_z - 1).div_euclid(n) + 1,
            ],
        }
    }

    /// Target columns one cell contributes to.
    pub fn columns_for_cell(&self, x: i32, z: i32) -> Rect {
        let (x, z) = (i64::from(x), i64::from(z));
        let [ox, oz] = self.origin.map(i64::from);
        let n = self.scale.factor() as i64;
        match self.scale {
            ScaleFactor::Up(_) => narrow_rect([
                ox + x * n,
                oz + z * n,
                ox + (x + 1) * n,
                oz + (z + 1) * n,
            ]),
            ScaleFactor::Down(_) => {
                let (cx, cz) = (ox + x.div_euclid(n), oz + z.div_euclid(n));
                narrow_rect([cx, cz, cx + 1, cz + 1])
            }
        }
    }

    /// Cells contributing to a set of columns, unclipped.
    pub fn cells_for_columns(&self, columns: Rect) -> Rect {
        self.cells_for_column_bounds(
            [columns.min_x, columns.min_z, columns.max_x, columns.max_z].map(i64::from),
        )
    }

    fn cells_for_column_bounds(&self, [min_x, min_z, max_x, max_z]: [i64; 4]) -> Rect {
        let [ox, oz] = self.origin.map(i64::from);
        let n = self.scale.factor() as i64;
        match self.scale {
            ScaleFactor::Up(_) => narrow_rect([
                (min_x - ox).div_euclid(n),
                (min_z - oz).div_euclid(n),
                (max_x - 1 - ox).div_euclid(n) + 1,
                (max_z - 1 - oz).div_euclid(n) + 1,
            ]),
            ScaleFactor::Down(_) => narrow_rect([
                (min_x - ox).saturating_mul(n),
                (min_z - oz).saturating_mul(n),
                (max_x - ox).saturating_mul(n),
                (max_z - oz).saturating_mul(n),
            ]),
        }
    }

    /// Cells contributing to one column, clipped to the converted area.
    pub fn cells_for_column(&self, column: ColumnPos) -> Rect {
        let (x, z) = (i64::from(column.x), i64::from(column.z));
        self.cells_for_column_bounds([x, z, x + 1, z + 1])
            .intersect(&self.area)
    }

    /// Moves a column onto the nearest column of the target rectangle.
    pub fn clamp_column(&self, column: ColumnPos) -> ColumnPos {
        let target = self.target_rect();
        if target.is_empty() {
            return column;
        }
        ColumnPos::new(
            column.x.clamp(target.min_x, target.max_x - 1),
            column.z.clamp(target.min_z, target.max_z - 1),
        )
    }

    /// Continuous source position of a column's center.
    pub fn source_point(&self, column: ColumnPos) -> [f64; 2] {
        let x = column.x as f64 - self.origin[0] as f64 + 0.5;
        let z = column.z as f64 - self.origin[1] as f64 + 0.5;
        match self.scale {
            ScaleFactor::Up(n) => [x / n as f64, z / n as f64],
            ScaleFactor::Down(n) => [x * n as f64, z * n as f64],
        }
    }

    /// Column containing a continuous source position.
    pub fn column_at_source_point(&self, point: [f64; 2]) -> ColumnPos {
        let [x, z] = match self.scale {
            ScaleFactor::Up(n) => [point[0] * n as f64, point[1] * n as f64],
            ScaleFactor::Down(n) => [point[0] / n as f64, point[1] / n as f64],
        };
        ColumnPos::new(
            narrow((x.floor() as i64).saturating_add(self.origin[0] as i64)),
            narrow((z.floor() as i64).saturating_add(self.origin[1] as i64)),
        )
    }

    /// Source-space box spanned by a set of columns.
    pub fn source_bounds(&self, columns: Rect) -> Bounds {
        let [ox, oz] = self.origin.map(f64::from);
        let (min_x, min_z) = (columns.min_x as f64 - ox, columns.min_z as f64 - oz);
        let (max_x, max_z) = (columns.max_x as f64 - ox, columns.max_z as f64 - oz);
        match self.scale {
            ScaleFactor::Up(n) => {
                let n = n as f64;
                [min_x / n, min_z / n, max_x / n, max_z / n]
            }
            ScaleFactor::Down(n) => {
                let n = n as f64;
                [min_x * n, min_z * n, max_x * n, max_z * n]
            }
        }
    }

    /// Aggregated sample for a column, or `None` when no cell contributes.
    pub fn sample(&self, snapshot: &SourceSnapshot, column: ColumnPos) -> Option<SourceCell> {
        let cells: Vec<&SourceCell> = self
            .cells_for_column(column)
            .iter()
            .filter_map(|(x, z)| snapshot.cell(x, z))
            .collect();
        self.aggregate(&cells)
    }

    /// Combines contributing cells. The result does not depend on their order.
    pub fn aggregate(&self, cells: &[&SourceCell]) -> Option<SourceCell> {
        if cells.is_empty() {
            return None;
        }

        let mut elevations: Vec<f64> = cells.iter().map(|c| c.elevation).collect();
        elevations.sort_by(f64::total_cmp);
        let elevation = match self.aggregation {
            Aggregation::Mean => elevations.iter().sum::<f64>() / elevations.len() as f64,
            Aggregation::Max => elevations[elevations.len() - 1],
        };

        let wet = cells.iter().filter(|c| c.water).count();
        let slope = cells.iter().map(|c| c.slope).fold(f64::MIN, f64::max);
        let wealth = cells.iter().map(|c| c.wealth).max().unwrap_or_default();

        let mut zones: BTreeMap<ZoneType, usize> = BTreeMap::new();
        for cell in cells {
            *zones.entry(cell.zone).or_default() += 1;
        }
        // first maximum in zone order, so ties go to the lowest zone
        let zone = zones
            .iter()
            .fold((ZoneType::None, 0), |best, (zone, count)| {
                if *count > best.1 {
                    (*zone, *count)
                } else {
                    best
                }
            })
            .0;

        Some(SourceCell {
            elevation,
            zone,
            wealth,
            water: wet * 2 >= cells.len(),
            slope,
        })
    }

    /// `round_half_up(elevation * vertical_scale) + vertical_offset`, held
    /// between one block under the floor and the ceiling.
    pub fn elevation_to_layer(&self, elevation: f64) -> i32 {
        let scaled = (elevation * self.vertical_scale + 0.5).floor() as i64;
        let layer = scaled.saturating_add(self.vertical_offset as i64);
        narrow(layer.clamp(self.min_y as i64 - 1, self.max_y as i64))
    }
}
