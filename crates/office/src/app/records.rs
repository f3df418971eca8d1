use office_engine::{
    AvatarId, CellCoord, GridModel, SimulationWorld, TileCategory, TileData, Zone, ZoneBounds,
    ZoneId,
};
use serde::Deserialize;
use tracing::warn;

use super::config::ConfigError;

pub(crate) type OfficeWorld = SimulationWorld<DistrictAttributes>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GridRecord {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) tile_size: f32,
    pub(crate) rows: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub(crate) struct CellRecord {
    pub(crate) x: i32,
    pub(crate) y: i32,
}

impl From<CellRecord> for CellCoord {
    fn from(record: CellRecord) -> Self {
        CellCoord::new(record.x, record.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub(crate) struct BoundsRecord {
    pub(crate) x1: f32,
    pub(crate) y1: f32,
    pub(crate) x2: f32,
    pub(crate) y2: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ZoneRecord {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) code: String,
    pub(crate) bounds: BoundsRecord,
    #[serde(default, rename = "type")]
    pub(crate) kind: Option<String>,
    #[serde(default)]
    pub(crate) color: Option<String>,
    #[serde(default)]
    pub(crate) price_multiplier: Option<f64>,
    #[serde(default)]
    pub(crate) tax_multiplier: Option<f64>,
}

/// District data the simulation carries but never inspects.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DistrictAttributes {
    pub(crate) kind: String,
    pub(crate) color: Option<String>,
    pub(crate) price_multiplier: f64,
    pub(crate) tax_multiplier: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AvatarRecord {
    pub(crate) id: String,
    pub(crate) cell: CellRecord,
    #[serde(default)]
    pub(crate) speed: Option<f32>,
    #[serde(default)]
    pub(crate) track: bool,
}

pub(crate) fn tile_for_glyph(glyph: char) -> Option<TileData> {
    match glyph {
        '.' => Some(TileData::FLOOR),
        '#' => Some(TileData::WALL),
        'f' => Some(TileData::new(false, TileCategory::Furniture)),
        'd' => Some(TileData::new(true, TileCategory::Decoration)),
        _ => None,
    }
}

pub(crate) fn grid_from_record(record: &GridRecord) -> Result<GridModel, ConfigError> {
    if record.rows.len() != record.height as usize {
        return Err(ConfigError::RowCount {
            expected: record.height,
            actual: record.rows.len(),
        });
    }

    let mut tiles = Vec::with_capacity(record.width as usize * record.height as usize);
    for (row_index, row) in record.rows.iter().enumerate() {
        let width = row.chars().count();
        if width != record.width as usize {
            return Err(ConfigError::RowWidth {
                row: row_index,
                expected: record.width,
                actual: width,
            });
        }
        for (column, glyph) in row.chars().enumerate() {
            let tile = tile_for_glyph(glyph).unwrap_or_else(|| {
                warn!(row = row_index, column, glyph = %glyph, "unknown_tile_glyph");
                TileData::WALL
            });
            tiles.push(tile);
        }
    }

    Ok(GridModel::from_tiles(
        record.width,
        record.height,
        record.tile_size,
        tiles,
    )?)
}

impl From<ZoneRecord> for Zone<DistrictAttributes> {
    fn from(record: ZoneRecord) -> Self {
        Zone {
            id: ZoneId::new(record.id),
            name: record.name,
            code: record.code,
            bounds: ZoneBounds::new(
                record.bounds.x1,
                record.bounds.y1,
                record.bounds.x2,
                record.bounds.y2,
            ),
            attributes: DistrictAttributes {
                kind: record.kind.unwrap_or_else(|| "general".to_string()),
                color: record.color,
                price_multiplier: record.price_multiplier.unwrap_or(1.0),
                tax_multiplier: record.tax_multiplier.unwrap_or(1.0),
            },
        }
    }
}

/// Places the roster, skipping avatars whose spawn cell is blocked or whose
/// id is already taken. Returns how many were placed.
pub(crate) fn spawn_avatars(world: &mut OfficeWorld, avatars: &[AvatarRecord]) -> usize {
    let mut placed = 0;
    for record in avatars {
        let id = AvatarId::new(record.id.clone());
        let cell = CellCoord::from(record.cell);
        if !world.grid().is_cell_walkable(cell) {
            warn!(avatar = %id, x = cell.x, y = cell.y, "avatar_spawn_blocked");
            continue;
        }
        if !world.add_avatar_at_cell(id.clone(), cell, record.speed) {
            warn!(avatar = %id, "avatar_duplicate_id");
            continue;
        }
        if record.track {
            world.track_zones(&id);
        }
        placed += 1;
    }
    placed
}
