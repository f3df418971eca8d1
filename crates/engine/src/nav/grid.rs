use thiserror::Error;
use tracing::debug;

use crate::geometry::{CellCoord, Vec2, WorldRect};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TileCategory {
    #[default]
    Floor,
    Wall,
    Furniture,
    Decoration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileData {
    pub walkable: bool,
    pub category: TileCategory,
}

impl TileData {
    pub const FLOOR: Self = Self {
        walkable: true,
        category: TileCategory::Floor,
    };
    pub const WALL: Self = Self {
        walkable: false,
        category: TileCategory::Wall,
    };

    pub const fn new(walkable: bool, category: TileCategory) -> Self {
        Self { walkable, category }
    }
}

impl Default for TileData {
    fn default() -> Self {
        Self::FLOOR
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GridError {
    #[error("grid dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("tile size must be finite and positive, got {0}")]
    InvalidTileSize(f32),
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
}

/// Tile grid plus the two matrices derived from it.
///
/// Cell `(x, y)` covers world `[x * tile_size, (x + 1) * tile_size)` on the x
/// axis and likewise on y. `collision` is `true` for blocked cells and
/// `walkable_area` is `true` for open cells of the floor category. Both are
/// stored row-major with the same dimensions as `tiles` and are only ever
/// touched through [`GridModel::set_tile`] after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct GridModel {
    width: u32,
    height: u32,
    tile_size: f32,
    tiles: Vec<TileData>,
    collision: Vec<bool>,
    walkable_area: Vec<bool>,
}

impl GridModel {
    pub fn new(width: u32, height: u32, tile_size: f32) -> Result<Self, GridError> {
        let count = width as usize * height as usize;
        Self::from_tiles(width, height, tile_size, vec![TileData::FLOOR; count])
    }

    pub fn from_tiles(
        width: u32,
        height: u32,
        tile_size: f32,
        tiles: Vec<TileData>,
    ) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::EmptyDimensions { width, height });
        }
        if !tile_size.is_finite() || tile_size <= 0.0 {
            return Err(GridError::InvalidTileSize(tile_size));
        }
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(GridError::TileCountMismatch { expected, actual });
        }

        let collision = tiles.iter().map(|tile| derive_collision(*tile)).collect();
        let walkable_area = tiles
            .iter()
            .map(|tile| derive_walkable_area(*tile))
            .collect();
        Ok(Self {
            width,
            height,
            tile_size,
            tiles,
            collision,
            walkable_area,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    pub fn cell_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn cell_of_index(&self, index: usize) -> CellCoord {
        let width = self.width as usize;
        CellCoord::new((index % width) as i32, (index / width) as i32)
    }

    pub fn contains(&self, cell: CellCoord) -> bool {
        self.index_of(cell.x, cell.y).is_some()
    }

    pub fn tile_at(&self, x: i32, y: i32) -> Option<TileData> {
        self.index_of(x, y)
            .and_then(|index| self.tiles.get(index).copied())
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        !self.collision_at(x, y)
    }

    pub fn is_cell_walkable(&self, cell: CellCoord) -> bool {
        self.is_walkable(cell.x, cell.y)
    }

    pub fn collision_at(&self, x: i32, y: i32) -> bool {
        self.index_of(x, y)
            .and_then(|index| self.collision.get(index))
            .copied()
            .unwrap_or(true)
    }

    pub fn is_walkable_area(&self, x: i32, y: i32) -> bool {
        self.index_of(x, y)
            .and_then(|index| self.walkable_area.get(index))
            .copied()
            .unwrap_or(false)
    }

    /// Replaces one tile and re-derives only that cell. Out-of-bounds edits
    /// leave the grid untouched and return `false`.
    pub fn set_tile(&mut self, x: i32, y: i32, data: TileData) -> bool {
        let Some(index) = self.index_of(x, y) else {
            debug!(x, y, "tile_edit_out_of_bounds");
            return false;
        };
        self.tiles[index] = data;
        self.collision[index] = derive_collision(data);
        self.walkable_area[index] = derive_walkable_area(data);
        true
    }

    pub fn collision_cells(&self) -> &[bool] {
        &self.collision
    }

    pub fn walkable_area_cells(&self) -> &[bool] {
        &self.walkable_area
    }

    pub fn walkable_count(&self) -> usize {
        self.collision.iter().filter(|blocked| !**blocked).count()
    }

    pub fn world_to_cell(&self, world: Vec2) -> Option<CellCoord> {
        if !world.is_finite() {
            return None;
        }
        let cell = CellCoord::new(
            (world.x / self.tile_size).floor() as i32,
            (world.y / self.tile_size).floor() as i32,
        );
        self.contains(cell).then_some(cell)
    }

    /// Continuous grid coordinates (fractional tiles) for a world position.
    pub fn world_to_grid(&self, world: Vec2) -> Vec2 {
        world.scale(self.tile_size.recip())
    }

    pub fn cell_center(&self, cell: CellCoord) -> Vec2 {
        Vec2 {
            x: (cell.x as f32 + 0.5) * self.tile_size,
            y: (cell.y as f32 + 0.5) * self.tile_size,
        }
    }

    pub fn world_size(&self) -> (f32, f32) {
        (
            self.width as f32 * self.tile_size,
            self.height as f32 * self.tile_size,
        )
    }

    pub fn world_bounds(&self) -> WorldRect {
        let (width, height) = self.world_size();
        WorldRect::new(0.0, 0.0, width, height)
    }
}

fn derive_collision(tile: TileData) -> bool {
    !tile.walkable
}

fn derive_walkable_area(tile: TileData) -> bool {
    tile.walkable && tile.category == TileCategory::Floor
}
