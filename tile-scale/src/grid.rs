// SPDX-License-Identifier: MIT
//! # Tile Grid and Serpentine Traversal
//!
//! A capture region is covered by `cols × rows` device-sized tiles. Tiles are
//! visited column by column, alternating direction inside each column
//! (boustrophedon order), so consecutive tiles are always neighbours and the
//! camera never travels more than one tile between captures:
//!
//! ```text
//!   col 0   col 1   col 2
//!   (0,0)   (1,0) ◀ (2,0)
//!     ▼       ▲       ▼
//!   (0,1)   (1,1)   (2,1)
//!     ▼       ▲       ▼
//!   (0,2) ▶ (1,2)   (2,2)
//! ```
//!
//! World space follows screen conventions: the region origin is its top-left
//! corner and rows grow towards +y.

use crate::plan::{PlanError, Size, Vec2};

/// Integer tile counts, each at least 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileGrid {
    pub cols: u32,
    pub rows: u32,
}

impl TileGrid {
    pub fn new(cols: u32, rows: u32) -> Self {
        Self {
            cols: cols.max(1),
            rows: rows.max(1),
        }
    }

    /// Tiles needed to cover `region` when one device frame spans
    /// `device_tile / pixel_density` world units.
    ///
    /// Fails when the column count, the row count or their product does not
    /// fit in a `u32`.
    pub fn for_region(region: Vec2, pixel_density: f32, device_tile: Size) -> Result<Self, PlanError> {
        let cover = |extent: f32, tile_px: u32| -> f64 {
            let n = (f64::from(extent) * f64::from(pixel_density) / f64::from(tile_px.max(1))).ceil();
            // NaN and negatives collapse to 1.
            n.max(1.0)
        };
        let cols = cover(region.x, device_tile.w);
        let rows = cover(region.y, device_tile.h);
        let too_large = || PlanError::GridTooLarge { cols, rows };
        if cols > f64::from(u32::MAX) || rows > f64::from(u32::MAX) {
            return Err(too_large());
        }
        let grid = Self::new(cols as u32, rows as u32);
        if grid.tile_count() > u64::from(u32::MAX) {
            return Err(too_large());
        }
        Ok(grid)
    }

    pub fn tile_count(&self) -> u64 {
        u64::from(self.cols) * u64::from(self.rows)
    }

    /// Stitched size when every tile occupies `tile` pixels, or `None` when
    /// an axis does not fit in a `u32`.
    pub fn output_size(&self, tile: Size) -> Option<Size> {
        Some(Size::new(
            self.cols.checked_mul(tile.w)?,
            self.rows.checked_mul(tile.h)?,
        ))
    }

    /// Boustrophedon visit order over the grid.
    pub fn serpentine(&self) -> Serpentine {
        Serpentine {
            grid: *self,
            index: 0,
        }
    }

    /// Position of the `index`-th tile in serpentine order.
    pub fn serpentine_coord(&self, index: u32) -> Option<TileCoord> {
        if u64::from(index) >= self.tile_count() {
            return None;
        }
        let col = index / self.rows;
        let step = index % self.rows;
        let row = if col % 2 == 0 {
            step
        } else {
            self.rows - 1 - step
        };
        Some(TileCoord { col, row })
    }
}

/// Grid coordinate of one tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub col: u32,
    pub row: u32,
}

impl TileCoord {
    /// Top-left pixel of this tile in the stitched output.
    pub fn pixel_offset(&self, tile: Size) -> (u32, u32) {
        (self.col * tile.w, self.row * tile.h)
    }

    /// World-space centre of this tile for a grid anchored at `origin`.
    pub fn world_center(&self, origin: Vec2, tile_extent: Vec2) -> Vec2 {
        Vec2::new(
            origin.x + (self.col as f32 + 0.5) * tile_extent.x,
            origin.y + (self.row as f32 + 0.5) * tile_extent.y,
        )
    }
}

/// World-space footprint of one device frame.
pub fn tile_world_extent(device_tile: Size, pixel_density: f32) -> Vec2 {
    Vec2::new(
        device_tile.w as f32 / pixel_density,
        device_tile.h as f32 / pixel_density,
    )
}

/// Iterator returned by [`TileGrid::serpentine`].
#[derive(Clone, Debug)]
pub struct Serpentine {
    grid: TileGrid,
    index: u32,
}

impl Iterator for Serpentine {
    type Item = TileCoord;

    fn next(&mut self) -> Option<TileCoord> {
        let coord = self.grid.serpentine_coord(self.index)?;
        self.index += 1;
        Some(coord)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.grid.tile_count().saturating_sub(u64::from(self.index)) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Serpentine {}
