// SPDX-License-Identifier: MIT
//! # Resolution Planning
//!
//! Computes the tile grid, effective resolution scale, downsample factor and
//! final output dimensions for a tiled capture so that the stitched RGBA
//! buffer stays under a byte ceiling and a per-axis pixel ceiling.
//!
//! ## Degradation Order
//!
//! The planner prefers losing fidelity over failing the capture:
//! 1. **Scale**: step the integer resolution multiplier down towards 1
//! 2. **Downsample**: at scale 1, divide the per-tile pixel size by an
//!    increasing factor, never going below the pixel floor
//! 3. **Best effort**: if the floor is reached and the output still does not
//!    fit, the plan is returned with `within_limits == false`
//!
//! The floor is `min(TILE_PIXEL_FLOOR, device tile axis)` so a tile is never
//! enlarged by the floor itself. The downsample loop runs at most
//! `max(device / floor) + 1` times.
//!
//! Grid and output arithmetic is checked: a region whose tile count or
//! output size does not fit in a `u32` yields a [`PlanError`] instead of a
//! saturated plan.

use std::fmt;

use crate::grid::TileGrid;

/// Bytes per pixel of the stitched output buffer (RGBA8).
pub const BYTES_PER_PIXEL: u64 = 4;

/// Smallest per-tile edge the downsample loop will produce.
pub const TILE_PIXEL_FLOOR: u32 = 64;

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// Pixel count, widened so large grids cannot overflow.
    pub fn area(self) -> u64 {
        u64::from(self.w) * u64::from(self.h)
    }

    /// Byte length of a tightly packed RGBA8 buffer of this size.
    pub fn rgba_len(self) -> usize {
        self.area() as usize * BYTES_PER_PIXEL as usize
    }

    /// Byte length of a tightly packed RGB8 buffer of this size.
    pub fn rgb_len(self) -> usize {
        self.area() as usize * 3
    }

    pub fn is_empty(self) -> bool {
        self.w == 0 || self.h == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// World-space position or extent.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Hard ceilings the stitched output must respect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanLimits {
    /// Maximum byte size of the RGBA output buffer.
    pub max_output_bytes: u64,
    /// Maximum pixel count along either output axis.
    pub max_output_dimension: u32,
}

impl PlanLimits {
    /// Returns true when an RGBA buffer of `size` satisfies both ceilings.
    pub fn admits(&self, size: Size) -> bool {
        size.area() * BYTES_PER_PIXEL <= self.max_output_bytes
            && size.w <= self.max_output_dimension
            && size.h <= self.max_output_dimension
    }
}

/// Planner inputs.
#[derive(Clone, Copy, Debug)]
pub struct PlanRequest {
    /// World-space size of the region to capture.
    pub region_size: Vec2,
    /// Integer resolution multiplier the caller asked for.
    pub requested_scale: u32,
    /// Pixel size of one device frame (one tile at scale 1).
    pub device_tile: Size,
    /// Device pixels per world unit at scale 1.
    pub pixel_density: f32,
    pub limits: PlanLimits,
}

/// Output of [`build_plan`].
///
/// Invariant: `output_size == grid × tile_size` componentwise, and the tile
/// count fits in a `u32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolutionPlan {
    pub grid: TileGrid,
    pub requested_scale: u32,
    pub effective_scale: u32,
    pub downsample_factor: u32,
    /// Pixel size each tile is rendered at (device tile × effective scale).
    pub render_size: Size,
    /// Pixel size each tile occupies in the output.
    pub tile_size: Size,
    pub output_size: Size,
    /// False when even the pixel floor could not bring the output under the limits.
    pub within_limits: bool,
}

impl ResolutionPlan {
    pub fn tile_count(&self) -> u32 {
        self.grid.cols * self.grid.rows
    }

    pub fn output_bytes(&self) -> u64 {
        self.output_size.area() * BYTES_PER_PIXEL
    }

    /// Describes how the plan deviates from the request, if it does.
    pub fn adjustment(&self) -> Option<PlanAdjustment> {
        let degraded =
            self.effective_scale != self.requested_scale || self.downsample_factor > 1;
        (degraded || !self.within_limits).then_some(PlanAdjustment {
            requested_scale: self.requested_scale,
            effective_scale: self.effective_scale,
            downsample_factor: self.downsample_factor,
            tile_size: self.tile_size,
            output_size: self.output_size,
            within_limits: self.within_limits,
        })
    }
}

/// Informational summary of an automatic fidelity reduction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanAdjustment {
    pub requested_scale: u32,
    pub effective_scale: u32,
    pub downsample_factor: u32,
    pub tile_size: Size,
    pub output_size: Size,
    pub within_limits: bool,
}

impl fmt::Display for PlanAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.effective_scale != self.requested_scale {
            write!(
                f,
                "resolution scale reduced from {} to {}",
                self.requested_scale, self.effective_scale
            )?;
        } else {
            write!(f, "resolution scale {}", self.effective_scale)?;
        }
        if self.downsample_factor > 1 {
            write!(
                f,
                ", tiles downsampled by {} to {}",
                self.downsample_factor, self.tile_size
            )?;
        }
        write!(f, "; output {}", self.output_size)?;
        if !self.within_limits {
            write!(f, " (still exceeds limits at the pixel floor)")?;
        }
        Ok(())
    }
}

/// Planner failures: the request cannot be expressed as a grid of tiles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlanError {
    /// The region needs more tiles than a `u32` can count.
    GridTooLarge { cols: f64, rows: f64 },
    /// Even at the pixel floor an output axis overflows a `u32`.
    OutputTooLarge { grid: TileGrid, tile: Size },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::GridTooLarge { cols, rows } => {
                write!(f, "region needs a {}x{} tile grid, too many tiles", cols, rows)
            }
            PlanError::OutputTooLarge { grid, tile } => write!(
                f,
                "{}x{} tiles of {} do not fit in a representable output",
                grid.cols, grid.rows, tile
            ),
        }
    }
}

impl std::error::Error for PlanError {}

/// Compute a resolution plan that fits the request into the limits.
///
/// Degenerate inputs are clamped rather than rejected: a zero scale is
/// treated as 1 and a zero-sized device tile as 1×1. Regions too large to
/// count or stitch fail with [`PlanError`].
pub fn build_plan(req: &PlanRequest) -> Result<ResolutionPlan, PlanError> {
    let device = Size::new(req.device_tile.w.max(1), req.device_tile.h.max(1));
    let requested_scale = req.requested_scale.max(1);
    let grid = TileGrid::for_region(req.region_size, req.pixel_density, device)?;
    let limits = req.limits;
    // An unrepresentable candidate never fits.
    let fits = |output: Option<Size>| output.is_some_and(|o| limits.admits(o));

    let mut scale = requested_scale;
    let mut tile = scaled(device, scale);
    let mut output = tile.and_then(|t| grid.output_size(t));
    while scale > 1 && !fits(output) {
        scale -= 1;
        tile = scaled(device, scale);
        output = tile.and_then(|t| grid.output_size(t));
    }

    // Scale 1 is the device tile itself, so `tile` is always set here.
    let render_size = tile.unwrap_or(device);
    let mut tile = render_size;
    let mut factor = 1;
    if !fits(output) {
        let floor = Size::new(
            TILE_PIXEL_FLOOR.min(device.w),
            TILE_PIXEL_FLOOR.min(device.h),
        );
        // Past this factor both axes sit on the floor.
        let max_factor = (device.w / floor.w).max(device.h / floor.h) + 1;
        while !fits(output) && tile != floor && factor < max_factor {
            factor += 1;
            tile = Size::new(
                (device.w / factor).max(floor.w),
                (device.h / factor).max(floor.h),
            );
            output = grid.output_size(tile);
        }
    }
    let output = output.ok_or(PlanError::OutputTooLarge { grid, tile })?;

    Ok(ResolutionPlan {
        grid,
        requested_scale,
        effective_scale: scale,
        downsample_factor: factor,
        render_size,
        tile_size: tile,
        output_size: output,
        within_limits: limits.admits(output),
    })
}

fn scaled(size: Size, scale: u32) -> Option<Size> {
    Some(Size::new(size.w.checked_mul(scale)?, size.h.checked_mul(scale)?))
}
