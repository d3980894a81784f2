//! # Tile Stitcher
//!
//! Composites compressed tiles into one RGBA output buffer, one tile per call.
//! Each tile is decoded, resampled to the planned tile size when it differs,
//! blitted at `(col × tile.w, row × tile.h)` with alpha forced opaque, and its
//! compressed bytes are dropped right after. Tiles never overlap, so the order
//! only matters for memory: the stitcher walks them in capture order.

use std::collections::VecDeque;

use fast_image_resize::Resizer;
use tile_scale::cpu::{aspect_matches, blit_rgb_opaque, resize_rgb_exact, ResampleFilter, Staging};
use tile_scale::grid::TileCoord;
use tile_scale::plan::{ResolutionPlan, Size};

use crate::codec::TileCodec;
use crate::core::buffer_pool::try_alloc_zeroed;
use crate::error::CaptureError;

/// One captured tile: grid position plus its compressed payload.
#[derive(Debug, Clone)]
pub struct Tile {
    pub coord: TileCoord,
    pub bytes: Vec<u8>,
}

/// The stitched RGBA8 canvas.
#[derive(Debug)]
pub struct OutputBuffer {
    pixels: Vec<u8>,
    size: Size,
}

impl OutputBuffer {
    /// Allocate a zeroed canvas of `size`.
    ///
    /// Fails when `available_memory` is known and smaller than the buffer, or
    /// when the allocator refuses the request. Nothing is retained on failure.
    pub fn allocate(size: Size, available_memory: Option<u64>) -> Result<Self, CaptureError> {
        let bytes = size.area() * 4;
        if let Some(available) = available_memory {
            if bytes > available {
                return Err(CaptureError::allocation(
                    "output buffer",
                    bytes,
                    format!("only {} bytes available", available),
                )
                .with_context(format!("{} RGBA canvas", size))
                .with_recovery_suggestion("Lower the resolution scale or capture a smaller region"));
            }
        }
        let len = usize::try_from(bytes).map_err(|_| {
            CaptureError::allocation("output buffer", bytes, "exceeds the address space")
        })?;
        let pixels = try_alloc_zeroed(len, "output buffer")
            .map_err(|e| e.with_context(format!("{} RGBA canvas", size)))?;
        Ok(Self { pixels, size })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.pixels
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

pub struct Stitcher {
    tiles: VecDeque<Tile>,
    output: OutputBuffer,
    tile_size: Size,
    filter: ResampleFilter,
    resizer: Resizer,
    staging: Staging,
    composited: u32,
    aspect_warned: bool,
}

impl Stitcher {
    pub fn new(
        plan: &ResolutionPlan,
        tiles: Vec<Tile>,
        output: OutputBuffer,
        filter: ResampleFilter,
    ) -> Self {
        Self {
            tiles: tiles.into(),
            output,
            tile_size: plan.tile_size,
            filter,
            resizer: Resizer::new(),
            staging: Staging::with_capacity(0),
            composited: 0,
            aspect_warned: false,
        }
    }

    /// Composite the next tile. Returns `Ok(false)` once every tile is in.
    pub fn composite_next(&mut self, codec: &dyn TileCodec) -> Result<bool, CaptureError> {
        let Some(tile) = self.tiles.pop_front() else {
            return Ok(false);
        };
        let context = || format!("tile ({}, {})", tile.coord.col, tile.coord.row);

        let decoded = codec
            .decode(&tile.bytes)
            .map_err(|e| e.with_operation("decode tile").with_context(context()))?;
        let (x, y) = tile.coord.pixel_offset(self.tile_size);
        let canvas_size = self.output.size;

        if decoded.size == self.tile_size {
            blit_rgb_opaque(self.output.as_mut_slice(), canvas_size, &decoded.rgb, decoded.size, x, y)
                .map_err(|e| CaptureError::from(e).with_context(context()))?;
        } else {
            if !self.aspect_warned && !aspect_matches(decoded.size, self.tile_size) {
                // Only expected at the pixel floor, where both axes clamp to the same edge.
                tracing::warn!(
                    decoded = %decoded.size,
                    tile = %self.tile_size,
                    "tile aspect ratio changes when resampling"
                );
                self.aspect_warned = true;
            }
            self.staging.ensure_len(self.tile_size.rgb_len());
            resize_rgb_exact(
                &mut self.resizer,
                &decoded.rgb,
                decoded.size,
                self.tile_size,
                self.filter,
                self.staging.as_mut_slice(),
            )
            .map_err(|e| CaptureError::from(e).with_context(context()))?;
            blit_rgb_opaque(
                self.output.as_mut_slice(),
                canvas_size,
                self.staging.as_slice(),
                self.tile_size,
                x,
                y,
            )
            .map_err(|e| CaptureError::from(e).with_context(context()))?;
        }

        self.composited += 1;
        Ok(true)
    }

    pub fn composited(&self) -> u32 {
        self.composited
    }

    pub fn remaining(&self) -> usize {
        self.tiles.len()
    }

    /// Compressed bytes still waiting to be composited.
    pub fn retained_tile_bytes(&self) -> usize {
        self.tiles.iter().map(|t| t.bytes.len()).sum()
    }

    /// Free the resampling scratch; called on the reclamation cadence.
    pub fn trim(&mut self) {
        self.staging.release();
    }

    pub fn finish(self) -> OutputBuffer {
        self.output
    }
}
