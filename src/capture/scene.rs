// # Procedural Scene Backend
//
// A deterministic software implementation of `CaptureHost`. The scene is an
// infinite world-space pattern; rendering samples it at pixel centres for the
// area the camera currently sees, so any number of adjacent tile renders line
// up exactly with one large render of the same area.
//
// The `hicap` binary captures this scene. Tests use its bookkeeping (live
// surfaces, bound target, render counts) to check resource handling.

use std::collections::HashMap;

use tile_scale::plan::{Size, Vec2};

use super::{CaptureHost, Movement, RenderBackend, SurfaceId, ViewpointController};
use crate::core::buffer_pool::try_alloc_zeroed;
use crate::error::CaptureError;

/// World-space colour field drawn by [`ProceduralScene`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pattern {
    /// Colour gradient over the world with a dark checker overlay.
    Checker { cell: f32 },
    /// Flat cells anchored at `origin`; each cell gets [`cell_color`].
    Cells { origin: Vec2, cell: Vec2 },
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern::Checker { cell: 64.0 }
    }
}

impl Pattern {
    fn sample(&self, p: Vec2) -> [u8; 3] {
        match *self {
            Pattern::Checker { cell } => {
                let cx = (p.x / cell).floor() as i64;
                let cy = (p.y / cell).floor() as i64;
                let r = (p.x * 0.25).rem_euclid(256.0) as u8;
                let g = (p.y * 0.25).rem_euclid(256.0) as u8;
                let b = ((p.x + p.y) * 0.125).rem_euclid(256.0) as u8;
                if (cx + cy) % 2 == 0 {
                    [r, g, b]
                } else {
                    [r / 2, g / 2, b / 2]
                }
            }
            Pattern::Cells { origin, cell } => {
                let col = ((p.x - origin.x) / cell.x).floor() as i64;
                let row = ((p.y - origin.y) / cell.y).floor() as i64;
                cell_color(col, row)
            }
        }
    }
}

/// Colour of cell `(col, row)` in [`Pattern::Cells`]; distinct for
/// `0 <= col, row < 6`, and far enough apart to survive lossy compression.
pub fn cell_color(col: i64, row: i64) -> [u8; 3] {
    [
        (24 + col.rem_euclid(6) * 40) as u8,
        (24 + row.rem_euclid(6) * 40) as u8,
        (64 + (col + row).rem_euclid(4) * 48) as u8,
    ]
}

struct Surface {
    size: Size,
    pixels: Vec<u8>,
}

/// Software render backend + camera over a [`Pattern`].
pub struct ProceduralScene {
    viewport: Size,
    pixel_density: f32,
    pattern: Pattern,
    camera: Vec2,
    target: Vec2,
    movement: Movement,
    surfaces: HashMap<u64, Surface>,
    next_surface: u64,
    bound: Option<SurfaceId>,
    available_memory: Option<u64>,
    renders: u64,
    frames: u64,
    reclaims: u64,
}

impl ProceduralScene {
    /// `viewport` is the device frame size; one frame shows
    /// `viewport / pixel_density` world units.
    pub fn new(viewport: Size, pixel_density: f32) -> Self {
        Self {
            viewport,
            pixel_density,
            pattern: Pattern::default(),
            camera: Vec2::default(),
            target: Vec2::default(),
            movement: Movement::Smooth,
            surfaces: HashMap::new(),
            next_surface: 1,
            bound: None,
            available_memory: None,
            renders: 0,
            frames: 0,
            reclaims: 0,
        }
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Cap on any single working buffer a capture may allocate.
    pub fn with_available_memory(mut self, bytes: u64) -> Self {
        self.available_memory = Some(bytes);
        self
    }

    pub fn live_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn reclaims(&self) -> u64 {
        self.reclaims
    }

    /// World-space area covered by one frame.
    pub fn view_extent(&self) -> Vec2 {
        Vec2::new(
            self.viewport.w as f32 / self.pixel_density,
            self.viewport.h as f32 / self.pixel_density,
        )
    }

    /// Render `extent` world units centred on `center` straight into an
    /// RGBA buffer of `size`. Used for reference images.
    pub fn render_area(&self, center: Vec2, extent: Vec2, size: Size) -> Vec<u8> {
        let mut pixels = vec![0u8; size.rgba_len()];
        self.fill(center, extent, size, &mut pixels);
        pixels
    }

    fn fill(&self, center: Vec2, extent: Vec2, size: Size, pixels: &mut [u8]) {
        let left = center.x - extent.x / 2.0;
        let top = center.y - extent.y / 2.0;
        let step_x = extent.x / size.w as f32;
        let step_y = extent.y / size.h as f32;
        for (i, px) in pixels.chunks_exact_mut(4).enumerate() {
            let x = (i % size.w as usize) as f32;
            let y = (i / size.w as usize) as f32;
            let p = Vec2::new(left + (x + 0.5) * step_x, top + (y + 0.5) * step_y);
            let [r, g, b] = self.pattern.sample(p);
            px.copy_from_slice(&[r, g, b, 255]);
        }
    }
}

impl RenderBackend for ProceduralScene {
    fn viewport_size(&self) -> Size {
        self.viewport
    }

    fn create_surface(&mut self, size: Size) -> Result<SurfaceId, CaptureError> {
        if size.is_empty() {
            return Err(CaptureError::render(
                "create surface",
                format!("empty surface {}", size),
            ));
        }
        let pixels = try_alloc_zeroed(size.rgba_len(), "offscreen surface")?;
        let id = self.next_surface;
        self.next_surface += 1;
        self.surfaces.insert(id, Surface { size, pixels });
        Ok(SurfaceId(id))
    }

    fn release_surface(&mut self, surface: SurfaceId) {
        self.surfaces.remove(&surface.0);
        if self.bound == Some(surface) {
            self.bound = None;
        }
    }

    fn bound_target(&self) -> Option<SurfaceId> {
        self.bound
    }

    fn bind_target(&mut self, target: Option<SurfaceId>) {
        self.bound = target;
    }

    fn render(&mut self) -> Result<(), CaptureError> {
        let id = self
            .bound
            .ok_or_else(|| CaptureError::render("render", "no offscreen target bound"))?;
        let mut surface = self
            .surfaces
            .remove(&id.0)
            .ok_or_else(|| CaptureError::render("render", format!("unknown surface {}", id.0)))?;
        self.fill(self.camera, self.view_extent(), surface.size, &mut surface.pixels);
        self.surfaces.insert(id.0, surface);
        self.renders += 1;
        Ok(())
    }

    fn read_pixels(&mut self, surface: SurfaceId, dst: &mut [u8]) -> Result<(), CaptureError> {
        let src = self.surfaces.get(&surface.0).ok_or_else(|| {
            CaptureError::render("read pixels", format!("unknown surface {}", surface.0))
        })?;
        if dst.len() != src.pixels.len() {
            return Err(CaptureError::render(
                "read pixels",
                format!(
                    "destination holds {} bytes, surface {} needs {}",
                    dst.len(),
                    src.size,
                    src.pixels.len()
                ),
            ));
        }
        dst.copy_from_slice(&src.pixels);
        Ok(())
    }
}

impl ViewpointController for ProceduralScene {
    fn set_target(&mut self, center: Vec2) {
        self.target = center;
        if self.movement == Movement::Instant {
            self.camera = center;
        }
    }

    fn set_movement(&mut self, movement: Movement) {
        self.movement = movement;
        if movement == Movement::Instant {
            self.camera = self.target;
        }
    }

    fn movement(&self) -> Movement {
        self.movement
    }

    fn camera_center(&self) -> Vec2 {
        self.camera
    }
}

impl CaptureHost for ProceduralScene {
    fn end_frame(&mut self) {
        self.frames += 1;
        // Smooth movement closes half the remaining distance per frame.
        let dx = self.target.x - self.camera.x;
        let dy = self.target.y - self.camera.y;
        if dx.abs() < 0.01 && dy.abs() < 0.01 {
            self.camera = self.target;
        } else {
            self.camera = Vec2::new(self.camera.x + dx * 0.5, self.camera.y + dy * 0.5);
        }
    }

    fn reclaim_memory(&mut self) {
        self.reclaims += 1;
    }

    fn available_memory(&self) -> Option<u64> {
        self.available_memory
    }
}
