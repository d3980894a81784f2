// # Capture Host Module
//
// Capabilities a capture consumes from its host application: offscreen
// rendering with pixel readback, a viewpoint (camera) controller, and a few
// frame-cycle hooks. Tasks receive the host as `&mut dyn CaptureHost` on every
// step and never keep it between steps.

pub mod scene;

use tile_scale::plan::{Size, Vec2};

use crate::error::CaptureError;

/// World-space area to capture. Immutable for the duration of one capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRegion {
    /// Top-left corner in world units.
    pub position: Vec2,
    /// Extent in world units.
    pub size: Vec2,
}

impl CaptureRegion {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }
}

/// Opaque handle to an offscreen surface owned by the render backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// How the viewpoint controller moves the camera towards its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    /// Eased movement spread over several frames.
    Smooth,
    /// The camera jumps to the target as soon as it is set.
    Instant,
}

/// Render-to-surface and pixel readback.
///
/// Only one offscreen target is bound at a time; see
/// [`crate::core::render_target`] for the scoped checkout that guarantees the
/// previous binding is restored.
pub trait RenderBackend {
    /// Pixel size of one device frame at scale 1.
    fn viewport_size(&self) -> Size;

    /// Allocate an offscreen RGBA surface.
    fn create_surface(&mut self, size: Size) -> Result<SurfaceId, CaptureError>;

    /// Free a surface. Releasing an unknown id is a no-op.
    fn release_surface(&mut self, surface: SurfaceId);

    /// Currently bound render target (`None` = the on-screen frame).
    fn bound_target(&self) -> Option<SurfaceId>;

    fn bind_target(&mut self, target: Option<SurfaceId>);

    /// Render the current scene state into the bound target.
    fn render(&mut self) -> Result<(), CaptureError>;

    /// Copy a rendered surface into `dst` as tightly packed RGBA8.
    fn read_pixels(&mut self, surface: SurfaceId, dst: &mut [u8]) -> Result<(), CaptureError>;
}

/// Camera target, mode and movement style. Offers no completion signal, so
/// callers pace themselves with fixed delays.
pub trait ViewpointController {
    fn set_target(&mut self, center: Vec2);

    fn set_movement(&mut self, movement: Movement);

    fn movement(&self) -> Movement;

    fn camera_center(&self) -> Vec2;
}

/// Everything a capture task needs from its host on each step.
pub trait CaptureHost: RenderBackend + ViewpointController {
    /// End-of-frame boundary; the driver calls this after every step.
    fn end_frame(&mut self) {}

    /// Best-effort request to reclaim unreferenced memory.
    fn reclaim_memory(&mut self) {}

    /// Bytes the host is willing to give to one working buffer, if it knows.
    fn available_memory(&self) -> Option<u64> {
        None
    }
}
