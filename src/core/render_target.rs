//! # Scoped Offscreen Render Target
//!
//! The render backend has a single bound render target shared with the host.
//! A capture creates one offscreen surface up front and checks it out for
//! exactly one render + readback at a time:
//!
//! ```text
//!   OffscreenTarget::create ──▶ checkout ─▶ render ─▶ read_pixels ─▶ drop (rebind previous)
//!                                  ▲                                     │
//!                                  └──────────── next tile ──────────────┘
//!   OffscreenTarget::release ─▶ surface freed
//! ```
//!
//! [`TargetCheckout`] restores the previous binding when it goes out of scope,
//! on success and on every error path alike.

use tile_scale::plan::Size;

use crate::capture::{RenderBackend, SurfaceId};
use crate::error::CaptureError;

/// An offscreen surface owned by one capture.
///
/// Must be handed back with [`release`](Self::release); dropping it without
/// doing so logs a leak.
#[derive(Debug)]
pub struct OffscreenTarget {
    surface: SurfaceId,
    size: Size,
    released: bool,
}

impl OffscreenTarget {
    pub fn create<H: RenderBackend + ?Sized>(host: &mut H, size: Size) -> Result<Self, CaptureError> {
        let surface = host
            .create_surface(size)
            .map_err(|e| e.with_operation("create offscreen surface"))?;
        tracing::debug!(surface = surface.0, %size, "offscreen target created");
        Ok(Self {
            surface,
            size,
            released: false,
        })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Bind this surface for one render + readback.
    pub fn checkout<'a, H: RenderBackend + ?Sized>(&self, host: &'a mut H) -> TargetCheckout<'a, H> {
        let previous = host.bound_target();
        host.bind_target(Some(self.surface));
        TargetCheckout {
            host,
            surface: self.surface,
            previous,
        }
    }

    /// Free the surface.
    pub fn release<H: RenderBackend + ?Sized>(mut self, host: &mut H) {
        host.release_surface(self.surface);
        self.released = true;
        tracing::debug!(surface = self.surface.0, "offscreen target released");
    }
}

impl Drop for OffscreenTarget {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(
                surface = self.surface.0,
                size = %self.size,
                "offscreen target dropped without release; surface leaked"
            );
        }
    }
}

/// Exclusive use of the bound render target, scoped to one tile.
pub struct TargetCheckout<'a, H: RenderBackend + ?Sized> {
    host: &'a mut H,
    surface: SurfaceId,
    previous: Option<SurfaceId>,
}

impl<H: RenderBackend + ?Sized> TargetCheckout<'_, H> {
    pub fn render(&mut self) -> Result<(), CaptureError> {
        self.host
            .render()
            .map_err(|e| e.with_operation("render tile"))
    }

    pub fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), CaptureError> {
        self.host
            .read_pixels(self.surface, dst)
            .map_err(|e| e.with_operation("read back tile"))
    }
}

impl<H: RenderBackend + ?Sized> Drop for TargetCheckout<'_, H> {
    fn drop(&mut self) {
        self.host.bind_target(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::scene::ProceduralScene;

    #[test]
    fn test_checkout_restores_previous_binding() {
        let mut scene = ProceduralScene::new(Size::new(8, 8), 1.0);
        let onscreen = scene.create_surface(Size::new(8, 8)).unwrap();
        scene.bind_target(Some(onscreen));

        let target = OffscreenTarget::create(&mut scene, Size::new(8, 8)).unwrap();
        assert_eq!(target.size(), Size::new(8, 8));
        {
            let mut checkout = target.checkout(&mut scene);
            checkout.render().unwrap();
        }
        assert_eq!(scene.bound_target(), Some(onscreen));
        target.release(&mut scene);
        assert_eq!(scene.live_surfaces(), 1);
    }

    #[test]
    fn test_checkout_restores_binding_on_error() {
        let mut scene = ProceduralScene::new(Size::new(8, 8), 1.0);
        let target = OffscreenTarget::create(&mut scene, Size::new(8, 8)).unwrap();
        {
            let mut checkout = target.checkout(&mut scene);
            let mut short = vec![0u8; 3];
            assert!(checkout.read_pixels(&mut short).is_err());
        }
        assert_eq!(scene.bound_target(), None);
        target.release(&mut scene);
        assert_eq!(scene.live_surfaces(), 0);
    }
}
