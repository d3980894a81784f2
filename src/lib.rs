//! # High-Resolution Capture Library
//!
//! Captures a rendered scene at a resolution larger than one device frame by
//! rendering it tile by tile, keeping the tiles compressed, stitching them into
//! one RGBA buffer and encoding the result, all under hard memory and
//! per-axis dimension ceilings.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `capture`: Capabilities consumed from the host (render backend, camera)
//!   and a deterministic software scene
//! - `tiled` / `single`: The two capture tasks
//! - `task` / `driver`: The step contract and external steppers
//! - `processing`: Tile stitching into the output buffer
//! - `codec`: Intermediate tile codec and final image encoder
//! - `core`: Buffer pool and scoped offscreen render target
//! - `config`: Configuration management and validation
//! - `notify`: User-visible status notices
//!
//! Resolution planning and tile/pixel arithmetic live in the `tile_scale`
//! workspace crate.
//!
//! ## Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! use hires_capture::capture::scene::ProceduralScene;
//! use hires_capture::capture::CaptureRegion;
//! use hires_capture::config::CaptureConfig;
//! use hires_capture::driver::drive_blocking;
//! use tile_scale::plan::Size;
//!
//! let mut scene = ProceduralScene::new(Size::new(64, 36), 1.0);
//! let result = Rc::new(RefCell::new(None));
//! let slot = result.clone();
//!
//! let config = CaptureConfig {
//!     requested_scale: 2,
//!     ..CaptureConfig::default()
//! }
//! .without_settle_delays();
//! let mut task = hires_capture::capture(CaptureRegion::new(0.0, 0.0, 128.0, 72.0), config, move |outcome| {
//!     *slot.borrow_mut() = Some(outcome);
//! })
//! .unwrap();
//!
//! drive_blocking(&mut task, &mut scene, Duration::ZERO);
//! let image = result.borrow_mut().take().unwrap().unwrap();
//! assert_eq!(image.size, Size::new(256, 144));
//! ```

pub mod capture;
pub mod codec;
pub mod config;
pub mod core;
pub mod driver;
pub mod error;
pub mod notify;
pub mod processing;
pub mod single;
pub mod task;
pub mod tiled;

/// Re-export error types for convenience
pub use error::{CaptureError, HasRecoverySuggestion, HasSeverity};

pub use capture::{CaptureHost, CaptureRegion, Movement, RenderBackend, ViewpointController};
pub use codec::EncodedImage;
pub use config::{CaptureConfig, OutputFormat};
pub use single::SingleFrameCapture;
pub use task::{CaptureOutcome, CaptureTask, Progress, Step};
pub use tiled::{TiledCapture, TiledCaptureBuilder};

/// Start a tiled capture of `region`.
///
/// Returns the task to be stepped by the host (or by one of the [`driver`]
/// functions). `on_complete` runs exactly once, with the encoded image or the
/// reason the capture failed or was cancelled.
///
/// # Parameters
///
/// * `region` - World-space area to capture; top-left corner plus extent.
/// * `config` - Scale, ceilings, codec quality and pacing.
/// * `on_complete` - Completion callback.
///
/// # Errors
///
/// Returns a configuration error when `config` or `region` is invalid. Errors
/// that happen while the task runs are delivered to `on_complete` instead.
pub fn capture<F>(
    region: CaptureRegion,
    config: CaptureConfig,
    on_complete: F,
) -> Result<TiledCapture, CaptureError>
where
    F: FnOnce(CaptureOutcome) + 'static,
{
    TiledCapture::builder(region)
        .with_config(config)
        .on_complete(on_complete)
        .build()
}
