//! # Capture Configuration
//!
//! Tunables for tiled and single-frame captures. The same struct backs the
//! `hicap` CLI flags and programmatic use of the library.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Type | Default | Description |
//! |-----------|------|---------|-------------|
//! | `requested_scale` | `u32` | 1 | Integer multiplier on the device frame size |
//! | `pixel_density` | `f32` | 1.0 | Device pixels per world unit at scale 1 |
//! | `max_output_bytes` | `u64` | 512 MiB | Ceiling on the stitched RGBA buffer |
//! | `max_output_dimension` | `u32` | 16384 | Ceiling on either output axis |
//! | `tile_quality` | `u8` | 95 | JPEG quality of the intermediate tiles |
//! | `output_format` | `OutputFormat` | PNG | Delivered image format |
//! | `settle_delay` | `Duration` | 250 ms | Wait after aiming the camera at a tile |
//! | `post_snap_delay` | `Duration` | 50 ms | Wait after the instantaneous camera move |
//! | `reclaim_interval` | `u32` | 20 | Tiles between pool trims and forced yields |
//! | `resample_filter` | `ResampleFilter` | Lanczos3 | Filter for downsampled tiles |
//!
//! The settle delays stand in for a "scene finished loading" signal that the
//! render backend does not provide.
//!
//! ## Examples
//!
//! ```rust
//! use hires_capture::config::CaptureConfig;
//!
//! let mut config = CaptureConfig::default();
//! config.requested_scale = 3;
//! assert!(config.validate().is_ok());
//!
//! let limits = config.limits();
//! assert_eq!(limits.max_output_dimension, 16384);
//! ```

use std::time::Duration;

use tile_scale::cpu::ResampleFilter;
use tile_scale::plan::PlanLimits;

use crate::error::CaptureError;

/// Encoded format of the delivered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Lossless PNG with an opaque alpha channel.
    Png,
    /// Baseline JPEG at the given quality (1-100).
    Jpeg { quality: u8 },
}

impl OutputFormat {
    /// Conventional file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg { .. } => "jpg",
        }
    }
}

/// Configuration structure for capture operations.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Integer multiplier applied to the device frame size for every tile.
    ///
    /// The planner may lower this when the output would exceed a ceiling.
    pub requested_scale: u32,

    /// Device pixels per world unit at scale 1.
    pub pixel_density: f32,

    /// Maximum byte size of the stitched RGBA output buffer.
    pub max_output_bytes: u64,

    /// Maximum pixel count along either axis of the output.
    pub max_output_dimension: u32,

    /// JPEG quality used for the compressed intermediate tiles (1-100).
    ///
    /// Tiles are only kept compressed to bound memory across the whole grid;
    /// they never leave the capture.
    pub tile_quality: u8,

    /// Format of the bytes handed to the completion callback.
    pub output_format: OutputFormat,

    /// Wait after asking the viewpoint controller to move to a tile.
    pub settle_delay: Duration,

    /// Wait after the instantaneous camera move, before the frame boundary.
    pub post_snap_delay: Duration,

    /// Number of tiles between buffer-pool trims and forced yields.
    pub reclaim_interval: u32,

    /// Resampling filter used when decoded tiles must be resized.
    pub resample_filter: ResampleFilter,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            requested_scale: 1,
            pixel_density: 1.0,
            max_output_bytes: 512 * 1024 * 1024,
            max_output_dimension: 16384,
            tile_quality: 95,
            output_format: OutputFormat::Png,
            settle_delay: Duration::from_millis(250),
            post_snap_delay: Duration::from_millis(50),
            reclaim_interval: 20,
            resample_filter: ResampleFilter::Lanczos3,
        }
    }
}

impl CaptureConfig {
    /// Configuration with both settle delays set to zero, for hosts whose
    /// scene content is available as soon as the camera moves.
    pub fn without_settle_delays(mut self) -> Self {
        self.settle_delay = Duration::ZERO;
        self.post_snap_delay = Duration::ZERO;
        self
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.requested_scale == 0 {
            return Err(CaptureError::config(
                "requested_scale",
                "0",
                "must be at least 1",
            ));
        }
        if !(self.pixel_density.is_finite() && self.pixel_density > 0.0) {
            return Err(CaptureError::config(
                "pixel_density",
                self.pixel_density.to_string(),
                "must be a positive finite number",
            ));
        }
        if self.max_output_bytes < 4 {
            return Err(CaptureError::config(
                "max_output_bytes",
                self.max_output_bytes.to_string(),
                "must admit at least one RGBA pixel",
            ));
        }
        if self.max_output_dimension == 0 {
            return Err(CaptureError::config(
                "max_output_dimension",
                "0",
                "must be greater than 0",
            ));
        }
        if !(1..=100).contains(&self.tile_quality) {
            return Err(CaptureError::config(
                "tile_quality",
                self.tile_quality.to_string(),
                "must be between 1 and 100",
            ));
        }
        if let OutputFormat::Jpeg { quality } = self.output_format {
            if !(1..=100).contains(&quality) {
                return Err(CaptureError::config(
                    "output_format.quality",
                    quality.to_string(),
                    "must be between 1 and 100",
                ));
            }
        }
        if self.reclaim_interval == 0 {
            return Err(CaptureError::config(
                "reclaim_interval",
                "0",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Ceilings handed to the resolution planner.
    pub fn limits(&self) -> PlanLimits {
        PlanLimits {
            max_output_bytes: self.max_output_bytes,
            max_output_dimension: self.max_output_dimension,
        }
    }
}
