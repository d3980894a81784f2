// SPDX-License-Identifier: MIT
//! # tile-scale: Planning and Pixel Math for Tiled Captures
//!
//! This crate holds the backend-free half of a tiled high-resolution capture:
//! deciding how big the output may get, in which order tiles are visited, and
//! how decoded tiles are resampled and composited into one RGBA canvas.
//!
//! ## Key Components
//!
//! - [`plan`]: Resolution planner that degrades scale, then per-tile size, until
//!   the output fits the memory and per-axis ceilings
//! - [`grid`]: Tile grid sizing and the serpentine (boustrophedon) visit order
//! - [`cpu`]: SIMD resampling via fast_image_resize plus row-wise blits
//!
//! ## Usage Example
//!
//! ```rust
//! use tile_scale::plan::{build_plan, PlanLimits, PlanRequest, Size, Vec2};
//!
//! let plan = build_plan(&PlanRequest {
//!     region_size: Vec2::new(3000.0, 2000.0),
//!     requested_scale: 2,
//!     device_tile: Size::new(1920, 1080),
//!     pixel_density: 1.0,
//!     limits: PlanLimits {
//!         max_output_bytes: 512 * 1024 * 1024,
//!         max_output_dimension: 16384,
//!     },
//! })
//! .unwrap();
//!
//! assert_eq!(plan.grid.cols * plan.tile_size.w, plan.output_size.w);
//! assert_eq!(plan.grid.rows * plan.tile_size.h, plan.output_size.h);
//! ```

pub mod cpu;
pub mod grid;
pub mod plan;
