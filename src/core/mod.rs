//! # Core Infrastructure Module
//!
//! Resource primitives shared by every capture: reusable readback buffers and
//! the scoped offscreen render target.

pub mod buffer_pool;
pub mod render_target;
