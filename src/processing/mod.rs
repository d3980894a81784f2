//! # Processing Module
//!
//! Post-capture pixel work: compositing compressed tiles into the output buffer.

pub mod stitch;

pub use stitch::{OutputBuffer, Stitcher, Tile};
