//! # Configuration Module
//!
//! This module provides the capture configuration shared by the CLI and the library.

pub mod config;

pub use config::{CaptureConfig, OutputFormat};
