//! # Capture Error Handling
//!
//! Error taxonomy for tiled and single-frame captures. Every failure that ends a
//! capture invocation is represented here and delivered to the completion
//! callback; nothing escapes as a panic.
//!
//! ## Error Classification
//!
//! - **Allocation**: the output buffer (or a working buffer) could not be
//!   allocated. Fatal for the current invocation only.
//! - **Codec**: the tile codec or the final encoder rejected the data.
//! - **Render**: the render backend failed to create, bind, draw into or read
//!   back an offscreen surface.
//! - **Processing**: resampling or compositing failed (dimension mismatches).
//! - **Cancelled**: the task was released before it completed.
//!
//! No error is retried automatically; callers may start a fresh capture.
//!
//! ## Usage
//!
//! ```rust
//! use hires_capture::error::{CaptureError, HasRecoverySuggestion};
//!
//! let error = CaptureError::allocation("output buffer", 1 << 30, "out of memory")
//!     .with_context("allocating 16384x16384 RGBA canvas")
//!     .with_recovery_suggestion("Lower the resolution scale or capture a smaller region");
//!
//! assert_eq!(error.category(), "allocation");
//! assert!(error.recovery_suggestion().is_some());
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

use tile_scale::cpu::ScaleError;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational errors
    Info,
    /// Warnings that may indicate potential issues
    Warning,
    /// Errors that end the current capture
    Error,
    /// Errors caused by resource exhaustion
    Critical,
}

/// Core error context containing metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Additional metadata as key-value pairs
    pub metadata: std::collections::HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            metadata: std::collections::HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Base error type for the capture library
#[derive(Debug)]
pub enum CaptureError {
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// Render backend failures (surface creation, binding, drawing, readback)
    Render {
        operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// Tile codec or final encoder failures
    Codec {
        codec: String,
        reason: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
        context: ErrorContext,
    },
    /// Buffer allocation failures
    Allocation {
        resource: String,
        bytes: u64,
        reason: String,
        context: ErrorContext,
    },
    /// Resampling and compositing errors
    Processing {
        operation: String,
        reason: String,
        source: Option<ScaleError>,
        context: ErrorContext,
    },
    /// The task was released before it produced a result
    Cancelled {
        phase: String,
        context: ErrorContext,
    },
}

impl CaptureError {
    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a render backend error
    pub fn render(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Render {
            operation: operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a codec error
    pub fn codec(codec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Codec {
            codec: codec.into(),
            reason: reason.into(),
            source: None,
            context: ErrorContext::new(),
        }
    }

    /// Create a codec error wrapping an underlying library error
    pub fn codec_source(
        codec: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Codec {
            codec: codec.into(),
            reason: source.to_string(),
            source: Some(Box::new(source)),
            context: ErrorContext::new(),
        }
    }

    /// Create an allocation error
    pub fn allocation(resource: impl Into<String>, bytes: u64, reason: impl Into<String>) -> Self {
        Self::Allocation {
            resource: resource.into(),
            bytes,
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Critical),
        }
    }

    /// Create a processing error
    pub fn processing(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Processing {
            operation: operation.into(),
            reason: reason.into(),
            source: None,
            context: ErrorContext::new(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(phase: impl Into<String>) -> Self {
        Self::Cancelled {
            phase: phase.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Info),
        }
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation information to an existing error
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion to an existing error
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Set severity level
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Config { context, .. }
            | Self::Render { context, .. }
            | Self::Codec { context, .. }
            | Self::Allocation { context, .. }
            | Self::Processing { context, .. }
            | Self::Cancelled { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Config { context, .. }
            | Self::Render { context, .. }
            | Self::Codec { context, .. }
            | Self::Allocation { context, .. }
            | Self::Processing { context, .. }
            | Self::Cancelled { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Render { .. } => "render",
            Self::Codec { .. } => "codec",
            Self::Allocation { .. } => "allocation",
            Self::Processing { .. } => "processing",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config {
                field,
                value,
                reason,
                ..
            } => write!(
                f,
                "Configuration error in field '{}': {} (value: {})",
                field, reason, value
            ),
            Self::Render {
                operation, reason, ..
            } => write!(f, "Render error during {}: {}", operation, reason),
            Self::Codec { codec, reason, .. } => write!(f, "{} codec error: {}", codec, reason),
            Self::Allocation {
                resource,
                bytes,
                reason,
                ..
            } => write!(
                f,
                "Failed to allocate {} ({} bytes): {}",
                resource, bytes, reason
            ),
            Self::Processing {
                operation, reason, ..
            } => write!(f, "Processing error in {}: {}", operation, reason),
            Self::Cancelled { phase, .. } => write!(f, "Capture cancelled during {}", phase),
        }?;

        if let Some(context) = &self.context().context {
            write!(f, " (context: {})", context)?;
        }
        Ok(())
    }
}

impl StdError for CaptureError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Codec {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            Self::Processing {
                source: Some(source),
                ..
            } => Some(source),
            _ => None,
        }
    }
}

/// Trait for errors that carry a severity
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for CaptureError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    /// Get a recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for CaptureError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification helpers
pub mod classify {
    use super::*;

    /// Resource exhaustion: a smaller request may succeed where this one failed.
    pub fn is_resource_exhaustion(error: &CaptureError) -> bool {
        matches!(error, CaptureError::Allocation { .. })
    }

    /// Check if an error requires user intervention
    pub fn requires_user_intervention(error: &CaptureError) -> bool {
        matches!(
            error,
            CaptureError::Config { .. } | CaptureError::Allocation { .. }
        )
    }

    /// Get the error priority for logging/handling
    pub fn priority(error: &CaptureError) -> u8 {
        match error.severity() {
            ErrorSeverity::Info => 0,
            ErrorSeverity::Warning => 1,
            ErrorSeverity::Error => 2,
            ErrorSeverity::Critical => 3,
        }
    }
}

/// Error conversion implementations
impl From<image::ImageError> for CaptureError {
    fn from(error: image::ImageError) -> Self {
        Self::codec_source("image", error)
    }
}

impl From<ScaleError> for CaptureError {
    fn from(error: ScaleError) -> Self {
        Self::Processing {
            operation: "tile resample".to_string(),
            reason: error.to_string(),
            source: Some(error),
            context: ErrorContext::new(),
        }
    }
}
