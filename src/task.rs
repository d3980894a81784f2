//! # Capture Tasks
//!
//! A capture is a state machine advanced one bounded unit of work at a time by
//! an external driver, usually once per host frame:
//!
//! ```text
//!   driver ──step(host)──▶ task ──▶ Step::Ready | Yield | Wait(d) | Done
//!     ▲                                         │
//!     └─────────── host.end_frame() ◀───────────┘
//! ```
//!
//! A task finishes by invoking its completion callback exactly once, with the
//! encoded image or a [`CaptureError`]. A driver that stops stepping must call
//! [`CaptureTask::release`], which frees render surfaces and retained tiles and
//! reports [`CaptureError::Cancelled`] if nothing was delivered yet.

use std::time::Duration;

use crate::capture::CaptureHost;
use crate::codec::EncodedImage;
use crate::error::CaptureError;

/// What the driver should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Bounded work was done and more remains.
    Ready,
    /// Nothing was done on purpose; step again on the next frame.
    Yield,
    /// Do not step again before the duration has elapsed.
    Wait(Duration),
    /// The completion callback has fired.
    Done,
}

/// `(completed, total)` step counters. `completed <= total` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: u32,
    pub total: u32,
}

impl Progress {
    pub fn new(completed: u32, total: u32) -> Self {
        Self {
            completed: completed.min(total),
            total,
        }
    }

    /// Completion in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f32 / self.total as f32
    }
}

pub type CaptureOutcome = Result<EncodedImage, CaptureError>;

pub type CompletionCallback = Box<dyn FnOnce(CaptureOutcome)>;

/// Holds a completion callback and makes sure it runs exactly once.
///
/// If it is dropped undelivered the callback receives `Cancelled`.
pub struct Completion {
    callback: Option<CompletionCallback>,
}

impl Completion {
    pub fn new(callback: CompletionCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    /// Invoke the callback. Returns false if it already ran.
    pub fn deliver(&mut self, outcome: CaptureOutcome) -> bool {
        match self.callback.take() {
            Some(callback) => {
                callback(outcome);
                true
            }
            None => false,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.callback.is_none()
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            tracing::warn!("capture dropped before completion");
            callback(Err(CaptureError::cancelled("abandonment")));
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("delivered", &self.is_delivered())
            .finish()
    }
}

/// Common interface of tiled and single-frame captures.
pub trait CaptureTask {
    /// Completion as a fraction in `[0, 1]`.
    fn progress(&self) -> f32 {
        self.progress_steps().map_or(0.0, |p| p.fraction())
    }

    /// Finer-grained progress, once the task knows its total.
    fn progress_steps(&self) -> Option<Progress>;

    /// Whether the host may pause its simulation while this task runs.
    fn can_pause_simulation(&self) -> bool;

    /// Advance by one bounded unit of work.
    fn step(&mut self, host: &mut dyn CaptureHost) -> Step;

    /// Free every acquired resource. Idempotent.
    fn release(&mut self, host: &mut dyn CaptureHost);

    fn is_finished(&self) -> bool;
}
