//! Single-frame capture: the current view, rendered offscreen at the configured
//! scale and encoded in one step. No tiling, no camera movement.

use tile_scale::plan::Size;

use crate::capture::CaptureHost;
use crate::codec::{EncodedImage, FinalEncoder, ImageEncoder};
use crate::config::CaptureConfig;
use crate::core::buffer_pool::try_alloc_zeroed;
use crate::core::render_target::OffscreenTarget;
use crate::error::CaptureError;
use crate::notify::{Notice, StatusSink, TracingSink};
use crate::task::{CaptureOutcome, CaptureTask, Completion, Progress, Step};

pub struct SingleFrameCapture {
    config: CaptureConfig,
    encoder: Box<dyn FinalEncoder>,
    sink: Box<dyn StatusSink>,
    completion: Completion,
}

impl SingleFrameCapture {
    pub fn new<F: FnOnce(CaptureOutcome) + 'static>(
        config: CaptureConfig,
        on_complete: F,
    ) -> Result<Self, CaptureError> {
        config.validate()?;
        Ok(Self {
            encoder: Box::new(ImageEncoder::new(config.output_format)),
            sink: Box::new(TracingSink),
            completion: Completion::new(Box::new(on_complete)),
            config,
        })
    }

    pub fn with_encoder<E: FinalEncoder + 'static>(mut self, encoder: E) -> Self {
        self.encoder = Box::new(encoder);
        self
    }

    pub fn with_status_sink<S: StatusSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Render size for the current viewport: the requested scale, stepped
    /// down while the frame would break the configured ceilings.
    fn frame_size(&mut self, viewport: Size) -> Result<Size, CaptureError> {
        let viewport = Size::new(viewport.w.max(1), viewport.h.max(1));
        let limits = self.config.limits();
        let requested = self.config.requested_scale;
        let mut scale = requested;
        let mut size = scaled(viewport, scale);
        while scale > 1 && !limits.admits(size) {
            scale -= 1;
            size = scaled(viewport, scale);
        }
        if !limits.admits(size) {
            return Err(CaptureError::allocation(
                "frame readback",
                size.area() * 4,
                format!(
                    "{} frame exceeds the configured ceilings ({} bytes, {} px per axis)",
                    size, self.config.max_output_bytes, self.config.max_output_dimension
                ),
            )
            .with_recovery_suggestion("Raise the output limits or shrink the viewport"));
        }
        if scale != requested {
            self.sink.notify(Notice::info(format!(
                "Resolution scale reduced from {} to {}",
                requested, scale
            )));
        }
        Ok(size)
    }

    fn capture(&mut self, host: &mut dyn CaptureHost) -> Result<EncodedImage, CaptureError> {
        let size = self.frame_size(host.viewport_size())?;
        let mut pixels = try_alloc_zeroed(size.rgba_len(), "frame readback")?;

        let target = OffscreenTarget::create(&mut *host, size)?;
        let read = {
            let mut checkout = target.checkout(&mut *host);
            checkout.render().and_then(|()| checkout.read_pixels(&mut pixels))
        };
        target.release(&mut *host);
        read?;

        for px in pixels.chunks_exact_mut(4) {
            px[3] = 255;
        }
        self.encoder
            .encode(&pixels, size)
            .map_err(|e| e.with_operation("encode frame"))
    }
}

fn scaled(size: Size, scale: u32) -> Size {
    Size::new(size.w.saturating_mul(scale), size.h.saturating_mul(scale))
}

impl CaptureTask for SingleFrameCapture {
    fn progress(&self) -> f32 {
        1.0
    }

    fn progress_steps(&self) -> Option<Progress> {
        Some(Progress::new(1, 1))
    }

    fn can_pause_simulation(&self) -> bool {
        false
    }

    fn step(&mut self, host: &mut dyn CaptureHost) -> Step {
        if self.completion.is_delivered() {
            return Step::Done;
        }
        let outcome = self.capture(host);
        match &outcome {
            Ok(image) => {
                tracing::info!(size = %image.size, bytes = image.bytes.len(), "frame captured");
            }
            Err(error) => {
                tracing::error!(category = error.category(), %error, "frame capture failed");
                self.sink.notify(Notice::error(format!("Capture failed: {}", error)));
            }
        }
        self.completion.deliver(outcome);
        Step::Done
    }

    fn release(&mut self, _host: &mut dyn CaptureHost) {
        // Surfaces never outlive a step; only an unsent result is left.
        if !self.completion.is_delivered() {
            self.completion.deliver(Err(CaptureError::cancelled("single-frame capture")));
        }
    }

    fn is_finished(&self) -> bool {
        self.completion.is_delivered()
    }
}
