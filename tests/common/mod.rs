//! Common test utilities and helpers for the capture library tests
//!
//! Test hosts with failure injection, a completion slot, and a manual
//! stepping loop that records every step.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use hires_capture::capture::CaptureHost;
use hires_capture::config::CaptureConfig;
use hires_capture::task::{CaptureOutcome, CaptureTask, Progress, Step};

/// Host wrapping the procedural scene with render recording and fault injection
pub mod mock_host {
    use hires_capture::capture::scene::ProceduralScene;
    use hires_capture::capture::{CaptureHost, Movement, RenderBackend, SurfaceId, ViewpointController};
    use hires_capture::error::CaptureError;
    use tile_scale::plan::{Size, Vec2};

    pub struct RecordingHost {
        pub scene: ProceduralScene,
        /// Camera centre at every render call
        pub render_centers: Vec<Vec2>,
        /// Fail the n-th render call (1-based)
        pub fail_render_on: Option<usize>,
    }

    impl RecordingHost {
        pub fn new(scene: ProceduralScene) -> Self {
            Self {
                scene,
                render_centers: Vec::new(),
                fail_render_on: None,
            }
        }
    }

    impl RenderBackend for RecordingHost {
        fn viewport_size(&self) -> Size {
            self.scene.viewport_size()
        }

        fn create_surface(&mut self, size: Size) -> Result<SurfaceId, CaptureError> {
            self.scene.create_surface(size)
        }

        fn release_surface(&mut self, surface: SurfaceId) {
            self.scene.release_surface(surface)
        }

        fn bound_target(&self) -> Option<SurfaceId> {
            self.scene.bound_target()
        }

        fn bind_target(&mut self, target: Option<SurfaceId>) {
            self.scene.bind_target(target)
        }

        fn render(&mut self) -> Result<(), CaptureError> {
            self.render_centers.push(self.scene.camera_center());
            if self.fail_render_on == Some(self.render_centers.len()) {
                return Err(CaptureError::render("render", "device lost"));
            }
            self.scene.render()
        }

        fn read_pixels(&mut self, surface: SurfaceId, dst: &mut [u8]) -> Result<(), CaptureError> {
            self.scene.read_pixels(surface, dst)
        }
    }

    impl ViewpointController for RecordingHost {
        fn set_target(&mut self, center: Vec2) {
            self.scene.set_target(center)
        }

        fn set_movement(&mut self, movement: Movement) {
            self.scene.set_movement(movement)
        }

        fn movement(&self) -> Movement {
            self.scene.movement()
        }

        fn camera_center(&self) -> Vec2 {
            self.scene.camera_center()
        }
    }

    impl CaptureHost for RecordingHost {
        fn end_frame(&mut self) {
            self.scene.end_frame()
        }

        fn reclaim_memory(&mut self) {
            self.scene.reclaim_memory()
        }

        fn available_memory(&self) -> Option<u64> {
            self.scene.available_memory()
        }
    }
}

/// Final encoder that always fails
pub mod failing {
    use hires_capture::codec::{EncodedImage, FinalEncoder};
    use hires_capture::error::CaptureError;
    use tile_scale::plan::Size;

    pub struct FailingEncoder;

    impl FinalEncoder for FailingEncoder {
        fn encode(&self, _rgba: &[u8], _size: Size) -> Result<EncodedImage, CaptureError> {
            Err(CaptureError::codec("test", "encoder refused the image"))
        }
    }
}

/// Receives the completion callback's outcome
#[derive(Clone, Default)]
pub struct ResultSlot {
    outcome: Rc<RefCell<Option<CaptureOutcome>>>,
    calls: Rc<RefCell<u32>>,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl FnOnce(CaptureOutcome) + 'static {
        let outcome = self.outcome.clone();
        let calls = self.calls.clone();
        move |result| {
            *calls.borrow_mut() += 1;
            *outcome.borrow_mut() = Some(result);
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.borrow()
    }

    pub fn take(&self) -> Option<CaptureOutcome> {
        self.outcome.borrow_mut().take()
    }
}

/// Default configuration with zero settle delays
pub fn fast_config() -> CaptureConfig {
    CaptureConfig::default().without_settle_delays()
}

/// One recorded step of [`run_to_end`]
#[derive(Debug, Clone, Copy)]
pub struct StepRecord {
    pub step: Step,
    pub progress: Option<Progress>,
}

/// Step `task` until it reports `Done`, ending a frame after every step.
pub fn run_to_end(task: &mut dyn CaptureTask, host: &mut dyn CaptureHost) -> Vec<StepRecord> {
    let mut records = Vec::new();
    for _ in 0..100_000 {
        let step = task.step(host);
        host.end_frame();
        records.push(StepRecord {
            step,
            progress: task.progress_steps(),
        });
        if step == Step::Done {
            return records;
        }
    }
    panic!("capture did not finish");
}
