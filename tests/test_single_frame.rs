//! Single-frame capture: scenario D and resource handling.

mod common;

use common::failing::FailingEncoder;
use common::mock_host::RecordingHost;
use common::{fast_config, ResultSlot};
use hires_capture::capture::scene::ProceduralScene;
use hires_capture::capture::{RenderBackend, ViewpointController};
use hires_capture::config::{CaptureConfig, OutputFormat};
use hires_capture::notify::{CollectingSink, NoticeLevel};
use hires_capture::task::{CaptureTask, Progress, Step};
use hires_capture::SingleFrameCapture;
use tile_scale::plan::{Size, Vec2};

const VIEWPORT: Size = Size::new(48, 32);

#[test]
fn test_scenario_d_png_frame() {
    let mut scene = ProceduralScene::new(VIEWPORT, 1.0);
    let slot = ResultSlot::new();
    let mut task = SingleFrameCapture::new(fast_config(), slot.callback()).unwrap();

    assert_eq!(task.progress(), 1.0);
    assert_eq!(task.progress_steps(), Some(Progress::new(1, 1)));
    assert!(!task.can_pause_simulation());

    assert_eq!(task.step(&mut scene), Step::Done);
    let image = slot.take().unwrap().unwrap();
    assert!(!image.bytes.is_empty());
    assert!(image.bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
    assert_eq!(image.size, VIEWPORT);

    let decoded = image::load_from_memory(&image.bytes).unwrap().into_rgba8();
    assert_eq!(decoded.dimensions(), (48, 32));
    assert!(decoded.pixels().all(|p| p[3] == 255));
    assert_eq!(scene.live_surfaces(), 0);
    assert_eq!(scene.bound_target(), None);
}

#[test]
fn test_scenario_d_jpeg_frame_at_scale() {
    let mut scene = ProceduralScene::new(VIEWPORT, 1.0);
    let slot = ResultSlot::new();
    let config = CaptureConfig {
        requested_scale: 2,
        output_format: OutputFormat::Jpeg { quality: 90 },
        ..fast_config()
    };
    let mut task = SingleFrameCapture::new(config, slot.callback()).unwrap();
    task.step(&mut scene);

    let image = slot.take().unwrap().unwrap();
    assert_eq!(&image.bytes[..2], &[0xFF, 0xD8]);
    assert_eq!(image.size, Size::new(96, 64));
}

#[test]
fn test_frame_shows_current_view() {
    let mut scene = ProceduralScene::new(VIEWPORT, 1.0);
    scene.set_movement(hires_capture::Movement::Instant);
    scene.set_target(Vec2::new(300.0, -40.0));

    let slot = ResultSlot::new();
    let mut task = SingleFrameCapture::new(fast_config(), slot.callback()).unwrap();
    task.step(&mut scene);

    let decoded = image::load_from_memory(&slot.take().unwrap().unwrap().bytes)
        .unwrap()
        .into_rgba8();
    let reference = scene.render_area(Vec2::new(300.0, -40.0), scene.view_extent(), VIEWPORT);
    assert_eq!(decoded.into_raw(), reference);
}

#[test]
fn test_scale_is_reduced_to_fit_dimension_ceiling() {
    let mut scene = ProceduralScene::new(VIEWPORT, 1.0);
    let sink = CollectingSink::new();
    let slot = ResultSlot::new();
    let config = CaptureConfig {
        requested_scale: 4,
        max_output_dimension: 100,
        ..fast_config()
    };
    let mut task = SingleFrameCapture::new(config, slot.callback())
        .unwrap()
        .with_status_sink(sink.clone());
    task.step(&mut scene);

    assert_eq!(slot.take().unwrap().unwrap().size, Size::new(96, 64));
    assert!(sink.contains(NoticeLevel::Info, "reduced from 4 to 2"));
}

#[test]
fn test_frame_past_ceilings_is_refused() {
    let mut scene = ProceduralScene::new(VIEWPORT, 1.0);
    let slot = ResultSlot::new();
    let config = CaptureConfig {
        max_output_dimension: 40,
        ..fast_config()
    };
    let mut task = SingleFrameCapture::new(config, slot.callback()).unwrap();
    assert_eq!(task.step(&mut scene), Step::Done);

    let err = slot.take().unwrap().unwrap_err();
    assert_eq!(err.category(), "allocation");
    assert_eq!(scene.renders(), 0);
    assert_eq!(scene.live_surfaces(), 0);
}

#[test]
fn test_failures_release_the_surface() {
    let mut host = RecordingHost::new(ProceduralScene::new(VIEWPORT, 1.0));
    host.fail_render_on = Some(1);
    let slot = ResultSlot::new();
    let mut task = SingleFrameCapture::new(fast_config(), slot.callback()).unwrap();
    assert_eq!(task.step(&mut host), Step::Done);
    assert_eq!(slot.take().unwrap().unwrap_err().category(), "render");
    assert_eq!(host.scene.live_surfaces(), 0);

    let mut scene = ProceduralScene::new(VIEWPORT, 1.0);
    let slot = ResultSlot::new();
    let mut task = SingleFrameCapture::new(fast_config(), slot.callback())
        .unwrap()
        .with_encoder(FailingEncoder);
    task.step(&mut scene);
    assert_eq!(slot.take().unwrap().unwrap_err().category(), "codec");
    assert_eq!(scene.live_surfaces(), 0);
}

#[test]
fn test_release_before_step_cancels_once() {
    let mut scene = ProceduralScene::new(VIEWPORT, 1.0);
    let slot = ResultSlot::new();
    let mut task = SingleFrameCapture::new(fast_config(), slot.callback()).unwrap();
    task.release(&mut scene);
    task.release(&mut scene);
    assert!(slot.take().unwrap().unwrap_err().is_cancelled());
    assert_eq!(slot.calls(), 1);
    assert!(task.is_finished());
    assert_eq!(task.step(&mut scene), Step::Done);
}
