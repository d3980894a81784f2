//! Driving captures with the blocking and async steppers, and writing results to disk.

mod common;

use std::time::{Duration, Instant};

use common::{fast_config, ResultSlot};
use hires_capture::capture::scene::ProceduralScene;
use hires_capture::capture::CaptureRegion;
use hires_capture::config::CaptureConfig;
use hires_capture::driver::{drive, drive_blocking};
use hires_capture::task::CaptureTask;
use tile_scale::plan::Size;

#[test]
fn test_blocking_driver_honours_settle_delays() {
    let mut scene = ProceduralScene::new(Size::new(16, 16), 1.0);
    let slot = ResultSlot::new();
    let config = CaptureConfig {
        settle_delay: Duration::from_millis(10),
        post_snap_delay: Duration::from_millis(5),
        ..CaptureConfig::default()
    };
    let mut task = hires_capture::capture(CaptureRegion::new(0.0, 0.0, 32.0, 16.0), config, slot.callback())
        .unwrap();

    let started = Instant::now();
    let steps = drive_blocking(&mut task, &mut scene, Duration::ZERO);

    // Two tiles, each waiting 10 ms + 5 ms.
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert!(task.is_finished());
    assert_eq!(steps, scene.frames());
    assert!(slot.take().unwrap().is_ok());
}

#[tokio::test]
async fn test_async_driver_completes_tiled_capture() {
    let mut scene = ProceduralScene::new(Size::new(16, 16), 1.0);
    let slot = ResultSlot::new();
    let mut task = hires_capture::capture(
        CaptureRegion::new(0.0, 0.0, 48.0, 32.0),
        fast_config(),
        slot.callback(),
    )
    .unwrap();

    let steps = drive(&mut task, &mut scene, Duration::from_millis(1)).await;

    assert!(steps > 6);
    let image = slot.take().unwrap().unwrap();
    assert_eq!(image.size, Size::new(48, 32));
    assert_eq!(scene.live_surfaces(), 0);
}

#[test]
fn test_captured_image_writes_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.png");

    let mut scene = ProceduralScene::new(Size::new(20, 10), 1.0);
    let slot = ResultSlot::new();
    let mut task = hires_capture::capture(
        CaptureRegion::new(5.0, 5.0, 40.0, 20.0),
        fast_config(),
        slot.callback(),
    )
    .unwrap();
    drive_blocking(&mut task, &mut scene, Duration::ZERO);

    let image = slot.take().unwrap().unwrap();
    std::fs::write(&path, &image.bytes).unwrap();

    let reopened = image::open(&path).unwrap();
    assert_eq!((reopened.width(), reopened.height()), (40, 20));
}
