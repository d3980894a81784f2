//! External steppers for [`CaptureTask`]s.
//!
//! A host with its own frame loop calls [`CaptureTask::step`] once per frame
//! and `end_frame` after it. For hosts without one, [`drive_blocking`] paces
//! steps on the current thread and [`drive`] does the same on a tokio interval.
//! Both honour `Step::Wait` and return the number of steps taken.

use std::thread;
use std::time::{Duration, Instant};

use tokio::time::{self, MissedTickBehavior};

use crate::capture::CaptureHost;
use crate::task::{CaptureTask, Step};

/// Step `task` to completion, sleeping up to `frame_interval` between frames.
pub fn drive_blocking(
    task: &mut dyn CaptureTask,
    host: &mut dyn CaptureHost,
    frame_interval: Duration,
) -> u64 {
    let mut steps = 0;
    let mut resume_at: Option<Instant> = None;
    loop {
        let t0 = Instant::now();
        if let Some(at) = resume_at {
            if t0 < at {
                thread::sleep(at - t0);
            }
            resume_at = None;
        }

        let step = task.step(host);
        host.end_frame();
        steps += 1;

        match step {
            Step::Done => return steps,
            Step::Ready => {}
            Step::Yield => {
                let elapsed = t0.elapsed();
                if elapsed < frame_interval {
                    thread::sleep(frame_interval - elapsed);
                }
            }
            Step::Wait(delay) => resume_at = Some(Instant::now() + delay),
        }
    }
}

/// Async variant of [`drive_blocking`]: one step per interval tick.
pub async fn drive(
    task: &mut dyn CaptureTask,
    host: &mut dyn CaptureHost,
    frame_interval: Duration,
) -> u64 {
    let period = frame_interval.max(Duration::from_millis(1));
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut steps = 0;
    loop {
        ticker.tick().await;
        let step = task.step(host);
        host.end_frame();
        steps += 1;

        match step {
            Step::Done => return steps,
            Step::Wait(delay) if !delay.is_zero() => {
                time::sleep(delay).await;
                ticker.reset();
            }
            _ => {}
        }
    }
}
