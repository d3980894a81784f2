use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use hires_capture::capture::scene::ProceduralScene;
use hires_capture::capture::CaptureRegion;
use hires_capture::config::{CaptureConfig, OutputFormat};
use hires_capture::driver;
use hires_capture::{CaptureOutcome, CaptureTask, SingleFrameCapture, TiledCapture};
use tile_scale::cpu::ResampleFilter;
use tile_scale::plan::Size;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Png,
    Jpeg,
}

/// Tiled high-resolution capture of a procedural scene.
#[derive(Parser, Debug)]
#[command(name = "hicap")]
#[command(about = "📸 Capture a scene region at higher-than-screen resolution")]
#[command(long_about = "Renders a world-space region tile by tile, stitches the tiles and writes one image.
Output size is reduced automatically when it would exceed the memory or dimension ceilings.")]
struct Args {
    /// Output image path
    #[arg(help = "Output file path (defaults to capture.png or capture.jpg)")]
    output: Option<PathBuf>,

    /// World-space region
    #[arg(short, long, default_value = "0,0,1920,1080",
          help = "Region to capture as x,y,width,height in world units")]
    region: String,

    /// Resolution scale
    #[arg(short, long, default_value_t = 1,
          help = "Integer multiplier on the device frame size (reduced automatically if needed)")]
    scale: u32,

    /// Device frame size
    #[arg(long, default_value = "640x360", help = "Device frame size as WIDTHxHEIGHT")]
    viewport: String,

    #[arg(long, default_value_t = 1.0, help = "Device pixels per world unit at scale 1")]
    density: f32,

    #[arg(short, long, value_enum, default_value_t = FormatArg::Png, help = "Output image format")]
    format: FormatArg,

    #[arg(short, long, default_value_t = 90, help = "JPEG output quality (1-100)")]
    quality: u8,

    #[arg(long, default_value_t = 512 * 1024 * 1024, help = "Ceiling on the stitched RGBA buffer in bytes")]
    max_bytes: u64,

    #[arg(long, default_value_t = 16384, help = "Ceiling on either output dimension in pixels")]
    max_dim: u32,

    #[arg(long, default_value_t = 95, help = "JPEG quality of the intermediate tiles (1-100)")]
    tile_quality: u8,

    #[arg(long, default_value_t = 250, help = "Milliseconds to wait after aiming at a tile")]
    settle_ms: u64,

    #[arg(long, default_value_t = 50, help = "Milliseconds to wait after snapping the camera")]
    snap_ms: u64,

    #[arg(long, default_value_t = 20, help = "Tiles between memory reclamation passes")]
    reclaim_every: u32,

    #[arg(long, value_enum, default_value_t = ResampleFilter::Lanczos3, help = "Filter for downsampled tiles")]
    filter: ResampleFilter,

    #[arg(long, help = "Capture only the current view, without tiling")]
    single: bool,

    #[arg(long, default_value_t = 60, help = "Host frames per second driving the capture")]
    fps: u32,

    #[arg(long, help = "Print a JSON summary of the capture to stdout")]
    report: bool,

    #[arg(short, long, help = "Enable debug logging")]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    initialise_tracing(args.verbose);

    let region = parse_region(&args.region)?;
    let viewport = parse_size(&args.viewport)?;
    let config = build_config(&args);
    config.validate().map_err(anyhow::Error::new)?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("capture.{}", config.output_format.extension())));

    let mut scene = ProceduralScene::new(viewport, args.density);
    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(args.fps.max(1)));
    let result: Rc<RefCell<Option<CaptureOutcome>>> = Rc::new(RefCell::new(None));
    let slot = result.clone();
    let on_complete = move |outcome: CaptureOutcome| {
        *slot.borrow_mut() = Some(outcome);
    };

    let started = Instant::now();
    let (steps, plan) = if args.single {
        let mut task = SingleFrameCapture::new(config.clone(), on_complete)?;
        let steps = driver::drive(&mut task, &mut scene, frame_interval).await;
        (steps, None)
    } else {
        let mut task = TiledCapture::builder(region)
            .with_config(config.clone())
            .on_complete(on_complete)
            .build()?;
        let steps = driver::drive(&mut task, &mut scene, frame_interval).await;
        task.release(&mut scene);
        (steps, task.plan().copied())
    };
    let elapsed = started.elapsed();

    let outcome = result
        .borrow_mut()
        .take()
        .context("capture finished without a result")?;
    let image = outcome?;
    std::fs::write(&output, &image.bytes)
        .with_context(|| format!("writing {}", output.display()))?;
    tracing::info!(path = %output.display(), size = %image.size, steps, ?elapsed, "image written");

    if args.report {
        let mut report = serde_json::json!({
            "output": output.display().to_string(),
            "format": image.format.extension(),
            "width": image.size.w,
            "height": image.size.h,
            "bytes": image.bytes.len(),
            "steps": steps,
            "elapsed_ms": elapsed.as_millis() as u64,
        });
        if let Some(plan) = plan {
            report["plan"] = serde_json::json!({
                "grid": [plan.grid.cols, plan.grid.rows],
                "requested_scale": plan.requested_scale,
                "effective_scale": plan.effective_scale,
                "downsample_factor": plan.downsample_factor,
                "tile": [plan.tile_size.w, plan.tile_size.h],
                "within_limits": plan.within_limits,
                "adjustment": plan.adjustment().map(|a| a.to_string()),
            });
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn initialise_tracing(verbose: bool) {
    let default_filter = if verbose {
        "hires_capture=debug,hicap=debug,info"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_config(args: &Args) -> CaptureConfig {
    CaptureConfig {
        requested_scale: args.scale,
        pixel_density: args.density,
        max_output_bytes: args.max_bytes,
        max_output_dimension: args.max_dim,
        tile_quality: args.tile_quality,
        output_format: match args.format {
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Jpeg => OutputFormat::Jpeg { quality: args.quality },
        },
        settle_delay: Duration::from_millis(args.settle_ms),
        post_snap_delay: Duration::from_millis(args.snap_ms),
        reclaim_interval: args.reclaim_every,
        resample_filter: args.filter,
    }
}

/// Parse "x,y,w,h" into a capture region
fn parse_region(region: &str) -> Result<CaptureRegion> {
    let parts = region
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| anyhow::anyhow!("Invalid number in region: {}", region))?;
    match parts.as_slice() {
        &[x, y, w, h] => Ok(CaptureRegion::new(x, y, w, h)),
        _ => Err(anyhow::anyhow!("Invalid region: {}. Use x,y,width,height", region)),
    }
}

/// Parse "WIDTHxHEIGHT"
fn parse_size(size: &str) -> Result<Size> {
    let (w, h) = size
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow::anyhow!("Invalid size: {}. Use WIDTHxHEIGHT", size))?;
    let w: u32 = w.trim().parse().map_err(|_| anyhow::anyhow!("Invalid width in size: {}", size))?;
    let h: u32 = h.trim().parse().map_err(|_| anyhow::anyhow!("Invalid height in size: {}", size))?;
    if w == 0 || h == 0 {
        return Err(anyhow::anyhow!("Size must be non-zero: {}", size));
    }
    Ok(Size::new(w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region() {
        let region = parse_region("10, 20,300,400").unwrap();
        assert_eq!(region, CaptureRegion::new(10.0, 20.0, 300.0, 400.0));
        assert!(parse_region("1,2,3").is_err());
        assert!(parse_region("a,b,c,d").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1920x1080").unwrap(), Size::new(1920, 1080));
        assert!(parse_size("1920").is_err());
        assert!(parse_size("0x10").is_err());
    }

    #[test]
    fn test_cli_defaults_match_library_defaults() {
        let args = Args::parse_from(["hicap"]);
        let config = build_config(&args);
        let defaults = CaptureConfig::default();
        assert_eq!(config.tile_quality, defaults.tile_quality);
        assert_eq!(config.settle_delay, defaults.settle_delay);
        assert_eq!(config.max_output_bytes, defaults.max_output_bytes);
        assert_eq!(config.output_format, OutputFormat::Png);
    }
}
