//! # Tiled High-Resolution Capture
//!
//! Renders a world-space region larger than one device frame as a grid of
//! tiles, keeps each tile JPEG-compressed, then stitches and encodes them.
//!
//! ## Phases
//!
//! ```text
//!   Plan ──▶ Capture(tile 0..n) ──▶ StitchStart ──▶ Stitch(tile 0..n) ──▶ Encode ──▶ Finished
//!              │ per tile:
//!              └─ Aim ─▶ Snap ─▶ FrameEnd ─▶ Render
//! ```
//!
//! - **Plan**: size the grid from the host viewport and fit the output into
//!   the configured ceilings, degrading scale first, then per-tile size.
//! - **Aim**: move the camera target to the tile centre, wait `settle_delay`.
//! - **Snap**: switch to instantaneous movement, wait `post_snap_delay`.
//! - **FrameEnd**: yield so the host runs one frame boundary.
//! - **Render**: restore the previous movement mode, check out the offscreen
//!   target, render, read back, compress.
//!
//! Peak memory is one readback buffer plus the compressed tiles while
//! capturing, and the output buffer plus the not-yet-composited tiles while
//! stitching. The offscreen target is freed before the output is allocated.

use std::mem;

use tile_scale::cpu::{aspect_matches, pack_rgb};
use tile_scale::grid::{tile_world_extent, TileCoord};
use tile_scale::plan::{build_plan, PlanRequest, ResolutionPlan, Size, Vec2};

use crate::capture::{CaptureHost, CaptureRegion, Movement};
use crate::codec::{FinalEncoder, ImageEncoder, JpegTileCodec, TileCodec};
use crate::config::CaptureConfig;
use crate::core::buffer_pool::BufferPool;
use crate::core::render_target::OffscreenTarget;
use crate::error::CaptureError;
use crate::notify::{Notice, StatusSink, TracingSink};
use crate::processing::{OutputBuffer, Stitcher, Tile};
use crate::task::{CaptureOutcome, CaptureTask, Completion, CompletionCallback, Progress, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileStage {
    Aim,
    Snap,
    FrameEnd,
    Render,
}

enum Phase {
    Plan,
    Capture { index: u32, stage: TileStage },
    StitchStart,
    Stitch(Box<Stitcher>),
    Encode(OutputBuffer),
    Finished,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Plan => "planning",
            Phase::Capture { .. } => "tile capture",
            Phase::StitchStart | Phase::Stitch(_) => "stitching",
            Phase::Encode(_) => "encoding",
            Phase::Finished => "finished",
        }
    }
}

/// A multi-tile capture driven one step at a time.
///
/// Build one with [`TiledCapture::builder`] or [`fn@crate::capture`].
pub struct TiledCapture {
    region: CaptureRegion,
    config: CaptureConfig,
    tile_codec: Box<dyn TileCodec>,
    encoder: Box<dyn FinalEncoder>,
    sink: Box<dyn StatusSink>,
    completion: Completion,
    phase: Phase,
    plan: Option<ResolutionPlan>,
    tile_extent: Vec2,
    target: Option<OffscreenTarget>,
    pool: BufferPool,
    rgb: Vec<u8>,
    tiles: Vec<Tile>,
    captured: u32,
    stitched: bool,
    saved_movement: Option<Movement>,
}

impl TiledCapture {
    pub fn builder(region: CaptureRegion) -> TiledCaptureBuilder {
        TiledCaptureBuilder::new(region)
    }

    pub fn region(&self) -> CaptureRegion {
        self.region
    }

    /// The resolution plan, once the first step has run.
    pub fn plan(&self) -> Option<&ResolutionPlan> {
        self.plan.as_ref()
    }

    pub fn tiles_captured(&self) -> u32 {
        self.captured
    }

    /// Compressed tile bytes currently held, whether waiting for or inside
    /// the stitcher.
    pub fn retained_tile_bytes(&self) -> usize {
        let pending: usize = self.tiles.iter().map(|t| t.bytes.len()).sum();
        match &self.phase {
            Phase::Stitch(stitcher) => pending + stitcher.retained_tile_bytes(),
            _ => pending,
        }
    }

    /// True while an offscreen surface is held.
    pub fn holds_render_target(&self) -> bool {
        self.target.is_some()
    }

    fn advance(&mut self, phase: Phase, host: &mut dyn CaptureHost) -> Result<(Phase, Step), CaptureError> {
        match phase {
            Phase::Plan => {
                self.start(host)?;
                Ok((Phase::Capture { index: 0, stage: TileStage::Aim }, Step::Ready))
            }
            Phase::Capture { index, stage } => self.capture_stage(host, index, stage),
            Phase::StitchStart => {
                let plan = self.require_plan()?;
                let output = OutputBuffer::allocate(plan.output_size, host.available_memory())?;
                let tiles = mem::take(&mut self.tiles);
                tracing::debug!(tiles = tiles.len(), output = %plan.output_size, "stitching");
                let stitcher = Stitcher::new(&plan, tiles, output, self.config.resample_filter);
                Ok((Phase::Stitch(Box::new(stitcher)), Step::Ready))
            }
            Phase::Stitch(mut stitcher) => {
                stitcher.composite_next(self.tile_codec.as_ref())?;
                if stitcher.remaining() == 0 {
                    self.stitched = true;
                    return Ok((Phase::Encode(stitcher.finish()), Step::Ready));
                }
                if stitcher.composited() % self.config.reclaim_interval == 0 {
                    stitcher.trim();
                    host.reclaim_memory();
                    return Ok((Phase::Stitch(stitcher), Step::Yield));
                }
                Ok((Phase::Stitch(stitcher), Step::Ready))
            }
            Phase::Encode(output) => {
                let image = self
                    .encoder
                    .encode(output.as_slice(), output.size())
                    .map_err(|e| e.with_operation("encode output"))?;
                drop(output);
                tracing::info!(
                    size = %image.size,
                    bytes = image.bytes.len(),
                    format = image.format.extension(),
                    "tiled capture complete"
                );
                self.sink.notify(Notice::info(format!(
                    "Captured {} image ({} bytes)",
                    image.size,
                    image.bytes.len()
                )));
                self.completion.deliver(Ok(image));
                Ok((Phase::Finished, Step::Done))
            }
            Phase::Finished => Ok((Phase::Finished, Step::Done)),
        }
    }

    fn start(&mut self, host: &mut dyn CaptureHost) -> Result<(), CaptureError> {
        let device = host.viewport_size();
        let region = self.region.size;
        let plan = build_plan(&PlanRequest {
            region_size: region,
            requested_scale: self.config.requested_scale,
            device_tile: device,
            pixel_density: self.config.pixel_density,
            limits: self.config.limits(),
        })
        .map_err(|e| {
            CaptureError::config("region", format!("{}x{}", region.x, region.y), e.to_string())
                .with_operation("plan capture")
                .with_recovery_suggestion("Capture a smaller region")
        })?;
        tracing::info!(
            cols = plan.grid.cols,
            rows = plan.grid.rows,
            scale = plan.effective_scale,
            downsample = plan.downsample_factor,
            tile = %plan.tile_size,
            output = %plan.output_size,
            within_limits = plan.within_limits,
            "resolution plan"
        );
        self.plan = Some(plan);
        if !plan.within_limits {
            // The ceilings bound the output buffer; nothing is captured past them.
            return Err(CaptureError::allocation(
                "output buffer",
                plan.output_bytes(),
                format!(
                    "{} output exceeds the configured ceilings ({} bytes, {} px per axis) even at the pixel floor",
                    plan.output_size, self.config.max_output_bytes, self.config.max_output_dimension
                ),
            )
            .with_operation("plan capture")
            .with_recovery_suggestion("Capture a smaller region or raise the output limits"));
        }
        if let Some(adjustment) = plan.adjustment() {
            self.sink
                .notify(Notice::info(format!("Capture adjusted: {}", adjustment)));
        }
        if !aspect_matches(plan.render_size, plan.tile_size) {
            self.sink.notify(Notice::warning(format!(
                "Tiles clamped to {} at the pixel floor; the output is stretched",
                plan.tile_size
            )));
        }

        self.target = Some(OffscreenTarget::create(&mut *host, plan.render_size)?);
        self.pool.resize(plan.render_size.rgba_len());
        self.tile_extent = tile_world_extent(
            Size::new(device.w.max(1), device.h.max(1)),
            self.config.pixel_density,
        );
        self.tiles = Vec::with_capacity(plan.tile_count() as usize);
        Ok(())
    }

    fn capture_stage(
        &mut self,
        host: &mut dyn CaptureHost,
        index: u32,
        stage: TileStage,
    ) -> Result<(Phase, Step), CaptureError> {
        let plan = self.require_plan()?;
        let coord = plan.grid.serpentine_coord(index).ok_or_else(|| {
            CaptureError::processing("tile capture", format!("tile index {} outside grid", index))
        })?;
        let center = coord.world_center(self.region.position, self.tile_extent);

        match stage {
            TileStage::Aim => {
                host.set_target(center);
                tracing::debug!(index, col = coord.col, row = coord.row, x = center.x, y = center.y, "aiming at tile");
                Ok((Phase::Capture { index, stage: TileStage::Snap }, Step::Wait(self.config.settle_delay)))
            }
            TileStage::Snap => {
                self.saved_movement = Some(host.movement());
                host.set_movement(Movement::Instant);
                host.set_target(center);
                Ok((
                    Phase::Capture { index, stage: TileStage::FrameEnd },
                    Step::Wait(self.config.post_snap_delay),
                ))
            }
            TileStage::FrameEnd => Ok((Phase::Capture { index, stage: TileStage::Render }, Step::Yield)),
            TileStage::Render => {
                self.restore_movement(host);
                self.capture_tile(host, &plan, coord)?;
                self.captured += 1;

                let next = index + 1;
                if next == plan.tile_count() {
                    self.release_render_resources(host);
                    tracing::info!(tiles = self.captured, bytes = self.retained_tile_bytes(), "tile capture finished");
                    self.sink.notify(Notice::info(format!(
                        "Captured {} tiles, stitching {} output",
                        self.captured, plan.output_size
                    )));
                    return Ok((Phase::StitchStart, Step::Ready));
                }
                let phase = Phase::Capture { index: next, stage: TileStage::Aim };
                if self.captured % self.config.reclaim_interval == 0 {
                    let freed = self.pool.trim();
                    host.reclaim_memory();
                    tracing::debug!(captured = self.captured, freed, "reclaiming tile loop memory");
                    return Ok((phase, Step::Yield));
                }
                Ok((phase, Step::Ready))
            }
        }
    }

    fn capture_tile(
        &mut self,
        host: &mut dyn CaptureHost,
        plan: &ResolutionPlan,
        coord: TileCoord,
    ) -> Result<(), CaptureError> {
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| CaptureError::render("capture tile", "offscreen target already released"))?;
        let mut rgba = self.pool.get_buffer()?;
        let read = {
            let mut checkout = target.checkout(&mut *host);
            checkout.render().and_then(|()| checkout.read_pixels(&mut rgba))
        };
        if let Err(e) = read {
            self.pool.return_buffer(rgba);
            return Err(e.with_context(format!("tile ({}, {})", coord.col, coord.row)));
        }
        pack_rgb(&rgba, &mut self.rgb);
        self.pool.return_buffer(rgba);

        let bytes = self
            .tile_codec
            .encode(&self.rgb, plan.render_size)
            .map_err(|e| e.with_operation("encode tile"))?;
        tracing::trace!(col = coord.col, row = coord.row, bytes = bytes.len(), "tile stored");
        self.tiles.push(Tile { coord, bytes });
        Ok(())
    }

    fn require_plan(&self) -> Result<ResolutionPlan, CaptureError> {
        self.plan
            .ok_or_else(|| CaptureError::processing("tiled capture", "no resolution plan"))
    }

    fn restore_movement(&mut self, host: &mut dyn CaptureHost) {
        if let Some(movement) = self.saved_movement.take() {
            host.set_movement(movement);
        }
    }

    fn release_render_resources(&mut self, host: &mut dyn CaptureHost) {
        if let Some(target) = self.target.take() {
            target.release(&mut *host);
        }
        self.pool.trim();
        self.rgb = Vec::new();
    }

    fn release_all(&mut self, host: &mut dyn CaptureHost) {
        self.restore_movement(host);
        self.release_render_resources(host);
        self.tiles = Vec::new();
    }

    fn fail(&mut self, host: &mut dyn CaptureHost, error: CaptureError) {
        tracing::error!(category = error.category(), %error, "tiled capture failed");
        self.sink.notify(Notice::error(format!("Capture failed: {}", error)));
        self.release_all(host);
        self.phase = Phase::Finished;
        self.completion.deliver(Err(error));
    }
}

impl CaptureTask for TiledCapture {
    fn progress_steps(&self) -> Option<Progress> {
        let plan = self.plan.as_ref()?;
        Some(Progress::new(
            self.captured + u32::from(self.stitched),
            plan.tile_count() + 1,
        ))
    }

    fn can_pause_simulation(&self) -> bool {
        true
    }

    fn step(&mut self, host: &mut dyn CaptureHost) -> Step {
        let phase = mem::replace(&mut self.phase, Phase::Finished);
        if matches!(phase, Phase::Finished) {
            return Step::Done;
        }
        match self.advance(phase, host) {
            Ok((next, step)) => {
                self.phase = next;
                step
            }
            Err(error) => {
                self.fail(host, error);
                Step::Done
            }
        }
    }

    fn release(&mut self, host: &mut dyn CaptureHost) {
        let phase = mem::replace(&mut self.phase, Phase::Finished);
        let name = phase.name();
        drop(phase);
        self.release_all(host);
        if !self.completion.is_delivered() {
            tracing::info!(phase = name, "tiled capture released before completion");
            self.sink.notify(Notice::info(format!("Capture cancelled during {}", name)));
            self.completion.deliver(Err(CaptureError::cancelled(name)));
        }
    }

    fn is_finished(&self) -> bool {
        self.completion.is_delivered()
    }
}

/// Builder for [`TiledCapture`].
///
/// Codec and encoder default to the ones `config` describes; notices go to
/// `tracing` unless a sink is supplied.
pub struct TiledCaptureBuilder {
    region: CaptureRegion,
    config: CaptureConfig,
    tile_codec: Option<Box<dyn TileCodec>>,
    encoder: Option<Box<dyn FinalEncoder>>,
    sink: Option<Box<dyn StatusSink>>,
    on_complete: Option<CompletionCallback>,
}

impl TiledCaptureBuilder {
    pub fn new(region: CaptureRegion) -> Self {
        Self {
            region,
            config: CaptureConfig::default(),
            tile_codec: None,
            encoder: None,
            sink: None,
            on_complete: None,
        }
    }

    pub fn with_config(mut self, config: CaptureConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tile_codec<C: TileCodec + 'static>(mut self, codec: C) -> Self {
        self.tile_codec = Some(Box::new(codec));
        self
    }

    pub fn with_encoder<E: FinalEncoder + 'static>(mut self, encoder: E) -> Self {
        self.encoder = Some(Box::new(encoder));
        self
    }

    pub fn with_status_sink<S: StatusSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn on_complete<F: FnOnce(CaptureOutcome) + 'static>(mut self, callback: F) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> Result<TiledCapture, CaptureError> {
        self.config.validate()?;
        validate_region(&self.region)?;

        let config = self.config;
        Ok(TiledCapture {
            region: self.region,
            tile_codec: self
                .tile_codec
                .unwrap_or_else(|| Box::new(JpegTileCodec::new(config.tile_quality))),
            encoder: self
                .encoder
                .unwrap_or_else(|| Box::new(ImageEncoder::new(config.output_format))),
            sink: self.sink.unwrap_or_else(|| Box::new(TracingSink)),
            completion: Completion::new(
                self.on_complete
                    .unwrap_or_else(|| Box::new(|_: CaptureOutcome| {})),
            ),
            phase: Phase::Plan,
            plan: None,
            tile_extent: Vec2::default(),
            target: None,
            pool: BufferPool::new(0, 1),
            rgb: Vec::new(),
            tiles: Vec::new(),
            captured: 0,
            stitched: false,
            saved_movement: None,
            config,
        })
    }
}

pub(crate) fn validate_region(region: &CaptureRegion) -> Result<(), CaptureError> {
    let CaptureRegion { position, size } = *region;
    let finite = [position.x, position.y, size.x, size.y].iter().all(|v| v.is_finite());
    if !finite || size.x <= 0.0 || size.y <= 0.0 {
        return Err(CaptureError::config(
            "region",
            format!("{}x{} at ({}, {})", size.x, size.y, position.x, position.y),
            "must have a finite position and a positive size",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::scene::ProceduralScene;
    use crate::capture::ViewpointController;
    use std::time::Duration;

    fn scene() -> ProceduralScene {
        ProceduralScene::new(Size::new(16, 8), 1.0)
    }

    #[test]
    fn test_builder_rejects_degenerate_region() {
        let err = TiledCapture::builder(CaptureRegion::new(0.0, 0.0, 0.0, 10.0))
            .build()
            .err()
            .map(|e| e.category());
        assert_eq!(err, Some("config"));

        let err = TiledCapture::builder(CaptureRegion::new(f32::NAN, 0.0, 5.0, 5.0)).build();
        assert!(err.is_err());
    }

    #[test]
    fn test_first_tile_stage_sequence() {
        let mut host = scene();
        let config = CaptureConfig {
            settle_delay: Duration::from_millis(7),
            post_snap_delay: Duration::from_millis(3),
            ..CaptureConfig::default()
        };
        let mut task = TiledCapture::builder(CaptureRegion::new(0.0, 0.0, 32.0, 8.0))
            .with_config(config)
            .build()
            .unwrap();

        assert!(task.progress_steps().is_none());
        assert_eq!(task.step(&mut host), Step::Ready);
        assert!(task.holds_render_target());
        assert_eq!(task.progress_steps(), Some(Progress::new(0, 3)));

        assert_eq!(task.step(&mut host), Step::Wait(Duration::from_millis(7)));
        assert_eq!(task.step(&mut host), Step::Wait(Duration::from_millis(3)));
        assert_eq!(host.movement(), Movement::Instant);
        assert_eq!(task.step(&mut host), Step::Yield);
        assert_eq!(task.step(&mut host), Step::Ready);
        assert_eq!(host.movement(), Movement::Smooth);
        assert_eq!(task.tiles_captured(), 1);
        assert!(task.retained_tile_bytes() > 0);

        task.release(&mut host);
        assert_eq!(host.live_surfaces(), 0);
        assert_eq!(task.retained_tile_bytes(), 0);
        assert!(task.is_finished());
    }
}
