// SPDX-License-Identifier: MIT
// CPU resampling built on fast_image_resize (SIMD-accelerated) plus the
// row-wise packing and blit helpers the stitcher needs.
// Tiles travel as tightly packed RGB8; the stitched canvas is RGBA8.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x3;
use fir::{FilterType, ResizeAlg, ResizeOptions, Resizer};

use crate::plan::Size;

#[derive(Debug)]
pub enum ScaleError {
    BufferTooSmall { needed: usize, got: usize },
    OutOfBounds { x: u32, y: u32, tile: Size, canvas: Size },
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::BufferTooSmall { needed, got } => {
                write!(f, "Buffer too small: need {} bytes, got {}", needed, got)
            }
            ScaleError::OutOfBounds { x, y, tile, canvas } => {
                write!(f, "Tile {} at ({}, {}) does not fit canvas {}", tile, x, y, canvas)
            }
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

/// Convolution filter used for the single resampling pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ResampleFilter {
    Bilinear,
    CatmullRom,
    Mitchell,
    #[default]
    Lanczos3,
}

impl ResampleFilter {
    fn alg(self) -> ResizeAlg {
        let filter = match self {
            ResampleFilter::Bilinear => FilterType::Bilinear,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Mitchell => FilterType::Mitchell,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        };
        ResizeAlg::Convolution(filter)
    }
}

/// Reusable scratch for a tightly packed RGB8 tile.
pub struct Staging {
    pub(crate) buf: Vec<u8>,
}
impl Staging {
    pub fn with_capacity(cap: usize) -> Self { Self { buf: Vec::with_capacity(cap) } }
    pub fn ensure_len(&mut self, len: usize) { if self.buf.len() < len { self.buf.resize(len, 0); } }
    pub fn as_slice(&self) -> &[u8] { &self.buf }
    pub fn as_mut_slice(&mut self) -> &mut [u8] { &mut self.buf }
    /// Drops the backing allocation.
    pub fn release(&mut self) { self.buf = Vec::new(); }
    pub fn capacity(&self) -> usize { self.buf.capacity() }
}

/// True when `a` and `b` share an aspect ratio up to integer-division rounding.
pub fn aspect_matches(a: Size, b: Size) -> bool {
    let lhs = u64::from(a.w) * u64::from(b.h);
    let rhs = u64::from(b.w) * u64::from(a.h);
    lhs.abs_diff(rhs) <= u64::from(a.w.max(a.h))
}

/// Resample an RGB8 image to exactly `dst_size` in one convolution pass.
/// `dst` must hold at least `dst_size.rgb_len()` bytes.
pub fn resize_rgb_exact(
    resizer: &mut Resizer,
    src_rgb: &[u8],
    src_size: Size,
    dst_size: Size,
    filter: ResampleFilter,
    dst: &mut [u8],
) -> Result<(), ScaleError> {
    let dst_len = dst_size.rgb_len();
    if dst.len() < dst_len {
        return Err(ScaleError::BufferTooSmall { needed: dst_len, got: dst.len() });
    }
    let src_view = TypedImageRef::<U8x3>::from_buffer(src_size.w, src_size.h, src_rgb)?;
    let mut dst_image = TypedImage::<U8x3>::from_buffer(dst_size.w, dst_size.h, &mut dst[..dst_len])?;
    let opts = ResizeOptions::new().resize_alg(filter.alg());
    resizer.resize_typed::<U8x3>(&src_view, &mut dst_image, &opts)?;
    Ok(())
}

/// Drop the alpha channel of a tightly packed RGBA8 buffer into `dst_rgb`.
pub fn pack_rgb(src_rgba: &[u8], dst_rgb: &mut Vec<u8>) {
    dst_rgb.clear();
    dst_rgb.reserve(src_rgba.len() / 4 * 3);
    for px in src_rgba.chunks_exact(4) {
        dst_rgb.extend_from_slice(&px[..3]);
    }
}

/// Copy an RGB8 tile into an RGBA8 canvas at pixel `(x, y)`, forcing alpha to 255.
pub fn blit_rgb_opaque(
    canvas: &mut [u8],
    canvas_size: Size,
    tile_rgb: &[u8],
    tile_size: Size,
    x: u32,
    y: u32,
) -> Result<(), ScaleError> {
    let fits = u64::from(x) + u64::from(tile_size.w) <= u64::from(canvas_size.w)
        && u64::from(y) + u64::from(tile_size.h) <= u64::from(canvas_size.h);
    if !fits {
        return Err(ScaleError::OutOfBounds { x, y, tile: tile_size, canvas: canvas_size });
    }
    if canvas.len() < canvas_size.rgba_len() {
        return Err(ScaleError::BufferTooSmall { needed: canvas_size.rgba_len(), got: canvas.len() });
    }
    if tile_rgb.len() < tile_size.rgb_len() {
        return Err(ScaleError::BufferTooSmall { needed: tile_size.rgb_len(), got: tile_rgb.len() });
    }

    let src_row = tile_size.w as usize * 3;
    let dst_pitch = canvas_size.w as usize * 4;
    for r in 0..tile_size.h as usize {
        let s = &tile_rgb[r * src_row..(r + 1) * src_row];
        let row_off = (y as usize + r) * dst_pitch + x as usize * 4;
        let d = &mut canvas[row_off..row_off + tile_size.w as usize * 4];
        for (dp, sp) in d.chunks_exact_mut(4).zip(s.chunks_exact(3)) {
            dp[..3].copy_from_slice(sp);
            dp[3] = 255;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_rgb(size: Size, rgb: [u8; 3]) -> Vec<u8> {
        rgb.iter().copied().cycle().take(size.rgb_len()).collect()
    }

    #[test]
    fn test_pack_rgb_strips_alpha() {
        let rgba = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut rgb = Vec::new();
        pack_rgb(&rgba, &mut rgb);
        assert_eq!(rgb, vec![1, 2, 3, 5, 6, 7]);
    }

    #[test]
    fn test_blit_places_tile_and_forces_alpha() {
        let canvas_size = Size::new(4, 4);
        let mut canvas = vec![0u8; canvas_size.rgba_len()];
        let tile = Size::new(2, 2);
        blit_rgb_opaque(&mut canvas, canvas_size, &solid_rgb(tile, [9, 8, 7]), tile, 2, 2).unwrap();

        for y in 0..4usize {
            for x in 0..4usize {
                let px = &canvas[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
                if x >= 2 && y >= 2 {
                    assert_eq!(px, &[9, 8, 7, 255]);
                } else {
                    assert_eq!(px, &[0, 0, 0, 0]);
                }
            }
        }
    }

    #[test]
    fn test_blit_rejects_out_of_bounds() {
        let canvas_size = Size::new(4, 4);
        let mut canvas = vec![0u8; canvas_size.rgba_len()];
        let tile = Size::new(2, 2);
        let err = blit_rgb_opaque(&mut canvas, canvas_size, &solid_rgb(tile, [1, 1, 1]), tile, 3, 0);
        assert!(matches!(err, Err(ScaleError::OutOfBounds { .. })));
    }

    #[test]
    fn test_resize_solid_color_is_preserved() {
        let src = Size::new(64, 36);
        let dst = Size::new(16, 9);
        let mut out = vec![0u8; dst.rgb_len()];
        let mut resizer = Resizer::new();
        resize_rgb_exact(&mut resizer, &solid_rgb(src, [200, 100, 50]), src, dst, ResampleFilter::Lanczos3, &mut out)
            .unwrap();
        for px in out.chunks_exact(3) {
            assert!(px[0].abs_diff(200) <= 1 && px[1].abs_diff(100) <= 1 && px[2].abs_diff(50) <= 1);
        }
    }

    #[test]
    fn test_resize_rejects_short_destination() {
        let src = Size::new(8, 8);
        let mut out = vec![0u8; 10];
        let err = resize_rgb_exact(&mut Resizer::new(), &solid_rgb(src, [0, 0, 0]), src, Size::new(4, 4), ResampleFilter::Bilinear, &mut out);
        assert!(matches!(err, Err(ScaleError::BufferTooSmall { needed: 48, got: 10 })));
    }

    #[test]
    fn test_aspect_matches_tolerates_rounding_only() {
        assert!(aspect_matches(Size::new(1920, 1080), Size::new(640, 360)));
        assert!(aspect_matches(Size::new(1920, 1080), Size::new(274, 154)));
        assert!(!aspect_matches(Size::new(1920, 1080), Size::new(64, 64)));
    }
}
