//! # Tile and Output Codecs
//!
//! Two codec seams, both backed by the `image` crate:
//!
//! - [`TileCodec`]: lossy intermediate storage for captured tiles. Tiles are
//!   kept compressed between capture and stitching purely to bound memory; the
//!   bytes never leave the capture.
//! - [`FinalEncoder`]: turns the stitched RGBA buffer into the delivered file.
//!
//! ```rust
//! use hires_capture::codec::{FinalEncoder, ImageEncoder};
//! use hires_capture::config::OutputFormat;
//! use tile_scale::plan::Size;
//!
//! let rgba = vec![255u8; 4 * 4 * 4];
//! let png = ImageEncoder::new(OutputFormat::Png)
//!     .encode(&rgba, Size::new(4, 4))
//!     .unwrap();
//! assert!(png.bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
//! ```

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder as _, ImageFormat};
use tile_scale::cpu::pack_rgb;
use tile_scale::plan::Size;

use crate::config::OutputFormat;
use crate::error::CaptureError;

/// Encoded bytes handed to the completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub size: Size,
    pub format: OutputFormat,
}

/// A decoded tile: tightly packed RGB8.
#[derive(Debug, Clone)]
pub struct DecodedTile {
    pub rgb: Vec<u8>,
    pub size: Size,
}

/// Compact intermediate form for one tile.
pub trait TileCodec {
    fn encode(&self, rgb: &[u8], size: Size) -> Result<Vec<u8>, CaptureError>;

    fn decode(&self, bytes: &[u8]) -> Result<DecodedTile, CaptureError>;
}

/// Encodes the composited RGBA buffer into the delivered byte sequence.
pub trait FinalEncoder {
    fn encode(&self, rgba: &[u8], size: Size) -> Result<EncodedImage, CaptureError>;
}

/// Baseline JPEG tiles.
#[derive(Debug, Clone, Copy)]
pub struct JpegTileCodec {
    quality: u8,
}

impl JpegTileCodec {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for JpegTileCodec {
    fn default() -> Self {
        Self::new(95)
    }
}

impl TileCodec for JpegTileCodec {
    fn encode(&self, rgb: &[u8], size: Size) -> Result<Vec<u8>, CaptureError> {
        check_len("jpeg tile", rgb.len(), size.rgb_len(), size)?;
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality).write_image(
            rgb,
            size.w,
            size.h,
            ExtendedColorType::Rgb8,
        )?;
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedTile, CaptureError> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?.into_rgb8();
        let size = Size::new(image.width(), image.height());
        Ok(DecodedTile {
            rgb: image.into_raw(),
            size,
        })
    }
}

/// [`FinalEncoder`] for the formats in [`OutputFormat`].
#[derive(Debug, Clone, Copy)]
pub struct ImageEncoder {
    format: OutputFormat,
}

impl ImageEncoder {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl FinalEncoder for ImageEncoder {
    fn encode(&self, rgba: &[u8], size: Size) -> Result<EncodedImage, CaptureError> {
        check_len("final image", rgba.len(), size.rgba_len(), size)?;
        let mut bytes = Vec::new();
        match self.format {
            OutputFormat::Png => {
                PngEncoder::new(&mut bytes).write_image(
                    rgba,
                    size.w,
                    size.h,
                    ExtendedColorType::Rgba8,
                )?;
            }
            OutputFormat::Jpeg { quality } => {
                // JPEG carries no alpha channel.
                let mut rgb = Vec::new();
                pack_rgb(rgba, &mut rgb);
                JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).write_image(
                    &rgb,
                    size.w,
                    size.h,
                    ExtendedColorType::Rgb8,
                )?;
            }
        }
        Ok(EncodedImage {
            bytes,
            size,
            format: self.format,
        })
    }
}

fn check_len(what: &str, got: usize, needed: usize, size: Size) -> Result<(), CaptureError> {
    if size.is_empty() {
        return Err(CaptureError::codec(what, format!("cannot encode an empty {} image", size)));
    }
    if got != needed {
        return Err(CaptureError::codec(
            what,
            format!("{} image needs {} bytes, got {}", size, needed, got),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_rgb(size: Size) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(size.rgb_len());
        for y in 0..size.h {
            for x in 0..size.w {
                rgb.extend_from_slice(&[(x * 8) as u8, (y * 8) as u8, 128]);
            }
        }
        rgb
    }

    #[test]
    fn test_jpeg_tile_keeps_dimensions_and_colour() {
        let size = Size::new(32, 16);
        let codec = JpegTileCodec::default();
        let bytes = codec.encode(&gradient_rgb(size), size).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.size, size);
        assert_eq!(decoded.rgb.len(), size.rgb_len());
        let original = gradient_rgb(size);
        let max_err = original
            .iter()
            .zip(&decoded.rgb)
            .map(|(a, b)| a.abs_diff(*b))
            .max()
            .unwrap_or(0);
        assert!(max_err < 24, "max channel error {max_err}");
    }

    #[test]
    fn test_tile_encode_rejects_wrong_length() {
        let err = JpegTileCodec::default()
            .encode(&[0u8; 10], Size::new(4, 4))
            .unwrap_err();
        assert_eq!(err.category(), "codec");
    }

    #[test]
    fn test_tile_decode_rejects_garbage() {
        let err = JpegTileCodec::default().decode(b"not a jpeg").unwrap_err();
        assert_eq!(err.category(), "codec");
    }

    #[test]
    fn test_final_encoder_signatures() {
        let size = Size::new(8, 8);
        let rgba = vec![200u8; size.rgba_len()];

        let png = ImageEncoder::new(OutputFormat::Png).encode(&rgba, size).unwrap();
        assert!(png.bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
        assert_eq!(png.size, size);

        let jpeg = ImageEncoder::new(OutputFormat::Jpeg { quality: 90 })
            .encode(&rgba, size)
            .unwrap();
        assert_eq!(&jpeg.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(jpeg.format, OutputFormat::Jpeg { quality: 90 });
    }

    #[test]
    fn test_final_encoder_rejects_empty_image() {
        let err = ImageEncoder::new(OutputFormat::Png)
            .encode(&[], Size::new(0, 4))
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
