//! Byte-level boundary: compressed photo bytes in, compressed preview out.

use image::{
    ExtendedColorType, ImageEncoder,
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::{
    buffer::{ImageBuffer, PixelFormat},
    error::{DecodeError, EncodeError},
};

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EncodeFormat {
    /// Lossless; quality is ignored
    #[default]
    Png,
    /// Lossy; any alpha channel is dropped
    #[strum(to_string = "jpeg", serialize = "jpg")]
    Jpeg,
}

impl EncodeFormat {
    /// Pick a format from a file extension such as `png` or `JPG`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        ext.parse().ok()
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// Decode JPEG or PNG bytes.
///
/// Grayscale sources come back as RGB, sources with transparency as RGBA.
pub fn decode(bytes: &[u8]) -> Result<ImageBuffer, DecodeError> {
    let image = image::load_from_memory(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::Malformed(format!(
            "image has zero dimension {}x{}",
            image.width(),
            image.height()
        )));
    }
    let buffer = ImageBuffer::from_dynamic(image)?;
    tracing::debug!(
        width = buffer.width(),
        height = buffer.height(),
        format = %buffer.format(),
        "decoded image"
    );
    Ok(buffer)
}

/// Encode `image` as `format`. `quality` (1..=100) only affects JPEG.
pub fn encode(
    image: &ImageBuffer,
    format: EncodeFormat,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    match format {
        EncodeFormat::Png => {
            let color = match image.format() {
                PixelFormat::Rgb8 => ExtendedColorType::Rgb8,
                PixelFormat::Rgba8 => ExtendedColorType::Rgba8,
            };
            PngEncoder::new(&mut out).write_image(
                image.as_bytes(),
                image.width(),
                image.height(),
                color,
            )?;
        }
        EncodeFormat::Jpeg => {
            if !(1..=100).contains(&quality) {
                return Err(EncodeError::InvalidQuality(quality));
            }
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut out, quality).write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            )?;
        }
    }
    tracing::debug!(%format, quality, bytes = out.len(), "encoded image");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smooth_image(width: u32, height: u32) -> ImageBuffer {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[
                    (80 + x) as u8,
                    (60 + y) as u8,
                    120,
                ]);
            }
        }
        ImageBuffer::from_raw(width, height, PixelFormat::Rgb8, data).unwrap()
    }

    #[test]
    fn test_png_round_trip_is_exact() {
        let image = smooth_image(32, 24);
        let bytes = encode(&image, EncodeFormat::Png, 0).unwrap();
        assert_eq!(decode(&bytes).unwrap(), image);
    }

    #[test]
    fn test_png_keeps_alpha() {
        let data = vec![10, 20, 30, 40, 50, 60, 70, 255];
        let image = ImageBuffer::from_raw(2, 1, PixelFormat::Rgba8, data).unwrap();
        let decoded = decode(&encode(&image, EncodeFormat::Png, 90).unwrap()).unwrap();
        assert_eq!(decoded.format(), PixelFormat::Rgba8);
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_jpeg_round_trip_within_tolerance() {
        let image = smooth_image(32, 32);
        let bytes = encode(&image, EncodeFormat::Jpeg, 95).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.dimensions(), image.dimensions());
        assert_eq!(decoded.format(), PixelFormat::Rgb8);
        let max_diff = image
            .as_bytes()
            .iter()
            .zip(decoded.as_bytes())
            .map(|(&a, &b)| (a as i16 - b as i16).abs())
            .max()
            .unwrap();
        assert!(max_diff <= 10, "max channel difference {max_diff}");
    }

    #[test]
    fn test_jpeg_quality_is_validated() {
        let image = smooth_image(4, 4);
        assert!(matches!(
            encode(&image, EncodeFormat::Jpeg, 0),
            Err(EncodeError::InvalidQuality(0))
        ));
        assert!(matches!(
            encode(&image, EncodeFormat::Jpeg, 101),
            Err(EncodeError::InvalidQuality(101))
        ));
    }

    #[test]
    fn test_malformed_bytes() {
        let bytes = encode(&smooth_image(8, 8), EncodeFormat::Png, 0).unwrap();
        assert!(matches!(decode(&bytes[..bytes.len() / 2]), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(b"not an image"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_format_names() {
        assert_eq!(EncodeFormat::from_extension("JPG"), Some(EncodeFormat::Jpeg));
        assert_eq!(EncodeFormat::from_extension("png"), Some(EncodeFormat::Png));
        assert_eq!(EncodeFormat::from_extension("gif"), None);
        assert_eq!(EncodeFormat::Jpeg.to_string(), "jpeg");
    }
}
