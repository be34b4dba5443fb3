use std::sync::Arc;

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::DecodeError;

/// Luma weights used everywhere brightness is measured.
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Perceived brightness of an 8-bit RGB triplet, in 0.0..=255.0
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> f32 {
    LUMA_WEIGHTS[0] * r as f32 + LUMA_WEIGHTS[1] * g as f32 + LUMA_WEIGHTS[2] * b as f32
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Decoded 8-bit pixels plus their layout.
///
/// The buffer is immutable once built. Pixel storage sits behind an `Arc`,
/// so handing a clone to another stage or thread never copies the pixels and
/// never exposes them for mutation; every operation that changes pixels
/// returns a new buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Arc<[u8]>,
}

impl ImageBuffer {
    /// Build a buffer from raw interleaved pixels.
    ///
    /// Fails with [`DecodeError::Malformed`] when a dimension is zero or
    /// when `data` does not hold exactly `width * height * channels` bytes.
    pub fn from_raw(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::Malformed(format!(
                "image dimensions must be non-zero, got {width}x{height}"
            )));
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.channels()))
            .ok_or_else(|| {
                DecodeError::Malformed(format!("image dimensions {width}x{height} overflow"))
            })?;

        if data.len() != expected {
            return Err(DecodeError::Malformed(format!(
                "expected {expected} bytes for {width}x{height} {format}, got {}",
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            format,
            data: data.into(),
        })
    }

    /// Convert a decoded `image` crate picture. Pictures with an alpha
    /// channel keep it, everything else becomes RGB.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, DecodeError> {
        let (width, height) = (image.width(), image.height());
        if image.color().has_alpha() {
            Self::from_raw(width, height, PixelFormat::Rgba8, image.into_rgba8().into_raw())
        } else {
            Self::from_raw(width, height, PixelFormat::Rgb8, image.into_rgb8().into_raw())
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels()
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// The channels of one pixel. Panics if the coordinate is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let channels = self.channels();
        let start = (y as usize * self.width as usize + x as usize) * channels;
        &self.data[start..start + channels]
    }

    /// Single-channel luminance image using [`LUMA_WEIGHTS`].
    pub fn luma8(&self) -> GrayImage {
        let channels = self.channels();
        let width = self.width as usize;
        let mut out = GrayImage::new(self.width, self.height);
        let dst: &mut [u8] = &mut out;

        dst.par_chunks_mut(width)
            .zip(self.data.par_chunks(width * channels))
            .for_each(|(dst_row, src_row)| {
                for (d, px) in dst_row.iter_mut().zip(src_row.chunks_exact(channels)) {
                    *d = luma(px[0], px[1], px[2]).round().clamp(0.0, 255.0) as u8;
                }
            });

        out
    }

    /// Copy into an `image` crate picture for encoding or resizing.
    pub fn to_dynamic(&self) -> DynamicImage {
        let data = self.data.to_vec();
        let image = match self.format {
            PixelFormat::Rgb8 => RgbImage::from_raw(self.width, self.height, data)
                .map(DynamicImage::ImageRgb8),
            PixelFormat::Rgba8 => RgbaImage::from_raw(self.width, self.height, data)
                .map(DynamicImage::ImageRgba8),
        };
        // The length invariant is checked on construction.
        image.unwrap_or_else(|| DynamicImage::new_rgb8(self.width, self.height))
    }

    /// RGB view with any alpha channel dropped.
    pub fn to_rgb8(&self) -> RgbImage {
        match self.format {
            PixelFormat::Rgb8 => RgbImage::from_raw(self.width, self.height, self.data.to_vec())
                .unwrap_or_else(|| RgbImage::new(self.width, self.height)),
            PixelFormat::Rgba8 => self.to_dynamic().into_rgb8(),
        }
    }
}
