//! Luminance-preserving paint compositing.
//!
//! For every pixel with mask occupancy `m` and requested opacity `o`:
//!
//! ```text
//! alpha = m * o
//! L     = luma(source) / 255
//! out   = (1 - alpha) * source + alpha * target * L / L_ref
//! ```
//!
//! `L_ref` depends on the [`ShadingModel`]. Pixels with `m == 0` are copied
//! unchanged, and an alpha channel always passes through.

use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::{
    buffer::{ImageBuffer, luma},
    config::CompositeOptions,
    error::CompositeError,
    mask::Mask,
    types::Rgb,
};

/// Opacity used when a caller does not pick one
pub const DEFAULT_OPACITY: f32 = 0.7;

/// How the source shading is mapped onto the paint color.
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShadingModel {
    /// Shading relative to the painted region's mean brightness: an average
    /// pixel gets exactly the paint color, shadows and highlights keep their
    /// contrast.
    #[default]
    Normalized,
    /// Classic multiply blend: paint scaled by absolute brightness.
    Multiply,
}

/// Everything needed to paint one preview.
#[derive(Debug, Clone, Copy)]
pub struct CompositeRequest<'a> {
    pub source: &'a ImageBuffer,
    pub mask: &'a Mask,
    pub color: Rgb,
    pub opacity: f32,
}

impl<'a> CompositeRequest<'a> {
    pub fn new(source: &'a ImageBuffer, mask: &'a Mask, color: Rgb, opacity: f32) -> Self {
        Self {
            source,
            mask,
            color,
            opacity,
        }
    }

    pub fn validate(&self) -> Result<(), CompositeError> {
        if self.mask.dimensions() != self.source.dimensions() {
            return Err(CompositeError::DimensionMismatch {
                image_width: self.source.width(),
                image_height: self.source.height(),
                mask_width: self.mask.width(),
                mask_height: self.mask.height(),
            });
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(CompositeError::InvalidOpacity(self.opacity));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeResult {
    /// The painted image; never shares storage with the source
    pub image: ImageBuffer,
    /// Brightness (0..=1) that maps to the unshaded paint color
    pub reference_luma: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor {
    options: CompositeOptions,
}

impl Compositor {
    pub fn new(options: CompositeOptions) -> Self {
        Self { options }
    }

    pub fn with_shading(shading: ShadingModel) -> Self {
        Self::new(CompositeOptions { shading })
    }

    pub fn options(&self) -> CompositeOptions {
        self.options
    }

    pub fn composite(
        &self,
        request: &CompositeRequest<'_>,
    ) -> Result<CompositeResult, CompositeError> {
        request.validate()?;

        let source = request.source;
        let mask = request.mask;
        let channels = source.channels();
        let stride = source.stride();
        let width = source.width() as usize;
        let opacity = request.opacity;
        let target = request.color.channels().map(|c| c as f32);

        let reference = match self.options.shading {
            ShadingModel::Normalized => masked_mean_luma(source, mask),
            ShadingModel::Multiply => 1.0,
        };

        let mut out = vec![0u8; source.as_bytes().len()];
        out.par_chunks_mut(stride)
            .zip(source.as_bytes().par_chunks(stride))
            .zip(mask.values().par_chunks(width))
            .for_each(|((dst_row, src_row), mask_row)| {
                for ((dst, src), &m) in dst_row
                    .chunks_exact_mut(channels)
                    .zip(src_row.chunks_exact(channels))
                    .zip(mask_row)
                {
                    let alpha = m * opacity;
                    if alpha <= 0.0 {
                        dst.copy_from_slice(src);
                        continue;
                    }

                    let shade = luma(src[0], src[1], src[2]) / 255.0 / reference;
                    for c in 0..3 {
                        let blended = (1.0 - alpha) * src[c] as f32 + alpha * (target[c] * shade);
                        dst[c] = blended.round().clamp(0.0, 255.0) as u8;
                    }
                    if channels == 4 {
                        dst[3] = src[3];
                    }
                }
            });

        let image = ImageBuffer::from_raw(source.width(), source.height(), source.format(), out)
            .map_err(|_| CompositeError::DimensionMismatch {
                image_width: source.width(),
                image_height: source.height(),
                mask_width: mask.width(),
                mask_height: mask.height(),
            })?;

        tracing::debug!(
            color = %request.color,
            opacity,
            shading = %self.options.shading,
            reference_luma = reference,
            "composited paint"
        );

        Ok(CompositeResult {
            image,
            reference_luma: reference,
        })
    }
}

/// Paint `request.color` into the masked region with the default shading.
pub fn composite(request: &CompositeRequest<'_>) -> Result<CompositeResult, CompositeError> {
    Compositor::default().composite(request)
}

/// Mask-weighted mean brightness (0..=1) of the painted region.
///
/// Row sums are reduced in row order so the result does not depend on how
/// the work was split across threads.
fn masked_mean_luma(source: &ImageBuffer, mask: &Mask) -> f32 {
    let channels = source.channels();
    let width = source.width() as usize;

    let row_sums: Vec<(f64, f64)> = source
        .as_bytes()
        .par_chunks(source.stride())
        .zip(mask.values().par_chunks(width))
        .map(|(src_row, mask_row)| {
            src_row
                .chunks_exact(channels)
                .zip(mask_row)
                .filter(|&(_, &m)| m > 0.0)
                .fold((0.0, 0.0), |(weighted, weight), (px, &m)| {
                    let l = luma(px[0], px[1], px[2]) as f64 / 255.0;
                    (weighted + m as f64 * l, weight + m as f64)
                })
        })
        .collect();

    let (weighted, weight) = row_sums
        .iter()
        .fold((0.0, 0.0), |(a, b), &(w, m)| (a + w, b + m));

    if weight <= 0.0 {
        return 1.0;
    }
    ((weighted / weight) as f32).max(1.0 / 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelFormat;

    const RED: Rgb = Rgb::new(200, 50, 50);

    fn gradient_image(width: u32, height: u32) -> ImageBuffer {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[
                    (x * 255 / width.max(1)) as u8,
                    (y * 255 / height.max(1)) as u8,
                    ((x + y) * 7 % 256) as u8,
                ]);
            }
        }
        ImageBuffer::from_raw(width, height, PixelFormat::Rgb8, data).unwrap()
    }

    fn half_mask(width: u32, height: u32) -> Mask {
        let values = (0..width * height)
            .map(|i| if i % width < width / 2 { 0.0 } else { 0.8 })
            .collect();
        Mask::from_values(width, height, values).unwrap()
    }

    #[test]
    fn test_zero_opacity_is_identity() {
        let image = gradient_image(17, 9);
        let mask = Mask::from_values(17, 9, vec![1.0; 17 * 9]).unwrap();
        let result = composite(&CompositeRequest::new(&image, &mask, RED, 0.0)).unwrap();
        assert_eq!(result.image, image);
    }

    #[test]
    fn test_unmasked_pixels_are_untouched() {
        let image = gradient_image(20, 10);
        let mask = half_mask(20, 10);
        for shading in [ShadingModel::Normalized, ShadingModel::Multiply] {
            let result = Compositor::with_shading(shading)
                .composite(&CompositeRequest::new(&image, &mask, RED, 1.0))
                .unwrap();
            for y in 0..10 {
                for x in 0..10 {
                    assert_eq!(result.image.pixel(x, y), image.pixel(x, y));
                }
            }
        }
    }

    #[test]
    fn test_full_occupancy_depends_only_on_luminance() {
        let data = vec![
            200, 10, 10, //
            10, 10, 200, //
            90, 90, 90, //
            255, 255, 255,
        ];
        let image = ImageBuffer::from_raw(4, 1, PixelFormat::Rgb8, data).unwrap();
        let mask = Mask::from_values(4, 1, vec![1.0; 4]).unwrap();
        let result = Compositor::with_shading(ShadingModel::Multiply)
            .composite(&CompositeRequest::new(&image, &mask, RED, 1.0))
            .unwrap();

        for x in 0..4 {
            let src = image.pixel(x, 0);
            let l = luma(src[0], src[1], src[2]) / 255.0;
            let out = result.image.pixel(x, 0);
            for (c, &t) in RED.channels().iter().enumerate() {
                let expected = (t as f32 * l).round().clamp(0.0, 255.0);
                assert!((out[c] as f32 - expected).abs() <= 1.0, "pixel {x} channel {c}");
            }
        }
    }

    #[test]
    fn test_normalized_average_pixel_gets_exact_color() {
        let image = ImageBuffer::from_raw(3, 3, PixelFormat::Rgb8, vec![128; 27]).unwrap();
        let mask = Mask::from_values(3, 3, vec![1.0; 9]).unwrap();
        let result = composite(&CompositeRequest::new(&image, &mask, RED, 1.0)).unwrap();

        assert!((result.reference_luma - 128.0 / 255.0).abs() < 1e-3);
        assert_eq!(result.image.pixel(1, 1), &[200, 50, 50]);
    }

    #[test]
    fn test_shading_order_is_preserved() {
        let data = vec![60, 60, 60, 120, 120, 120, 180, 180, 180];
        let image = ImageBuffer::from_raw(3, 1, PixelFormat::Rgb8, data).unwrap();
        let mask = Mask::from_values(3, 1, vec![1.0; 3]).unwrap();
        let result = composite(&CompositeRequest::new(&image, &mask, RED, 1.0)).unwrap();

        let brightness: Vec<f32> = (0..3)
            .map(|x| {
                let p = result.image.pixel(x, 0);
                luma(p[0], p[1], p[2])
            })
            .collect();
        assert!(brightness[0] < brightness[1] && brightness[1] < brightness[2]);
    }

    #[test]
    fn test_alpha_channel_passes_through() {
        let data = vec![100, 100, 100, 17, 100, 100, 100, 250];
        let image = ImageBuffer::from_raw(2, 1, PixelFormat::Rgba8, data).unwrap();
        let mask = Mask::from_values(2, 1, vec![1.0, 1.0]).unwrap();
        let result = composite(&CompositeRequest::new(&image, &mask, RED, 0.5)).unwrap();

        assert_eq!(result.image.format(), PixelFormat::Rgba8);
        assert_eq!(result.image.pixel(0, 0)[3], 17);
        assert_eq!(result.image.pixel(1, 0)[3], 250);
    }

    #[test]
    fn test_result_does_not_alias_source() {
        let image = gradient_image(4, 4);
        let mask = Mask::empty(4, 4);
        let result = composite(&CompositeRequest::new(&image, &mask, RED, 1.0)).unwrap();
        assert_eq!(result.image, image);
        assert!(!std::ptr::eq(result.image.as_bytes().as_ptr(), image.as_bytes().as_ptr()));
    }

    #[test]
    fn test_request_validation() {
        let image = gradient_image(4, 4);
        let mask = Mask::empty(5, 4);
        assert!(matches!(
            composite(&CompositeRequest::new(&image, &mask, RED, 0.5)),
            Err(CompositeError::DimensionMismatch { mask_width: 5, .. })
        ));

        let mask = Mask::empty(4, 4);
        for opacity in [-0.1, 1.5, f32::NAN] {
            assert!(matches!(
                composite(&CompositeRequest::new(&image, &mask, RED, opacity)),
                Err(CompositeError::InvalidOpacity(_))
            ));
        }
    }

    #[test]
    fn test_parallel_result_is_deterministic() {
        let image = gradient_image(64, 48);
        let mask = half_mask(64, 48);
        let request = CompositeRequest::new(&image, &mask, Rgb::new(30, 140, 220), 0.7);
        let first = composite(&request).unwrap();
        let second = composite(&request).unwrap();
        assert_eq!(first, second);
    }
}
