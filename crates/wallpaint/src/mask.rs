use std::sync::Arc;

use image::{GrayImage, imageops::FilterType};
use rayon::prelude::*;

use crate::error::CompositeError;

/// Per-pixel wall occupancy aligned to an [`ImageBuffer`](crate::ImageBuffer).
///
/// `0.0` is not-wall, `1.0` is fully wall, anything in between is a soft
/// edge. Values are clamped on construction and never change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    values: Arc<[f32]>,
}

impl Mask {
    /// All-zero mask
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; width as usize * height as usize].into(),
        }
    }

    /// Build from raw occupancy values. Out-of-range values are clamped to
    /// `[0, 1]` and NaN becomes `0`. Returns `None` if the length does not
    /// match the dimensions.
    pub fn from_values(width: u32, height: u32, mut values: Vec<f32>) -> Option<Self> {
        if values.len() != width as usize * height as usize {
            return None;
        }
        values.par_iter_mut().for_each(|v| *v = clamp_unit(*v));
        Some(Self {
            width,
            height,
            values: values.into(),
        })
    }

    /// Interpret an 8-bit grayscale image as occupancy (`255` = full wall).
    pub fn from_luma8(image: &GrayImage) -> Self {
        let values: Vec<f32> = image.as_raw().par_iter().map(|&v| v as f32 / 255.0).collect();
        Self {
            width: image.width(),
            height: image.height(),
            values: values.into(),
        }
    }

    pub fn to_luma8(&self) -> GrayImage {
        let raw: Vec<u8> = self
            .values
            .par_iter()
            .map(|&v| (v * 255.0).round() as u8)
            .collect();
        GrayImage::from_raw(self.width, self.height, raw)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
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

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn row(&self, y: u32) -> &[f32] {
        let start = y as usize * self.width as usize;
        &self.values[start..start + self.width as usize]
    }

    /// Occupancy at `(x, y)`. Panics if out of bounds.
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.width as usize + x as usize]
    }

    /// Mean occupancy over the whole mask
    pub fn coverage(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.values.iter().map(|&v| v as f64).sum();
        (sum / self.values.len() as f64) as f32
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// Pixelwise maximum of two masks of the same size.
    pub fn union(&self, other: &Mask) -> Result<Mask, CompositeError> {
        if self.dimensions() != other.dimensions() {
            return Err(CompositeError::DimensionMismatch {
                image_width: self.width,
                image_height: self.height,
                mask_width: other.width,
                mask_height: other.height,
            });
        }
        let values: Vec<f32> = self
            .values
            .par_iter()
            .zip(other.values.par_iter())
            .map(|(&a, &b)| a.max(b))
            .collect();
        Ok(Mask {
            width: self.width,
            height: self.height,
            values: values.into(),
        })
    }

    /// Bilinear resample to a new size, used to bring a mask computed at
    /// working resolution back to the source resolution.
    pub fn resized(&self, width: u32, height: u32) -> Mask {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        let resized =
            image::imageops::resize(&self.to_luma8(), width, height, FilterType::Triangle);
        Mask::from_luma8(&resized)
    }
}

#[inline]
fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_from_values_clamps() {
        let mask = Mask::from_values(2, 2, vec![-1.0, 0.5, 2.0, f32::NAN]).unwrap();
        assert_eq!(mask.values(), &[0.0, 0.5, 1.0, 0.0]);
    }

    #[test]
    fn test_from_values_rejects_wrong_length() {
        assert!(Mask::from_values(3, 3, vec![0.0; 8]).is_none());
    }

    #[test]
    fn test_luma_conversion() {
        let mut image = GrayImage::new(2, 1);
        image.put_pixel(1, 0, Luma([255]));
        let mask = Mask::from_luma8(&image);

        assert_eq!(mask.get(0, 0), 0.0);
        assert_eq!(mask.get(1, 0), 1.0);
        assert_eq!(mask.to_luma8(), image);
    }

    #[test]
    fn test_union_takes_maximum() {
        let a = Mask::from_values(2, 1, vec![0.2, 0.9]).unwrap();
        let b = Mask::from_values(2, 1, vec![0.7, 0.1]).unwrap();
        let merged = a.union(&b).unwrap();
        assert_eq!(merged.values(), &[0.7, 0.9]);
    }

    #[test]
    fn test_union_dimension_mismatch() {
        let a = Mask::empty(2, 2);
        let b = Mask::empty(3, 2);
        assert!(matches!(a.union(&b), Err(CompositeError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_coverage_and_resize() {
        let mask = Mask::from_values(2, 2, vec![1.0, 1.0, 0.0, 0.0]).unwrap();
        assert!((mask.coverage() - 0.5).abs() < 1e-6);

        let big = mask.resized(8, 8);
        assert_eq!(big.dimensions(), (8, 8));
        assert!(big.values().iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(big.get(0, 0), 1.0);
        assert_eq!(big.get(7, 7), 0.0);
    }
}
