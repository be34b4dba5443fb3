use image::{GrayImage, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use rayon::prelude::*;
use crate::{error::SegmentationError, traits::EdgeDetector};

/// Canny-style edge detector whose hysteresis thresholds come from the
/// image's own gradient-magnitude histogram, so the same settings work for
/// dim and bright exposures.
///
/// `high = max(percentile(high_percentile), high_floor_ratio * max, 1)` and
/// `low = high * low_ratio`.
#[derive(Debug, Clone)]
pub struct AdaptiveCannyDetector {
    pub high_percentile: f32,
    pub low_ratio: f32,
    pub high_floor_ratio: f32,
}

impl Default for AdaptiveCannyDetector {
    fn default() -> Self {
        Self {
            high_percentile: 0.9,
            low_ratio: 0.5,
            high_floor_ratio: 0.2,
        }
    }
}

impl AdaptiveCannyDetector {
    /// Returns `(low, high)` for the given gradient magnitudes.
    pub fn hysteresis_thresholds(&self, magnitudes: &[f32]) -> (f32, f32) {
        let max = magnitudes.iter().copied().fold(0.0f32, f32::max);
        let percentile = histogram_percentile(magnitudes, max, self.high_percentile);
        let high = percentile.max(self.high_floor_ratio * max).max(1.0);
        (high * self.low_ratio, high)
    }

    fn validate(&self) -> Result<(), SegmentationError> {
        if !(0.0..=1.0).contains(&self.high_percentile) {
            return Err(SegmentationError::InvalidConfig(format!(
                "high_percentile must be in [0, 1], got {}",
                self.high_percentile
            )));
        }
        if !(self.low_ratio > 0.0 && self.low_ratio <= 1.0) {
            return Err(SegmentationError::InvalidConfig(format!(
                "low_ratio must be in (0, 1], got {}",
                self.low_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.high_floor_ratio) {
            return Err(SegmentationError::InvalidConfig(format!(
                "high_floor_ratio must be in [0, 1], got {}",
                self.high_floor_ratio
            )));
        }
        Ok(())
    }
}

impl EdgeDetector for AdaptiveCannyDetector {
    fn detect_edges(&self, image: &GrayImage) -> Result<GrayImage, SegmentationError> {
        self.validate()?;

        let (width, height) = image.dimensions();
        if width < 3 || height < 3 {
            return Ok(GrayImage::new(width, height));
        }
        let (w, h) = (width as usize, height as usize);

        let gx = horizontal_sobel(image);
        let gy = vertical_sobel(image);
        let (gx, gy) = (gx.as_raw(), gy.as_raw());

        let magnitudes: Vec<f32> = gx
            .par_iter()
            .zip(gy.par_iter())
            .map(|(&x, &y)| (x as f32).hypot(y as f32))
            .collect();

        let (low, high) = self.hysteresis_thresholds(&magnitudes);
        tracing::debug!(low, high, "edge thresholds");

        // Non-maximum suppression: keep pixels that are ridges across the
        // gradient direction. Border pixels never become edges.
        let mut ridges = vec![0.0f32; w * h];
        ridges
            .par_chunks_mut(w)
            .enumerate()
            .skip(1)
            .take(h - 2)
            .for_each(|(y, row)| {
                for x in 1..w - 1 {
                    let i = y * w + x;
                    let m = magnitudes[i];
                    if m < low {
                        continue;
                    }
                    let (a, b) = match direction_sector(gx[i], gy[i]) {
                        Sector::Horizontal => (i - 1, i + 1),
                        Sector::Vertical => (i - w, i + w),
                        Sector::Diagonal => (i - w - 1, i + w + 1),
                        Sector::AntiDiagonal => (i - w + 1, i + w - 1),
                    };
                    if m >= magnitudes[a] && m >= magnitudes[b] {
                        row[x] = m;
                    }
                }
            });

        // Hysteresis: grow strong edges through 8-connected weak pixels.
        let mut edges = GrayImage::new(width, height);
        let mut visited = vec![false; w * h];
        let mut stack: Vec<usize> = ridges
            .iter()
            .enumerate()
            .filter(|&(_, &m)| m >= high)
            .map(|(i, _)| i)
            .collect();
        for &i in &stack {
            visited[i] = true;
        }

        while let Some(i) = stack.pop() {
            let (x, y) = (i % w, i / w);
            edges.put_pixel(x as u32, y as u32, Luma([255]));

            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if !visited[n] && ridges[n] >= low && ridges[n] > 0.0 {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        Ok(edges)
    }
}

enum Sector {
    Horizontal,
    Vertical,
    Diagonal,
    AntiDiagonal,
}

/// Quantize the gradient direction into one of four neighbour axes.
fn direction_sector(gx: i16, gy: i16) -> Sector {
    let mut angle = (gy as f32).atan2(gx as f32).to_degrees();
    if angle < 0.0 {
        angle += 180.0;
    }
    if !(22.5..157.5).contains(&angle) {
        Sector::Horizontal
    } else if angle < 67.5 {
        Sector::Diagonal
    } else if angle < 112.5 {
        Sector::Vertical
    } else {
        Sector::AntiDiagonal
    }
}

/// Value below which `fraction` of the magnitudes fall, using unit-width bins.
fn histogram_percentile(magnitudes: &[f32], max: f32, fraction: f32) -> f32 {
    if magnitudes.is_empty() || max <= 0.0 {
        return 0.0;
    }
    let bins = max.ceil() as usize + 1;
    let mut histogram = vec![0usize; bins];
    for &m in magnitudes {
        histogram[(m.floor() as usize).min(bins - 1)] += 1;
    }

    let target = ((fraction as f64) * magnitudes.len() as f64).ceil().max(1.0) as usize;
    let mut seen = 0;
    for (value, &count) in histogram.iter().enumerate() {
        seen += count;
        if seen >= target {
            return value as f32;
        }
    }
    max
}
