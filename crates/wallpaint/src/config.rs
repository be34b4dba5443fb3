use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{compositor::ShadingModel, error::SegmentationError};

/// Tunables for automatic wall segmentation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Analyse a downscaled copy when the photo is wider than this
    pub max_working_width: Option<u32>,
    /// Smoothing sigma is `max(1, min(width, height) / blur_divisor)`
    #[schemars(range(min = 1.0))]
    pub blur_divisor: f32,
    /// Fixed smoothing sigma, overriding the adaptive one
    pub blur_sigma: Option<f32>,
    /// Gradient-magnitude percentile used as the high hysteresis threshold
    #[schemars(range(min = 0.0, max = 1.0))]
    pub high_percentile: f32,
    /// Low threshold as a fraction of the high one
    #[schemars(range(min = 0.0, max = 1.0))]
    pub low_ratio: f32,
    /// The high threshold never drops below this fraction of the strongest gradient
    #[schemars(range(min = 0.0, max = 1.0))]
    pub high_floor_ratio: f32,
    /// Radius of the square structuring element used to close edge gaps
    pub closing_radius: u8,
    /// Contours enclosing less than this fraction of the image are noise
    #[schemars(range(min = 0.0, max = 1.0))]
    pub min_area_fraction: f64,
    /// How many of the best-ranked regions become wall
    #[schemars(range(min = 1))]
    pub max_regions: usize,
    /// Blur applied to the hard-edged mask; `0` keeps hard edges
    #[schemars(range(min = 0.0))]
    pub soft_edge_sigma: f32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_working_width: Some(800),
            blur_divisor: 200.0,
            blur_sigma: None,
            high_percentile: 0.9,
            low_ratio: 0.5,
            high_floor_ratio: 0.2,
            closing_radius: 2,
            min_area_fraction: 0.02,
            max_regions: 1,
            soft_edge_sigma: 1.0,
        }
    }
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<(), SegmentationError> {
        let invalid = |msg: String| Err(SegmentationError::InvalidConfig(msg));

        if self.max_working_width == Some(0) {
            return invalid("max_working_width must be positive".into());
        }
        if !(self.blur_divisor.is_finite() && self.blur_divisor > 0.0) {
            return invalid(format!("blur_divisor must be positive, got {}", self.blur_divisor));
        }
        if let Some(sigma) = self.blur_sigma {
            if !(sigma.is_finite() && sigma > 0.0) {
                return invalid(format!("blur_sigma must be positive, got {sigma}"));
            }
        }
        if !(0.0..=1.0).contains(&self.high_percentile) {
            return invalid(format!(
                "high_percentile must be in [0, 1], got {}",
                self.high_percentile
            ));
        }
        if !(self.low_ratio > 0.0 && self.low_ratio <= 1.0) {
            return invalid(format!("low_ratio must be in (0, 1], got {}", self.low_ratio));
        }
        if !(0.0..=1.0).contains(&self.high_floor_ratio) {
            return invalid(format!(
                "high_floor_ratio must be in [0, 1], got {}",
                self.high_floor_ratio
            ));
        }
        if !(0.0..=1.0).contains(&self.min_area_fraction) {
            return invalid(format!(
                "min_area_fraction must be in [0, 1], got {}",
                self.min_area_fraction
            ));
        }
        if self.max_regions == 0 {
            return invalid("max_regions must be at least 1".into());
        }
        if !(self.soft_edge_sigma.is_finite() && self.soft_edge_sigma >= 0.0) {
            return invalid(format!("soft_edge_sigma must be >= 0, got {}", self.soft_edge_sigma));
        }
        Ok(())
    }
}

/// Tunables for color compositing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct CompositeOptions {
    pub shading: ShadingModel,
}
