use image::GrayImage;
use imageproc::distance_transform::Norm;
use crate::{error::SegmentationError, traits::ImagePreprocessor};

/// Gaussian blur with a fixed sigma
#[derive(Debug, Clone)]
pub struct GaussianBlurPreprocessor {
    pub sigma: f32,
}

impl Default for GaussianBlurPreprocessor {
    fn default() -> Self {
        Self { sigma: 1.0 }
    }
}

impl ImagePreprocessor for GaussianBlurPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage, SegmentationError> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(SegmentationError::InvalidConfig(format!(
                "blur sigma must be positive, got {}",
                self.sigma
            )));
        }
        Ok(imageproc::filter::gaussian_blur_f32(image, self.sigma))
    }
}

/// Gaussian blur whose radius grows with the image:
/// `sigma = max(1, min(width, height) / divisor)`.
#[derive(Debug, Clone)]
pub struct AdaptiveBlurPreprocessor {
    pub divisor: f32,
}

impl Default for AdaptiveBlurPreprocessor {
    fn default() -> Self {
        Self { divisor: 200.0 }
    }
}

impl AdaptiveBlurPreprocessor {
    pub fn sigma_for(&self, width: u32, height: u32) -> f32 {
        let short_side = width.min(height) as f32;
        (short_side / self.divisor).floor().max(1.0)
    }
}

impl ImagePreprocessor for AdaptiveBlurPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage, SegmentationError> {
        if !(self.divisor.is_finite() && self.divisor > 0.0) {
            return Err(SegmentationError::InvalidConfig(format!(
                "blur divisor must be positive, got {}",
                self.divisor
            )));
        }
        let sigma = self.sigma_for(image.width(), image.height());
        tracing::debug!(sigma, "smoothing luminance");
        Ok(imageproc::filter::gaussian_blur_f32(image, sigma))
    }
}

/// Morphological closing (dilate then erode) of a binary image with a square
/// structuring element of the given radius. Bridges small gaps between edges.
#[derive(Debug, Clone)]
pub struct ClosingPreprocessor {
    pub radius: u8,
}

impl Default for ClosingPreprocessor {
    fn default() -> Self {
        Self { radius: 2 }
    }
}

impl ImagePreprocessor for ClosingPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage, SegmentationError> {
        if self.radius == 0 {
            return Ok(image.clone());
        }
        Ok(imageproc::morphology::close(image, Norm::LInf, self.radius))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_adaptive_sigma() {
        let blur = AdaptiveBlurPreprocessor::default();
        assert_eq!(blur.sigma_for(100, 100), 1.0);
        assert_eq!(blur.sigma_for(1920, 1080), 5.0);
        assert_eq!(blur.sigma_for(4000, 3000), 15.0);
    }

    #[test]
    fn test_closing_bridges_gap() {
        let mut image = GrayImage::new(30, 11);
        for x in 5..25 {
            if x != 14 && x != 15 {
                image.put_pixel(x, 5, Luma([255]));
            }
        }
        let closed = ClosingPreprocessor { radius: 2 }.preprocess(&image).unwrap();
        assert_eq!(closed.get_pixel(14, 5).0[0], 255);
        assert_eq!(closed.get_pixel(15, 5).0[0], 255);
        assert_eq!(closed.get_pixel(15, 0).0[0], 0);
    }

    #[test]
    fn test_invalid_sigma_is_rejected() {
        let image = GrayImage::new(4, 4);
        let result = GaussianBlurPreprocessor { sigma: 0.0 }.preprocess(&image);
        assert!(matches!(result, Err(SegmentationError::InvalidConfig(_))));
    }
}
