use image::GrayImage;
use crate::{error::SegmentationError, types::WallRegion};

/// Trait for single-channel image filters (smoothing, morphology)
pub trait ImagePreprocessor: Send + Sync {
    /// Filter the input image into a new one of the same size
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage, SegmentationError>;
}

/// Trait for edge detection algorithms
pub trait EdgeDetector: Send + Sync {
    /// Produce a binary edge map (`255` = edge, `0` = background)
    fn detect_edges(&self, image: &GrayImage) -> Result<GrayImage, SegmentationError>;
}

/// Trait for contour extraction algorithms
pub trait ContourExtractor: Send + Sync {
    /// Extract closed outlines from a binary image
    fn extract_contours(
        &self,
        image: &GrayImage,
    ) -> Result<Vec<Vec<[f32; 2]>>, SegmentationError>;
}

/// Trait for choosing which contours are walls
pub trait RegionSelector: Send + Sync {
    /// Filter and rank contours found in a `width` x `height` image, best first
    fn select_regions(
        &self,
        contours: Vec<Vec<[f32; 2]>>,
        width: u32,
        height: u32,
    ) -> Result<Vec<WallRegion>, SegmentationError>;
}
