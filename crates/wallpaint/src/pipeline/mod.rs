pub mod builder;

use std::time::Instant;

use image::{GrayImage, imageops::FilterType};
use crate::{
    algorithms::fill_outlines,
    buffer::ImageBuffer,
    cancel::CancellationToken,
    config::SegmentationConfig,
    error::SegmentationError,
    mask::Mask,
    traits::{ContourExtractor, EdgeDetector, ImagePreprocessor, RegionSelector},
    types::WallRegion,
};

/// Wall regions found in one image, in working-resolution coordinates.
#[derive(Debug, Clone)]
pub struct DetectedWalls {
    /// Best region first
    pub regions: Vec<WallRegion>,
    /// Dimensions of the image the regions were measured on
    pub working_width: u32,
    pub working_height: u32,
}

/// Automatic wall segmentation: luminance, smoothing, edges, closing,
/// contours, ranking, rasterization.
pub struct SegmentationPipeline {
    max_working_width: Option<u32>,
    preprocessors: Vec<Box<dyn ImagePreprocessor>>,
    edge_detector: Box<dyn EdgeDetector>,
    edge_filters: Vec<Box<dyn ImagePreprocessor>>,
    contour_extractor: Box<dyn ContourExtractor>,
    region_selector: Box<dyn RegionSelector>,
    soft_edge_sigma: f32,
}

impl SegmentationPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    /// Build the standard pipeline from a validated configuration.
    pub fn from_config(config: &SegmentationConfig) -> Result<Self, SegmentationError> {
        config.validate()?;
        Ok(builder::PipelineBuilder::from_config(config).build())
    }

    pub fn new(
        max_working_width: Option<u32>,
        preprocessors: Vec<Box<dyn ImagePreprocessor>>,
        edge_detector: Box<dyn EdgeDetector>,
        edge_filters: Vec<Box<dyn ImagePreprocessor>>,
        contour_extractor: Box<dyn ContourExtractor>,
        region_selector: Box<dyn RegionSelector>,
        soft_edge_sigma: f32,
    ) -> Self {
        Self {
            max_working_width,
            preprocessors,
            edge_detector,
            edge_filters,
            contour_extractor,
            region_selector,
            soft_edge_sigma,
        }
    }

    /// Derive a wall mask with the same dimensions as `image`.
    pub fn segment(&self, image: &ImageBuffer) -> Result<Mask, SegmentationError> {
        self.segment_with_cancel(image, &CancellationToken::new())
    }

    /// Like [`segment`](Self::segment), checking `cancel` between stages.
    pub fn segment_with_cancel(
        &self,
        image: &ImageBuffer,
        cancel: &CancellationToken,
    ) -> Result<Mask, SegmentationError> {
        let detected = self.detect_regions(image, cancel)?;

        let started = Instant::now();
        let filled = fill_outlines(
            detected.regions.iter().map(|region| region.outline.as_slice()),
            detected.working_width,
            detected.working_height,
        );
        let softened = if self.soft_edge_sigma > 0.0 {
            imageproc::filter::gaussian_blur_f32(&filled, self.soft_edge_sigma)
        } else {
            filled
        };
        let mask = Mask::from_luma8(&softened).resized(image.width(), image.height());

        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            coverage = mask.coverage(),
            "rasterized wall mask"
        );
        Ok(mask)
    }

    /// Run the analysis stages and return the selected wall outlines.
    ///
    /// Fails with [`SegmentationError::NoWallFound`] when no contour survives
    /// the area filter.
    pub fn detect_regions(
        &self,
        image: &ImageBuffer,
        cancel: &CancellationToken,
    ) -> Result<DetectedWalls, SegmentationError> {
        let started = Instant::now();
        cancel.check()?;

        // Step 1: Luminance at working resolution
        let mut gray = self.working_luma(image);
        let (working_width, working_height) = gray.dimensions();

        // Step 2: Smoothing
        for preprocessor in &self.preprocessors {
            gray = preprocessor.preprocess(&gray)?;
        }
        cancel.check()?;

        // Step 3: Edge detection and gap closing
        let mut edges = self.edge_detector.detect_edges(&gray)?;
        for filter in &self.edge_filters {
            edges = filter.preprocess(&edges)?;
        }
        cancel.check()?;

        // Step 4: Contours
        let contours = self.contour_extractor.extract_contours(&edges)?;
        let contour_count = contours.len();
        cancel.check()?;

        // Step 5: Ranking
        let regions = self
            .region_selector
            .select_regions(contours, working_width, working_height)?;

        tracing::debug!(
            working_width,
            working_height,
            contours = contour_count,
            selected = regions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "wall detection finished"
        );

        if regions.is_empty() {
            return Err(SegmentationError::NoWallFound);
        }

        Ok(DetectedWalls {
            regions,
            working_width,
            working_height,
        })
    }

    fn working_luma(&self, image: &ImageBuffer) -> GrayImage {
        let gray = image.luma8();
        match self.max_working_width {
            Some(max_width) if image.width() > max_width => {
                let scale = max_width as f64 / image.width() as f64;
                let height = ((image.height() as f64 * scale).round() as u32).max(1);
                image::imageops::resize(&gray, max_width, height, FilterType::Triangle)
            }
            _ => gray,
        }
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "SegmentationPipeline: {} preprocessors, 1 edge detector, {} edge filters, \
             1 contour extractor, 1 region selector, working width {:?}",
            self.preprocessors.len(),
            self.edge_filters.len(),
            self.max_working_width,
        )
    }
}

impl Default for SegmentationPipeline {
    fn default() -> Self {
        builder::PipelineBuilder::from_config(&SegmentationConfig::default()).build()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;
    use crate::{
        algorithms::{AdaptiveBlurPreprocessor, AdaptiveCannyDetector},
        buffer::PixelFormat,
    };

    /// Runs the standard stage, then fires `token`.
    struct CancellingStage {
        token: CancellationToken,
    }

    impl ImagePreprocessor for CancellingStage {
        fn preprocess(&self, image: &GrayImage) -> Result<GrayImage, SegmentationError> {
            let out = AdaptiveBlurPreprocessor::default().preprocess(image)?;
            self.token.cancel();
            Ok(out)
        }
    }

    impl EdgeDetector for CancellingStage {
        fn detect_edges(&self, image: &GrayImage) -> Result<GrayImage, SegmentationError> {
            let edges = AdaptiveCannyDetector::default().detect_edges(image)?;
            self.token.cancel();
            Ok(edges)
        }
    }

    /// Records that a stage was reached.
    #[derive(Clone, Default)]
    struct Reached(Arc<AtomicBool>);

    impl Reached {
        fn get(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl EdgeDetector for Reached {
        fn detect_edges(&self, image: &GrayImage) -> Result<GrayImage, SegmentationError> {
            self.0.store(true, Ordering::SeqCst);
            Ok(GrayImage::new(image.width(), image.height()))
        }
    }

    impl ContourExtractor for Reached {
        fn extract_contours(
            &self,
            _image: &GrayImage,
        ) -> Result<Vec<Vec<[f32; 2]>>, SegmentationError> {
            self.0.store(true, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn framed_square(width: u32, height: u32, x0: u32, y0: u32, side: u32) -> ImageBuffer {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let inside = (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y);
                let v = if inside { 200 } else { 40 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        ImageBuffer::from_raw(width, height, PixelFormat::Rgb8, data).unwrap()
    }

    #[test]
    fn test_detects_square_region() {
        let pipeline = SegmentationPipeline::default();
        let image = framed_square(120, 90, 30, 20, 50);

        let detected = pipeline.detect_regions(&image, &CancellationToken::new()).unwrap();
        assert_eq!(detected.regions.len(), 1);

        let region = &detected.regions[0];
        assert!(region.rectangularity > 0.9, "rectangularity {}", region.rectangularity);
        assert!((region.area - 2500.0).abs() < 500.0, "area {}", region.area);
    }

    #[test]
    fn test_flat_image_has_no_wall() {
        let data = vec![128u8; 64 * 64 * 3];
        let image = ImageBuffer::from_raw(64, 64, PixelFormat::Rgb8, data).unwrap();
        let result = SegmentationPipeline::default().segment(&image);
        assert_eq!(result.unwrap_err(), SegmentationError::NoWallFound);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let image = framed_square(40, 40, 10, 10, 20);
        let result = SegmentationPipeline::default().segment_with_cancel(&image, &token);
        assert_eq!(result.unwrap_err(), SegmentationError::Cancelled);
    }

    #[test]
    fn test_cancelled_after_smoothing_skips_edges() {
        let token = CancellationToken::new();
        let edges_reached = Reached::default();
        let pipeline = SegmentationPipeline::builder()
            .add_preprocessor(CancellingStage { token: token.clone() })
            .set_edge_detector(edges_reached.clone())
            .build();

        let image = framed_square(40, 40, 10, 10, 20);
        let result = pipeline.segment_with_cancel(&image, &token);
        assert_eq!(result.unwrap_err(), SegmentationError::Cancelled);
        assert!(!edges_reached.get());
    }

    #[test]
    fn test_cancelled_after_edges_skips_contours() {
        let token = CancellationToken::new();
        let contours_reached = Reached::default();
        let pipeline = SegmentationPipeline::builder()
            .set_edge_detector(CancellingStage { token: token.clone() })
            .set_contour_extractor(contours_reached.clone())
            .build();

        let image = framed_square(40, 40, 10, 10, 20);
        let result = pipeline.segment_with_cancel(&image, &token);
        assert_eq!(result.unwrap_err(), SegmentationError::Cancelled);
        assert!(!contours_reached.get());
    }

    #[test]
    fn test_uncancelled_token_reaches_every_stage() {
        let contours_reached = Reached::default();
        let pipeline = SegmentationPipeline::builder()
            .set_contour_extractor(contours_reached.clone())
            .build();

        let image = framed_square(40, 40, 10, 10, 20);
        let result = pipeline.segment_with_cancel(&image, &CancellationToken::new());
        assert_eq!(result.unwrap_err(), SegmentationError::NoWallFound);
        assert!(contours_reached.get());
    }

    #[test]
    fn test_full_width_band_is_detected() {
        // Ceiling and floor lines run the whole width of the photo
        let mut data = Vec::with_capacity(100 * 100 * 3);
        for y in 0..100u32 {
            let v = if (20..80).contains(&y) { 180 } else { 40 };
            for _ in 0..100 {
                data.extend_from_slice(&[v, v, v]);
            }
        }
        let image = ImageBuffer::from_raw(100, 100, PixelFormat::Rgb8, data).unwrap();

        let mask = SegmentationPipeline::default().segment(&image).unwrap();
        for x in 0..100 {
            for y in 25..75 {
                assert!(mask.get(x, y) >= 0.9, "band ({x}, {y}) = {}", mask.get(x, y));
            }
            for y in (0..12).chain(88..100) {
                assert!(mask.get(x, y) <= 0.1, "outside ({x}, {y}) = {}", mask.get(x, y));
            }
        }
    }

    #[test]
    fn test_large_image_is_analysed_downscaled() {
        let pipeline = SegmentationPipeline::builder()
            .with_working_width(Some(100))
            .build();
        let image = framed_square(300, 200, 90, 50, 120);

        let detected = pipeline.detect_regions(&image, &CancellationToken::new()).unwrap();
        assert_eq!((detected.working_width, detected.working_height), (100, 67));

        let mask = pipeline.segment(&image).unwrap();
        assert_eq!(mask.dimensions(), (300, 200));
        assert!(mask.get(150, 110) > 0.9);
        assert!(mask.get(10, 10) < 0.1);
    }
}
