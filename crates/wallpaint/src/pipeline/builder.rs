use crate::{
    pipeline::SegmentationPipeline,
    traits::{ContourExtractor, EdgeDetector, ImagePreprocessor, RegionSelector},
    config::SegmentationConfig,
    algorithms::{
        AdaptiveBlurPreprocessor,
        AdaptiveCannyDetector,
        ClosingPreprocessor,
        GaussianBlurPreprocessor,
        ImageprocContourExtractor,
        RankedRegionSelector,
    },
};

/// Builder for creating segmentation pipelines with a fluent API
pub struct PipelineBuilder {
    max_working_width: Option<u32>,
    preprocessors: Vec<Box<dyn ImagePreprocessor>>,
    edge_detector: Option<Box<dyn EdgeDetector>>,
    edge_filters: Vec<Box<dyn ImagePreprocessor>>,
    contour_extractor: Option<Box<dyn ContourExtractor>>,
    region_selector: Option<Box<dyn RegionSelector>>,
    soft_edge_sigma: f32,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            max_working_width: None,
            preprocessors: Vec::new(),
            edge_detector: None,
            edge_filters: Vec::new(),
            contour_extractor: None,
            region_selector: None,
            soft_edge_sigma: 0.0,
        }
    }

    /// Standard stages, parameterised by `config`. Does not validate.
    pub fn from_config(config: &SegmentationConfig) -> Self {
        let builder = Self::new()
            .with_working_width(config.max_working_width)
            .set_edge_detector(AdaptiveCannyDetector {
                high_percentile: config.high_percentile,
                low_ratio: config.low_ratio,
                high_floor_ratio: config.high_floor_ratio,
            })
            .add_edge_filter(ClosingPreprocessor { radius: config.closing_radius })
            .set_region_selector(RankedRegionSelector {
                min_area_fraction: config.min_area_fraction,
                max_regions: config.max_regions,
            })
            .with_soft_edges(config.soft_edge_sigma);

        match config.blur_sigma {
            Some(sigma) => builder.add_preprocessor(GaussianBlurPreprocessor { sigma }),
            None => builder.add_preprocessor(AdaptiveBlurPreprocessor {
                divisor: config.blur_divisor,
            }),
        }
    }

    /// Analyse a downscaled copy of images wider than `width`
    pub fn with_working_width(mut self, width: Option<u32>) -> Self {
        self.max_working_width = width;
        self
    }

    /// Add a smoothing step applied to the luminance image
    pub fn add_preprocessor<P>(mut self, preprocessor: P) -> Self
    where
        P: ImagePreprocessor + 'static,
    {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    /// Set the edge detector (replaces any existing one)
    pub fn set_edge_detector<D>(mut self, detector: D) -> Self
    where
        D: EdgeDetector + 'static,
    {
        self.edge_detector = Some(Box::new(detector));
        self
    }

    /// Add a filter applied to the binary edge map
    pub fn add_edge_filter<F>(mut self, filter: F) -> Self
    where
        F: ImagePreprocessor + 'static,
    {
        self.edge_filters.push(Box::new(filter));
        self
    }

    /// Set the contour extractor (replaces any existing one)
    pub fn set_contour_extractor<E>(mut self, extractor: E) -> Self
    where
        E: ContourExtractor + 'static,
    {
        self.contour_extractor = Some(Box::new(extractor));
        self
    }

    /// Set the region selector (replaces any existing one)
    pub fn set_region_selector<S>(mut self, selector: S) -> Self
    where
        S: RegionSelector + 'static,
    {
        self.region_selector = Some(Box::new(selector));
        self
    }

    /// Blur the rasterized mask by `sigma` for antialiased edges; `0` disables
    pub fn with_soft_edges(mut self, sigma: f32) -> Self {
        self.soft_edge_sigma = sigma;
        self
    }

    /// Build the pipeline with default components if not specified
    pub fn build(self) -> SegmentationPipeline {
        let preprocessors = if self.preprocessors.is_empty() {
            vec![Box::new(AdaptiveBlurPreprocessor::default()) as Box<dyn ImagePreprocessor>]
        } else {
            self.preprocessors
        };

        let edge_filters = if self.edge_filters.is_empty() {
            vec![Box::new(ClosingPreprocessor::default()) as Box<dyn ImagePreprocessor>]
        } else {
            self.edge_filters
        };

        let edge_detector = self.edge_detector
            .unwrap_or_else(|| Box::new(AdaptiveCannyDetector::default()));

        let contour_extractor = self.contour_extractor
            .unwrap_or_else(|| Box::new(ImageprocContourExtractor::default()));

        let region_selector = self.region_selector
            .unwrap_or_else(|| Box::new(RankedRegionSelector::default()));

        SegmentationPipeline::new(
            self.max_working_width,
            preprocessors,
            edge_detector,
            edge_filters,
            contour_extractor,
            region_selector,
            self.soft_edge_sigma,
        )
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
