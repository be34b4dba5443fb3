use image::{GrayImage, Luma};
use crate::{error::SegmentationError, traits::ContourExtractor};

/// Imageproc-based contour extractor returning both outer and hole borders.
///
/// A closed ring of edges yields its outer outline and the outline of the
/// area it encloses. The hole outline stays clean when background clutter
/// attaches to the outside of the ring.
///
/// With `close_frame` the outermost pixels are treated as edge, so regions
/// cut off by the photo's own border (a wall between ceiling and floor lines
/// running the full width) are closed too.
#[derive(Debug, Clone)]
pub struct ImageprocContourExtractor {
    pub close_frame: bool,
}

impl Default for ImageprocContourExtractor {
    fn default() -> Self {
        Self { close_frame: true }
    }
}

impl ContourExtractor for ImageprocContourExtractor {
    fn extract_contours(
        &self,
        binary_image: &GrayImage,
    ) -> Result<Vec<Vec<[f32; 2]>>, SegmentationError> {
        let contours = if self.close_frame {
            imageproc::contours::find_contours::<i32>(&with_frame(binary_image))
        } else {
            imageproc::contours::find_contours::<i32>(binary_image)
        };

        let result = contours
            .into_iter()
            .map(|contour| {
                contour.points
                    .iter()
                    .map(|p| [p.x as f32, p.y as f32])
                    .collect()
            })
            .collect();

        Ok(result)
    }
}

fn with_frame(image: &GrayImage) -> GrayImage {
    let mut framed = image.clone();
    let (width, height) = framed.dimensions();
    if width == 0 || height == 0 {
        return framed;
    }
    for x in 0..width {
        framed.put_pixel(x, 0, Luma([255]));
        framed.put_pixel(x, height - 1, Luma([255]));
    }
    for y in 0..height {
        framed.put_pixel(0, y, Luma([255]));
        framed.put_pixel(width - 1, y, Luma([255]));
    }
    framed
}
