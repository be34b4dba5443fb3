use std::cmp::Ordering;

use geo::{Area, BoundingRect, Centroid, MinimumRotatedRect};
use geo_types::{Coord, LineString, Polygon};
use crate::{error::SegmentationError, traits::RegionSelector, types::WallRegion};

/// Scores contours by `area_fraction * rectangularity` and keeps the best.
///
/// Contours enclosing less than `min_area_fraction` of the image are noise,
/// and an outline touching all four image borders is the photo itself or
/// the background wrapped around everything else.
/// Equal scores prefer the region whose centroid is closest to the image's
/// vertical centre line, since walls tend to be centred in a framed photo.
#[derive(Debug, Clone)]
pub struct RankedRegionSelector {
    pub min_area_fraction: f64,
    pub max_regions: usize,
}

impl Default for RankedRegionSelector {
    fn default() -> Self {
        Self {
            min_area_fraction: 0.02,
            max_regions: 1,
        }
    }
}

impl RankedRegionSelector {
    /// Measure a single outline. `None` for degenerate outlines.
    pub fn measure(&self, outline: Vec<[f32; 2]>, image_area: f64) -> Option<WallRegion> {
        if outline.len() < 3 {
            return None;
        }

        let coords: Vec<Coord<f64>> = outline
            .iter()
            .map(|&[x, y]| Coord { x: x as f64, y: y as f64 })
            .collect();
        let polygon = Polygon::new(LineString::new(coords), vec![]);

        let area = polygon.unsigned_area();
        if area <= 0.0 {
            return None;
        }

        let rect_area = polygon
            .minimum_rotated_rect()
            .map(|rect| rect.unsigned_area())
            .filter(|&a| a > 0.0)?;
        let rectangularity = (area / rect_area).clamp(0.0, 1.0);

        let centroid = match polygon.centroid() {
            Some(c) => [c.x() as f32, c.y() as f32],
            None => {
                let rect = polygon.bounding_rect()?;
                let center = rect.center();
                [center.x as f32, center.y as f32]
            }
        };

        Some(WallRegion {
            outline,
            area,
            rectangularity,
            centroid,
            score: (area / image_area) * rectangularity,
        })
    }
}

impl RegionSelector for RankedRegionSelector {
    fn select_regions(
        &self,
        contours: Vec<Vec<[f32; 2]>>,
        width: u32,
        height: u32,
    ) -> Result<Vec<WallRegion>, SegmentationError> {
        if self.max_regions == 0 {
            return Err(SegmentationError::InvalidConfig("max_regions must be at least 1".into()));
        }

        let image_area = width as f64 * height as f64;
        let min_area = self.min_area_fraction * image_area;
        let center_x = width as f32 / 2.0;

        let mut candidates: Vec<(usize, WallRegion)> = contours
            .into_iter()
            .filter(|outline| !spans_frame(outline, width, height))
            .filter_map(|outline| self.measure(outline, image_area))
            .filter(|region| region.area >= min_area)
            .enumerate()
            .collect();

        tracing::debug!(candidates = candidates.len(), min_area, "ranking wall candidates");

        // Quantized scores keep the ordering total so ties resolve the same
        // way on every run.
        let key = |region: &WallRegion| (region.score * 1e6).round() as i64;
        candidates.sort_by(|(ia, a), (ib, b)| {
            key(b)
                .cmp(&key(a))
                .then_with(|| {
                    let da = (a.centroid[0] - center_x).abs();
                    let db = (b.centroid[0] - center_x).abs();
                    da.partial_cmp(&db).unwrap_or(Ordering::Equal)
                })
                .then_with(|| ia.cmp(ib))
        });

        Ok(candidates
            .into_iter()
            .take(self.max_regions)
            .map(|(_, region)| region)
            .collect())
    }
}

fn spans_frame(outline: &[[f32; 2]], width: u32, height: u32) -> bool {
    let (right, bottom) = (width.saturating_sub(1) as f32, height.saturating_sub(1) as f32);
    let (mut left_hit, mut top_hit, mut right_hit, mut bottom_hit) = (false, false, false, false);
    for &[x, y] in outline {
        left_hit |= x <= 0.0;
        top_hit |= y <= 0.0;
        right_hit |= x >= right;
        bottom_hit |= y >= bottom;
    }
    left_hit && top_hit && right_hit && bottom_hit
}
