//! Manual wall painting: rasterizes user strokes into a [`Mask`].

use rayon::prelude::*;

use crate::{
    algorithms::point_segment_distance,
    error::StrokeError,
    mask::Mask,
    types::Stroke,
};

/// One capsule of a stroke footprint: a segment swept by a disk.
struct Capsule {
    a: [f32; 2],
    b: [f32; 2],
    radius: f32,
    min_y: f32,
    max_y: f32,
}

impl Capsule {
    fn new(a: [f32; 2], b: [f32; 2], radius: f32) -> Self {
        Self {
            a,
            b,
            radius,
            min_y: a[1].min(b[1]) - radius - 1.0,
            max_y: a[1].max(b[1]) + radius + 1.0,
        }
    }
}

/// Rasterize `strokes` into a `width` x `height` mask.
///
/// Each stroke covers its polyline widened by a disk of radius `width / 2`,
/// with a one pixel antialiased rim. Pixel centres sit at `(x + 0.5, y + 0.5)`.
/// Overlapping strokes combine by maximum, so repainting never exceeds full
/// occupancy. Malformed strokes are skipped; an empty list gives an empty mask.
pub fn build_mask(strokes: &[Stroke], width: u32, height: u32) -> Mask {
    let capsules: Vec<Capsule> = strokes
        .iter()
        .filter(|stroke| match stroke.validate() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "skipping malformed stroke");
                false
            }
        })
        .flat_map(|stroke| {
            let radius = stroke.radius();
            let points = &stroke.points;
            let pairs: Vec<Capsule> = if points.len() == 1 {
                vec![Capsule::new(points[0], points[0], radius)]
            } else {
                points
                    .windows(2)
                    .map(|pair| Capsule::new(pair[0], pair[1], radius))
                    .collect()
            };
            pairs
        })
        .collect();

    let w = width as usize;
    let mut values = vec![0.0f32; w * height as usize];
    if w == 0 || capsules.is_empty() {
        return Mask::from_values(width, height, values)
            .unwrap_or_else(|| Mask::empty(width, height));
    }

    values.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        let cy = y as f32 + 0.5;
        for capsule in capsules.iter().filter(|c| c.min_y <= cy && cy <= c.max_y) {
            let reach = capsule.radius + 1.0;
            let x_lo = (capsule.a[0].min(capsule.b[0]) - reach).floor().max(0.0) as usize;
            let x_hi = (capsule.a[0].max(capsule.b[0]) + reach).ceil();
            if x_hi < 0.0 {
                continue;
            }
            let x_hi = (x_hi as usize).min(w - 1);

            for x in x_lo..=x_hi {
                let d = point_segment_distance([x as f32 + 0.5, cy], capsule.a, capsule.b);
                let coverage = (capsule.radius + 0.5 - d).clamp(0.0, 1.0);
                if coverage > row[x] {
                    row[x] = coverage;
                }
            }
        }
    });

    Mask::from_values(width, height, values).unwrap_or_else(|| Mask::empty(width, height))
}

/// Accumulates the strokes of a manual painting session.
///
/// Every accepted stroke publishes a newly derived mask; masks handed out
/// earlier are never touched.
#[derive(Debug, Clone)]
pub struct MaskBuilder {
    width: u32,
    height: u32,
    strokes: Vec<Stroke>,
    current: Mask,
}

impl MaskBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            strokes: Vec::new(),
            current: Mask::empty(width, height),
        }
    }

    /// Validate and append a stroke, returning the updated mask.
    pub fn add_stroke(&mut self, stroke: Stroke) -> Result<&Mask, StrokeError> {
        stroke.validate()?;
        let footprint = build_mask(std::slice::from_ref(&stroke), self.width, self.height);
        // Same dimensions by construction, so the union cannot fail.
        self.current = self.current.union(&footprint).unwrap_or(footprint);
        self.strokes.push(stroke);
        Ok(&self.current)
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn mask(&self) -> &Mask {
        &self.current
    }

    /// Drop all strokes and start from an empty mask.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.current = Mask::empty(self.width, self.height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(points: &[[f32; 2]], width: f32) -> Stroke {
        Stroke::new(points.to_vec(), width).unwrap()
    }

    #[test]
    fn test_empty_strokes_give_empty_mask() {
        let mask = build_mask(&[], 16, 8);
        assert_eq!(mask.dimensions(), (16, 8));
        assert!(mask.is_empty());
    }

    #[test]
    fn test_horizontal_stroke_footprint() {
        let mask = build_mask(&[stroke(&[[5.0, 10.0], [25.0, 10.0]], 6.0)], 32, 20);

        assert_eq!(mask.get(15, 9), 1.0);
        assert_eq!(mask.get(15, 7), 1.0);
        assert_eq!(mask.get(15, 15), 0.0);
        assert_eq!(mask.get(31, 9), 0.0);
        // Round cap reaches past the last point
        assert_eq!(mask.get(26, 9), 1.0);
    }

    #[test]
    fn test_single_point_is_a_disk() {
        let mask = build_mask(&[stroke(&[[10.0, 10.0]], 8.0)], 20, 20);
        assert_eq!(mask.get(9, 9), 1.0);
        assert_eq!(mask.get(9, 12), 1.0);
        assert_eq!(mask.get(9, 16), 0.0);
        assert_eq!(mask.get(15, 15), 0.0);
    }

    #[test]
    fn test_overlap_never_exceeds_one() {
        let a = stroke(&[[0.0, 5.0], [20.0, 5.0]], 4.0);
        let mask = build_mask(&[a.clone(), a.clone(), a], 20, 10);
        assert!(mask.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_adding_strokes_never_decreases_occupancy() {
        let a = vec![stroke(&[[2.0, 2.0], [30.0, 20.0]], 5.0)];
        let mut both = a.clone();
        both.push(stroke(&[[30.0, 2.0], [2.0, 20.0]], 3.0));

        let mask_a = build_mask(&a, 32, 24);
        let mask_ab = build_mask(&both, 32, 24);
        for (x, y) in mask_a.values().iter().zip(mask_ab.values()) {
            assert!(y >= x);
        }
    }

    #[test]
    fn test_malformed_strokes_are_skipped() {
        let bad = Stroke { points: vec![], width: 4.0 };
        let mask = build_mask(&[bad], 8, 8);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_builder_matches_batch() {
        let strokes = vec![
            stroke(&[[1.0, 1.0], [10.0, 10.0]], 3.0),
            stroke(&[[12.0, 2.0]], 5.0),
        ];
        let mut builder = MaskBuilder::new(16, 16);
        let first = builder.add_stroke(strokes[0].clone()).unwrap().clone();
        builder.add_stroke(strokes[1].clone()).unwrap();

        assert_eq!(builder.strokes().len(), 2);
        assert_eq!(builder.mask(), &build_mask(&strokes, 16, 16));
        // The first published mask is unchanged.
        assert_eq!(first, build_mask(&strokes[..1], 16, 16));

        assert!(builder.add_stroke(Stroke { points: vec![[0.0, 0.0]], width: -1.0 }).is_err());
        builder.clear();
        assert!(builder.mask().is_empty());
    }
}
