use image::GrayImage;
use rayon::prelude::*;

/// Fill closed outlines into a binary image (`255` inside).
///
/// Vertices are pixel coordinates as produced by contour tracing. Interiors
/// are filled with an even-odd scanline rule (half-open in y, so shared
/// vertices are counted once) and the outline edges themselves are drawn, so
/// the traced border is always part of the region.
pub fn fill_outlines<'a, I>(outlines: I, width: u32, height: u32) -> GrayImage
where
    I: IntoIterator<Item = &'a [[f32; 2]]>,
{
    let outlines: Vec<&[[f32; 2]]> = outlines.into_iter().filter(|o| !o.is_empty()).collect();
    let mut image = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return image;
    }
    let w = width as usize;

    let buf: &mut [u8] = &mut image;
    buf.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        let scan_y = y as f32;
        let mut crossings = Vec::new();

        for outline in &outlines {
            crossings.clear();
            let n = outline.len();
            for i in 0..n {
                let [ax, ay] = outline[i];
                let [bx, by] = outline[(i + 1) % n];
                if (ay <= scan_y && scan_y < by) || (by <= scan_y && scan_y < ay) {
                    crossings.push(ax + (scan_y - ay) * (bx - ax) / (by - ay));
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            for span in crossings.chunks_exact(2) {
                fill_span(row, span[0], span[1]);
            }

            for i in 0..n {
                mark_edge(row, scan_y, outline[i], outline[(i + 1) % n]);
            }
        }
    });

    image
}

/// Set the pixels of `row` whose centres lie in `[x0, x1]` (after rounding).
fn fill_span(row: &mut [u8], x0: f32, x1: f32) {
    let (lo, hi) = (x0.min(x1).round(), x0.max(x1).round());
    let last = (row.len() - 1) as f32;
    if hi < 0.0 || lo > last {
        return;
    }
    let (start, end) = (lo.max(0.0) as usize, hi.min(last) as usize);
    for px in &mut row[start..=end] {
        *px = 255;
    }
}

/// Set the pixels of `row` covered by the edge `a`-`b` within the band
/// `[scan_y - 0.5, scan_y + 0.5]`.
fn mark_edge(row: &mut [u8], scan_y: f32, [ax, ay]: [f32; 2], [bx, by]: [f32; 2]) {
    let (band_lo, band_hi) = (scan_y - 0.5, scan_y + 0.5);
    if ay.max(by) < band_lo || ay.min(by) > band_hi {
        return;
    }
    if ay == by {
        fill_span(row, ax, bx);
        return;
    }
    let t0 = ((band_lo - ay) / (by - ay)).clamp(0.0, 1.0);
    let t1 = ((band_hi - ay) / (by - ay)).clamp(0.0, 1.0);
    fill_span(row, ax + t0 * (bx - ax), ax + t1 * (bx - ax));
}

/// Euclidean distance from `p` to the segment `a`-`b`.
#[inline]
pub fn point_segment_distance(p: [f32; 2], a: [f32; 2], b: [f32; 2]) -> f32 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a[0] + t * dx, a[1] + t * dy);
    (p[0] - cx).hypot(p[1] - cy)
}
