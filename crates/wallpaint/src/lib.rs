//! # Wall Recoloring Library
//!
//! Finds the dominant wall in a room photo and previews it in a new paint
//! color while keeping the original shading.
//!
//! ## Core Features
//!
//! - **Automatic segmentation**: edge-based wall detection assembled from pluggable stages
//! - **Manual masks**: antialiased brush strokes when detection finds nothing
//! - **Luminance-preserving compositing**: shadows and highlights survive the new color
//! - **Sessions**: a small state machine driving decode, mask, composite and encode
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wallpaint::{CompositeRequest, EncodeFormat, Rgb};
//!
//! let bytes = std::fs::read("room.jpg")?;
//! let photo = wallpaint::decode(&bytes)?;
//! let mask = wallpaint::segment(&photo)?;
//!
//! let request = CompositeRequest::new(&photo, &mask, Rgb::from_hex("#C83232")?, 0.7);
//! let preview = wallpaint::composite(&request)?;
//!
//! std::fs::write("preview.png", wallpaint::encode(&preview.image, EncodeFormat::Png, 90)?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Pipeline
//!
//! ```rust,no_run
//! use wallpaint::{SegmentationPipeline, algorithms::*};
//!
//! let pipeline = SegmentationPipeline::builder()
//!     .with_working_width(Some(1024))
//!     .add_preprocessor(GaussianBlurPreprocessor { sigma: 2.0 })
//!     .add_edge_filter(ClosingPreprocessor { radius: 3 })
//!     .set_region_selector(RankedRegionSelector { min_area_fraction: 0.05, max_regions: 2 })
//!     .build();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod buffer;
pub mod mask;
pub mod types;
pub mod cancel;
pub mod config;
pub mod traits;
pub mod algorithms;
pub mod pipeline;
pub mod strokes;
pub mod compositor;
pub mod io;
pub mod session;

pub use error::{
    CompositeError, DecodeError, EncodeError, Result, SegmentationError, SessionError, StrokeError,
};
pub use buffer::{ImageBuffer, PixelFormat};
pub use mask::Mask;
pub use types::{ParseColorError, Rgb, SegmentationMode, Stroke, WallRegion};
pub use cancel::CancellationToken;
pub use config::{CompositeOptions, SegmentationConfig};
pub use traits::*;
pub use pipeline::{DetectedWalls, SegmentationPipeline, builder::PipelineBuilder};
pub use strokes::{MaskBuilder, build_mask};
pub use compositor::{
    CompositeRequest, CompositeResult, Compositor, DEFAULT_OPACITY, ShadingModel, composite,
};
pub use io::{EncodeFormat, codec::DEFAULT_JPEG_QUALITY, decode, encode};
pub use session::{Session, SessionCommand, SessionState};

/// Detect the dominant wall with the default pipeline.
pub fn segment(image: &ImageBuffer) -> std::result::Result<Mask, SegmentationError> {
    SegmentationPipeline::default().segment(image)
}

/// Like [`segment`], giving up at the next stage boundary once `cancel` fires.
pub fn segment_with_cancel(
    image: &ImageBuffer,
    cancel: &CancellationToken,
) -> std::result::Result<Mask, SegmentationError> {
    SegmentationPipeline::default().segment_with_cancel(image, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::luma;

    /// 100x100 room: a 60x60 wall at [20, 80) on a background of uniform
    /// noise in `base..=base + amp`.
    fn room(seed: u32, amp: u32, base: u32, wall: impl Fn(u32, u32) -> u32) -> ImageBuffer {
        let mut state = seed;
        let mut data = Vec::with_capacity(100 * 100 * 3);
        for y in 0..100u32 {
            for x in 0..100u32 {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let v = if (20..80).contains(&x) && (20..80).contains(&y) {
                    wall(x, y)
                } else {
                    (state >> 16) % (amp + 1) + base
                };
                let v = v as u8;
                data.extend_from_slice(&[v, v, v]);
            }
        }
        ImageBuffer::from_raw(100, 100, PixelFormat::Rgb8, data).unwrap()
    }

    /// Wall with a gentle left-to-right shading ramp over a dark, very noisy floor.
    fn shaded_room() -> ImageBuffer {
        room(1, 80, 0, |x, _| 120 + (x - 20) * 16 / 60)
    }

    fn assert_square_wall(mask: &Mask) {
        for y in 25..75 {
            for x in 25..75 {
                assert!(mask.get(x, y) >= 0.9, "inside ({x}, {y}) = {}", mask.get(x, y));
            }
        }
        for y in 0..100 {
            for x in 0..100 {
                let outside = x < 10 || x >= 90 || y < 10 || y >= 90;
                if outside {
                    assert!(mask.get(x, y) <= 0.1, "outside ({x}, {y}) = {}", mask.get(x, y));
                }
            }
        }
    }

    #[test]
    fn test_flat_wall_on_noisy_background() {
        for (amp, base) in [(16, 32), (80, 0), (60, 150)] {
            for seed in 1..=3 {
                let photo = room(seed, amp, base, |_, _| 128);
                let mask = segment(&photo)
                    .unwrap_or_else(|err| panic!("amp {amp} base {base} seed {seed}: {err}"));
                assert_square_wall(&mask);
            }
        }
    }

    #[test]
    fn test_end_to_end_recolor() {
        let photo = shaded_room();
        let mask = segment(&photo).unwrap();
        assert_eq!(mask.dimensions(), (100, 100));
        assert!(mask.values().iter().all(|v| (0.0..=1.0).contains(v)));
        assert_square_wall(&mask);

        let red = Rgb::new(200, 50, 50);
        let preview = composite(&CompositeRequest::new(&photo, &mask, red, 1.0)).unwrap();
        let painted = &preview.image;

        assert_eq!(painted.pixel(3, 3), photo.pixel(3, 3));
        assert_eq!(painted.pixel(95, 60), photo.pixel(95, 60));

        let center = painted.pixel(50, 50);
        assert!(center[0] > center[1] + 50 && center[0] > center[2] + 50, "{center:?}");

        let lum = |x, y| {
            let p = painted.pixel(x, y);
            luma(p[0], p[1], p[2])
        };
        assert!(lum(30, 50) < lum(70, 50));
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let photo = shaded_room();
        assert_eq!(segment(&photo).unwrap(), segment(&photo).unwrap());
    }

    #[test]
    fn test_session_matches_free_functions() {
        let photo = shaded_room();
        let red = Rgb::new(200, 50, 50);

        let mut session = Session::new();
        session.load_image(photo.clone());
        session.segment().unwrap();
        let from_session = session.composite(red, 0.7).unwrap().clone();

        let mask = segment(&photo).unwrap();
        let direct = composite(&CompositeRequest::new(&photo, &mask, red, 0.7)).unwrap();
        assert_eq!(from_session, direct.image);
    }
}
