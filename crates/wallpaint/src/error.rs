use thiserror::Error;

/// The input bytes (or raw pixels) do not describe a usable image.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Cannot read image: {0}")]
    Malformed(String),
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Invalid quality {0}: expected a value in 1..=100")]
    InvalidQuality(u8),

    #[error("Failed to encode image: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentationError {
    /// Nothing in the photo looked like a wall. Callers fall back to manual strokes.
    #[error("No wall region found; draw the wall manually")]
    NoWallFound,

    #[error("Segmentation cancelled")]
    Cancelled,

    #[error("Invalid segmentation configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompositeError {
    #[error("Mask is {mask_width}x{mask_height} but image is {image_width}x{image_height}")]
    DimensionMismatch {
        image_width: u32,
        image_height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    #[error("Opacity {0} is outside [0, 1]")]
    InvalidOpacity(f32),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrokeError {
    #[error("A stroke needs at least one point")]
    NoPoints,

    #[error("Stroke width must be positive and finite, got {0}")]
    InvalidWidth(f32),

    #[error("Stroke point ({0}, {1}) is not finite")]
    NonFinitePoint(f32, f32),
}

/// Errors surfaced by an editing [`Session`](crate::session::Session).
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Segmentation(#[from] SegmentationError),

    #[error(transparent)]
    Composite(#[from] CompositeError),

    #[error("Cannot {action} while the session is {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, SessionError>;
