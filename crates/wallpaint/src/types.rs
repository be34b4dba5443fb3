use std::{fmt, str::FromStr};

use schemars::{
    JsonSchema,
    r#gen::SchemaGenerator,
    schema::{InstanceType, Schema, SchemaObject},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::{buffer::luma, error::StrokeError};

/// An 8-bit paint color. Serialized as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid hex color '{0}': expected #RRGGBB")]
pub struct ParseColorError(pub String);

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(hex: &str) -> Result<Self, ParseColorError> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ParseColorError(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| ParseColorError(hex.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Perceived brightness in 0.0..=255.0
    pub fn luma(self) -> f32 {
        luma(self.r, self.g, self.b)
    }

    /// YIQ brightness below the midpoint
    pub fn is_dark(self) -> bool {
        let yiq = (self.r as u32 * 299 + self.g as u32 * 587 + self.b as u32 * 114) / 1000;
        yiq < 128
    }

    /// Move each channel `amount` of the way towards white.
    pub fn lighter(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);
        let up = |c: u8| (c as f32 + (255.0 - c as f32) * amount).round().min(255.0) as u8;
        Self::new(up(self.r), up(self.g), up(self.b))
    }

    /// Scale each channel down by `amount`.
    pub fn darker(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);
        let down = |c: u8| (c as f32 * (1.0 - amount)).round().max(0.0) as u8;
        Self::new(down(self.r), down(self.g), down(self.b))
    }

    pub fn complementary(self) -> Self {
        Self::new(255 - self.r, 255 - self.g, 255 - self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Rgb::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for Rgb {
    fn schema_name() -> String {
        "Rgb".to_string()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        let mut schema = SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            ..Default::default()
        };
        schema.string().pattern = Some("^#?[0-9a-fA-F]{6}$".to_string());
        schema.metadata().description = Some("Paint color as #RRGGBB".to_string());
        schema.into()
    }
}

/// A user-drawn polyline in image-space coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Stroke {
    /// Polyline vertices as `[x, y]`
    pub points: Vec<[f32; 2]>,
    /// Brush diameter in pixels
    #[schemars(range(min = 0.0))]
    pub width: f32,
}

impl Stroke {
    pub fn new(points: Vec<[f32; 2]>, width: f32) -> Result<Self, StrokeError> {
        let stroke = Self { points, width };
        stroke.validate()?;
        Ok(stroke)
    }

    pub fn validate(&self) -> Result<(), StrokeError> {
        if self.points.is_empty() {
            return Err(StrokeError::NoPoints);
        }
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(StrokeError::InvalidWidth(self.width));
        }
        if let Some(&[x, y]) = self
            .points
            .iter()
            .find(|[x, y]| !x.is_finite() || !y.is_finite())
        {
            return Err(StrokeError::NonFinitePoint(x, y));
        }
        Ok(())
    }

    pub fn radius(&self) -> f32 {
        self.width / 2.0
    }
}

/// A candidate wall outline chosen by segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallRegion {
    /// Closed outline in image coordinates (working resolution)
    pub outline: Vec<[f32; 2]>,
    /// Enclosed area in pixels
    pub area: f64,
    /// Area divided by the area of the minimum rotated bounding rectangle
    pub rectangularity: f64,
    pub centroid: [f32; 2],
    pub score: f64,
}

#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SegmentationMode {
    /// Detect the wall from image content
    #[default]
    Automatic,
    /// Paint the wall with strokes
    Manual,
}
