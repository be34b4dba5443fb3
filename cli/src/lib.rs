use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use wallpaint::{
    CompositeOptions, DEFAULT_JPEG_QUALITY, DEFAULT_OPACITY, DecodeError, EncodeError,
    EncodeFormat, Mask, Rgb, SegmentationConfig, SegmentationError, SegmentationMode, Session,
    SessionError, Stroke,
};

#[derive(Error, Debug)]
pub enum PaintJobError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("Manual mode needs at least one stroke")]
    MissingStrokes,
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

fn default_opacity() -> f32 {
    DEFAULT_OPACITY
}

fn default_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

/// One recoloring job: which photo, which color, where to write the preview.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PaintJob {
    pub input: String,
    pub output: String,
    pub color: Rgb,
    #[serde(default = "default_opacity")]
    #[schemars(range(min = 0.0, max = 1.0))]
    pub opacity: f32,
    #[serde(default)]
    pub mode: SegmentationMode,
    /// Wall strokes for manual mode, and the fallback when detection finds nothing
    #[serde(default)]
    pub strokes: Vec<Stroke>,
    #[serde(default = "default_quality")]
    #[schemars(range(min = 1, max = 100))]
    pub quality: u8,
    /// Output format; guessed from the output extension when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<EncodeFormat>,
    /// Also write the wall mask as a grayscale PNG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask_output: Option<String>,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub compositing: CompositeOptions,
}

/// What a finished job produced
#[derive(Debug, Clone, PartialEq)]
pub struct PaintReport {
    pub mask_source: SegmentationMode,
    pub coverage: f32,
    pub bytes_written: usize,
}

impl PaintJob {
    pub fn new(input: impl Into<String>, output: impl Into<String>, color: Rgb) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            color,
            opacity: DEFAULT_OPACITY,
            mode: SegmentationMode::default(),
            strokes: Vec::new(),
            quality: DEFAULT_JPEG_QUALITY,
            format: None,
            mask_output: None,
            segmentation: SegmentationConfig::default(),
            compositing: CompositeOptions::default(),
        }
    }

    /// Load PaintJob configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, PaintJobError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load PaintJob configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, PaintJobError> {
        Ok(toml::from_str(content)?)
    }

    /// Load PaintJob configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, PaintJobError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load PaintJob configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self, PaintJobError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PaintJobError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(PaintJobError::UnsupportedFileFormat),
        }
    }

    /// Convert PaintJob to TOML string
    pub fn to_toml(&self) -> Result<String, PaintJobError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Convert PaintJob to JSON string
    pub fn to_json(&self) -> Result<String, PaintJobError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    pub fn output_format(&self) -> EncodeFormat {
        self.format.unwrap_or_else(|| {
            Path::new(&self.output)
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(EncodeFormat::from_extension)
                .unwrap_or_default()
        })
    }

    /// Decode the input, find or draw the wall, paint it and write the preview.
    pub fn run(&self) -> Result<PaintReport, PaintJobError> {
        let bytes = fs::read(&self.input)?;
        let mut session = Session::from_config(&self.segmentation, self.compositing)?;
        session.decode(&bytes)?;

        match self.mode {
            SegmentationMode::Automatic => {
                let segmented = session.segment().map(|_| ());
                match segmented {
                    Ok(()) => {}
                    Err(SessionError::Segmentation(SegmentationError::NoWallFound))
                        if !self.strokes.is_empty() =>
                    {
                        warn!(
                            "No wall detected in {}, falling back to {} strokes",
                            self.input,
                            self.strokes.len()
                        );
                        session.build_mask(&self.strokes)?;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            SegmentationMode::Manual => {
                if self.strokes.is_empty() {
                    return Err(PaintJobError::MissingStrokes);
                }
                session.build_mask(&self.strokes)?;
            }
        }

        let coverage = session.mask().map(Mask::coverage).unwrap_or(0.0);
        if let (Some(path), Some(mask)) = (&self.mask_output, session.mask()) {
            fs::write(path, mask_to_png(mask)?)?;
            info!("Mask saved to: {}", path);
        }

        session.composite(self.color, self.opacity)?;
        let encoded = session.encode(self.output_format(), self.quality)?;
        fs::write(&self.output, &encoded)?;

        let mask_source = session.mask_source().unwrap_or(self.mode);
        info!(
            "Painted {} with {} ({} mask, {:.1}% of the photo) -> {}",
            self.input,
            self.color,
            mask_source,
            coverage * 100.0,
            self.output
        );

        Ok(PaintReport {
            mask_source,
            coverage,
            bytes_written: encoded.len(),
        })
    }
}

/// Read a JSON array of strokes
pub fn load_strokes<P: AsRef<Path>>(path: P) -> Result<Vec<Stroke>, PaintJobError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Single-channel grayscale PNG of the mask
fn mask_to_png(mask: &Mask) -> Result<Vec<u8>, PaintJobError> {
    let mut out = Vec::new();
    mask.to_luma8()
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
    Ok(out)
}
