use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::{
    buffer::ImageBuffer,
    cancel::CancellationToken,
    compositor::{CompositeRequest, CompositeResult, Compositor, DEFAULT_OPACITY},
    config::{CompositeOptions, SegmentationConfig},
    error::{CompositeError, Result, SegmentationError, SessionError},
    io::{EncodeFormat, decode, encode},
    mask::Mask,
    pipeline::SegmentationPipeline,
    strokes::build_mask,
    types::{Rgb, SegmentationMode, Stroke},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// No photo loaded
    Idle,
    /// Photo decoded, no wall mask yet
    Decoded,
    /// Wall mask ready for painting
    Masked,
    /// A painted preview exists
    Composited,
}

fn default_opacity() -> f32 {
    DEFAULT_OPACITY
}

#[derive(
    Debug, Clone,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq
)]
#[serde(tag = "type", content = "params")]
#[strum(serialize_all = "snake_case")]
pub enum SessionCommand {
    /// Detect the wall automatically
    #[serde(rename = "segment")]
    Segment,

    /// Use a hand-drawn wall instead of detection
    #[serde(rename = "paint")]
    Paint {
        #[schemars(length(min = 1))]
        strokes: Vec<Stroke>,
    },

    /// Paint the masked wall
    #[serde(rename = "apply")]
    Apply {
        color: Rgb,
        #[serde(default = "default_opacity")]
        #[schemars(range(min = 0.0, max = 1.0))]
        opacity: f32,
    },

    /// Forget the photo and start over
    #[serde(rename = "reset")]
    Reset,
}

impl SessionCommand {
    /// Get the JSON schema for all commands
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(SessionCommand)
    }

    /// Get a list of all available command names
    pub fn command_names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Segment => "Detect the dominant wall in the loaded photo",
            Self::Paint { .. } => "Build the wall mask from user strokes",
            Self::Apply { .. } => "Recolor the masked wall with a color and opacity",
            Self::Reset => "Discard the photo, mask and preview",
        }
    }
}

/// One photo editing session: decode, mask, composite, encode.
///
/// Each step consumes the output of the previous one. The automatic mask is
/// cached for the loaded photo, so re-running detection after a manual mask
/// or a new color is free. Loading another photo or resetting clears it.
#[derive(Clone)]
pub struct Session {
    pipeline: Arc<SegmentationPipeline>,
    compositor: Compositor,
    state: SessionState,
    image: Option<ImageBuffer>,
    mask: Option<Mask>,
    mask_source: Option<SegmentationMode>,
    cached_mask: Option<Mask>,
    preview: Option<CompositeResult>,
    needs_manual_mask: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::with_pipeline(SegmentationPipeline::default())
    }

    /// Create a session around a custom pipeline
    pub fn with_pipeline(pipeline: SegmentationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            compositor: Compositor::default(),
            state: SessionState::Idle,
            image: None,
            mask: None,
            mask_source: None,
            cached_mask: None,
            preview: None,
            needs_manual_mask: false,
        }
    }

    pub fn from_config(
        segmentation: &SegmentationConfig,
        options: CompositeOptions,
    ) -> Result<Self> {
        let pipeline = SegmentationPipeline::from_config(segmentation)?;
        Ok(Self::with_pipeline(pipeline).with_composite_options(options))
    }

    pub fn with_composite_options(mut self, options: CompositeOptions) -> Self {
        self.compositor = Compositor::new(options);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn state_name(&self) -> &'static str {
        self.state.into()
    }

    pub fn image(&self) -> Option<&ImageBuffer> {
        self.image.as_ref()
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    /// Whether the current mask came from detection or from strokes
    pub fn mask_source(&self) -> Option<SegmentationMode> {
        self.mask_source
    }

    pub fn preview(&self) -> Option<&CompositeResult> {
        self.preview.as_ref()
    }

    /// True after automatic detection found no wall. Cleared once a manual
    /// mask is built.
    pub fn needs_manual_mask(&self) -> bool {
        self.needs_manual_mask
    }

    /// Decode a photo, discarding everything from the previous one.
    /// On failure the session is left Idle.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<&ImageBuffer> {
        self.reset();
        let image = decode(bytes)?;
        Ok(self.load_image(image))
    }

    /// Start from an already decoded photo
    pub fn load_image(&mut self, image: ImageBuffer) -> &ImageBuffer {
        self.reset();
        tracing::info!(width = image.width(), height = image.height(), "photo loaded");
        self.state = SessionState::Decoded;
        self.image.insert(image)
    }

    pub fn segment(&mut self) -> Result<&Mask> {
        self.segment_with_cancel(&CancellationToken::new())
    }

    /// Detect the wall. `NoWallFound` drops any existing mask, leaves the
    /// session Decoded and raises [`needs_manual_mask`](Self::needs_manual_mask).
    pub fn segment_with_cancel(&mut self, cancel: &CancellationToken) -> Result<&Mask> {
        let image = self.require_image("segment")?;
        let result = match &self.cached_mask {
            Some(mask) => {
                tracing::debug!("reusing cached wall mask");
                Ok(mask.clone())
            }
            None => self.pipeline.segment_with_cancel(image, cancel),
        };

        let mask = match result {
            Ok(mask) => {
                self.cached_mask = Some(mask.clone());
                mask
            }
            Err(SegmentationError::NoWallFound) => {
                tracing::warn!("no wall detected, manual mask required");
                self.mask = None;
                self.mask_source = None;
                self.preview = None;
                self.needs_manual_mask = true;
                self.state = SessionState::Decoded;
                return Err(SegmentationError::NoWallFound.into());
            }
            Err(err) => return Err(err.into()),
        };

        self.needs_manual_mask = false;
        Ok(self.set_mask_unchecked(mask, SegmentationMode::Automatic))
    }

    /// Rasterize user strokes into the wall mask.
    pub fn build_mask(&mut self, strokes: &[Stroke]) -> Result<&Mask> {
        let (width, height) = self.require_image("build a mask")?.dimensions();
        let mask = build_mask(strokes, width, height);
        self.needs_manual_mask = false;
        Ok(self.set_mask_unchecked(mask, SegmentationMode::Manual))
    }

    /// Use a mask produced elsewhere, such as a [`MaskBuilder`](crate::MaskBuilder).
    pub fn set_mask(&mut self, mask: Mask) -> Result<&Mask> {
        let image = self.require_image("set a mask")?;
        if image.dimensions() != mask.dimensions() {
            return Err(CompositeError::DimensionMismatch {
                image_width: image.width(),
                image_height: image.height(),
                mask_width: mask.width(),
                mask_height: mask.height(),
            }
            .into());
        }
        self.needs_manual_mask = false;
        Ok(self.set_mask_unchecked(mask, SegmentationMode::Manual))
    }

    /// Paint the current mask. Repeated calls reuse the mask.
    pub fn composite(&mut self, color: Rgb, opacity: f32) -> Result<&ImageBuffer> {
        let (image, mask) = match (&self.image, &self.mask) {
            (Some(image), Some(mask)) => (image, mask),
            _ => return Err(self.invalid_state("composite")),
        };

        let result = self
            .compositor
            .composite(&CompositeRequest::new(image, mask, color, opacity))?;

        tracing::info!(%color, opacity, "preview composited");
        self.state = SessionState::Composited;
        Ok(&self.preview.insert(result).image)
    }

    /// Encode the latest preview.
    pub fn encode(&self, format: EncodeFormat, quality: u8) -> Result<Vec<u8>> {
        match (&self.state, &self.preview) {
            (SessionState::Composited, Some(preview)) => {
                Ok(encode(&preview.image, format, quality)?)
            }
            _ => Err(self.invalid_state("encode")),
        }
    }

    /// Back to Idle. Drops the photo, masks and preview.
    pub fn reset(&mut self) {
        if self.state != SessionState::Idle {
            tracing::info!(from = self.state_name(), "session reset");
        }
        self.state = SessionState::Idle;
        self.image = None;
        self.mask = None;
        self.mask_source = None;
        self.cached_mask = None;
        self.preview = None;
        self.needs_manual_mask = false;
    }

    pub fn execute(&mut self, command: SessionCommand) -> Result<SessionState> {
        tracing::debug!(command = %command, "executing session command");
        match command {
            SessionCommand::Segment => {
                self.segment()?;
            }
            SessionCommand::Paint { strokes } => {
                self.build_mask(&strokes)?;
            }
            SessionCommand::Apply { color, opacity } => {
                self.composite(color, opacity)?;
            }
            SessionCommand::Reset => self.reset(),
        }
        Ok(self.state)
    }

    fn set_mask_unchecked(&mut self, mask: Mask, source: SegmentationMode) -> &Mask {
        tracing::info!(source = %source, coverage = mask.coverage(), "wall mask ready");
        self.preview = None;
        self.mask_source = Some(source);
        self.state = SessionState::Masked;
        self.mask.insert(mask)
    }

    fn require_image(&self, action: &'static str) -> Result<&ImageBuffer> {
        self.image.as_ref().ok_or_else(|| self.invalid_state(action))
    }

    fn invalid_state(&self, action: &'static str) -> SessionError {
        SessionError::InvalidState {
            action,
            state: self.state_name(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
