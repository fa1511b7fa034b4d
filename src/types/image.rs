//! Image generation request and response shapes.

use super::is_false;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_IMAGE_SIZE: &str = "256x256";
pub const DEFAULT_RESPONSE_FORMAT: &str = "url";

/// Request for image generation.
///
/// `response_format` stays a plain string: an unsupported value is only
/// rejected when a response is built for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_response_format")]
    pub response_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_size() -> String {
    DEFAULT_IMAGE_SIZE.to_string()
}

fn default_response_format() -> String {
    DEFAULT_RESPONSE_FORMAT.to_string()
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            n: None,
            size: default_size(),
            response_format: default_response_format(),
            model: None,
            extra: Map::new(),
        }
    }

    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = format.into();
        self
    }

    pub fn n(mut self, n: u32) -> Self {
        self.n = Some(n);
        self
    }
}

/// Supported image response formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageResponseFormat {
    Url,
    B64Json,
}

impl ImageResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::B64Json => "b64_json",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "url" => Ok(Self::Url),
            "b64_json" => Ok(Self::B64Json),
            other => Err(Error::invalid_argument_with_context(
                format!(
                    "Invalid response_format: {} is not one of ['url', 'b64_json']",
                    other
                ),
                ErrorContext::new().with_field_path("response_format"),
            )),
        }
    }
}

/// Largest width or height a cached image is rendered at.
pub const MAX_IMAGE_DIMENSION: u32 = 4096;

/// Parse a `"WxH"` size string. Each side must be between 1 and
/// [`MAX_IMAGE_DIMENSION`].
pub fn parse_size(size: &str) -> Result<(u32, u32)> {
    let invalid = || {
        Error::invalid_argument_with_context(
            format!("Invalid size: {} is not of the form 'WxH'", size),
            ErrorContext::new().with_field_path("size"),
        )
    };
    let (w, h) = size.split_once('x').ok_or_else(invalid)?;
    let w: u32 = w.trim().parse().map_err(|_| invalid())?;
    let h: u32 = h.trim().parse().map_err(|_| invalid())?;
    if w == 0 || h == 0 {
        return Err(invalid());
    }
    if w > MAX_IMAGE_DIMENSION || h > MAX_IMAGE_DIMENSION {
        return Err(Error::invalid_argument_with_context(
            format!(
                "Invalid size: {} exceeds the {}px limit per side",
                size, MAX_IMAGE_DIMENSION
            ),
            ErrorContext::new().with_field_path("size"),
        ));
    }
    Ok((w, h))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    pub created: u64,
    pub data: Vec<ImageData>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cache_hit: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageResponse {
    pub fn first(&self) -> Option<&ImageData> {
        self.data.first()
    }
}
