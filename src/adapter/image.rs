//! Cached image generation.
//!
//! Images are stored as base64 whatever format the live call used, and are
//! re-rendered on a hit: resized to the requested size, then returned inline
//! or written to a local file.

use crate::backend::{ImageBackend, OpenAiClient};
use crate::cache::{adapt, CacheOptions};
use crate::error::wrap_error;
use crate::types::image::parse_size;
use crate::types::{
    unix_now, AnswerKind, CanonicalAnswer, ImageData, ImageRequest, ImageResponse,
    ImageResponseFormat,
};
use crate::{Error, ErrorContext, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const JPEG_QUALITY: u8 = 90;
const MAX_NAME_ATTEMPTS: u32 = 1000;

pub struct Image {
    backend: Arc<dyn ImageBackend>,
    output_dir: PathBuf,
}

impl Image {
    pub fn new(backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            backend,
            output_dir: PathBuf::from("."),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Arc::new(OpenAiClient::builder().build()?)))
    }

    /// Directory that `url` responses served from the cache are written to.
    /// Relative paths resolve against the working directory at call time.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn create(&self, request: ImageRequest, options: CacheOptions) -> Result<ImageResponse> {
        self.create_with_llm(request, options, None).await
    }

    pub async fn create_with_llm(
        &self,
        request: ImageRequest,
        options: CacheOptions,
        llm: Option<&dyn ImageBackend>,
    ) -> Result<ImageResponse> {
        let backend = llm.unwrap_or(self.backend.as_ref());
        let output_dir = self.output_dir.as_path();
        let req = &request;

        adapt(
            cache_request(req)?,
            &options,
            move || async move { backend.generate(req).await.map_err(wrap_error) },
            move |answer| {
                image_response_from_cache(&answer, &req.response_format, &req.size, output_dir)
            },
            move |live, writer| async move {
                match answer_from_image(&live, &req.response_format, backend).await {
                    Ok(Some(answer)) => writer.save(answer).await,
                    Ok(None) => debug!("image response carries no image, not cached"),
                    Err(e) => warn!(error = %e, "could not capture the generated image, not cached"),
                }
                Ok(live)
            },
        )
        .await
    }
}

/// Size and format only shape how a stored image is rendered, so they do not
/// take part in the lookup.
fn cache_request(request: &ImageRequest) -> Result<Value> {
    let mut value = serde_json::to_value(request)?;
    if let Value::Object(map) = &mut value {
        map.remove("response_format");
        map.remove("size");
    }
    Ok(value)
}

/// Base64 payload of the first generated image. A `url` result is downloaded
/// so the stored answer does not depend on a link that expires.
pub async fn answer_from_image(
    response: &ImageResponse,
    response_format: &str,
    backend: &dyn ImageBackend,
) -> Result<Option<CanonicalAnswer>> {
    let Some(data) = response.first() else {
        return Ok(None);
    };
    match ImageResponseFormat::parse(response_format)? {
        ImageResponseFormat::B64Json => Ok(data
            .b64_json
            .clone()
            .map(CanonicalAnswer::image_base64)),
        ImageResponseFormat::Url => {
            let Some(url) = data.url.as_deref() else {
                return Ok(None);
            };
            let raw = backend.download(url).await.map_err(wrap_error)?;
            Ok(Some(CanonicalAnswer::image_base64(STANDARD.encode(&raw))))
        }
    }
}

/// Render a stored image as an [`ImageResponse`].
///
/// The image is resized to `size` and re-encoded as JPEG when its dimensions
/// differ; otherwise the stored bytes are used as they are. For `url` the
/// image is written to a new `<unix-seconds>.jpeg` file under `output_dir`
/// and the absolute path is returned. An existing file is never overwritten:
/// a `-N` suffix is added instead.
pub fn image_response_from_cache(
    answer: &CanonicalAnswer,
    response_format: &str,
    size: &str,
    output_dir: &Path,
) -> Result<ImageResponse> {
    let format = ImageResponseFormat::parse(response_format)?;

    if answer.kind() == AnswerKind::ImageUrl {
        return match format {
            ImageResponseFormat::Url => Ok(hit(ImageData {
                url: Some(answer.to_text()),
                ..Default::default()
            })),
            ImageResponseFormat::B64Json => Err(Error::runtime_with_context(
                "cached image is a remote URL and cannot be returned inline",
                ErrorContext::new().with_field_path("response_format"),
            )),
        };
    }

    let (width, height) = parse_size(size)?;
    let raw = STANDARD.decode(answer.as_bytes())?;
    let bytes = render(&raw, width, height)?;

    let data = match format {
        ImageResponseFormat::B64Json => ImageData {
            b64_json: Some(STANDARD.encode(&bytes)),
            ..Default::default()
        },
        ImageResponseFormat::Url => {
            let path = write_image_file(output_dir, &bytes)?;
            info!(path = %path.display(), "cached image written");
            ImageData {
                url: Some(path.to_string_lossy().into_owned()),
                ..Default::default()
            }
        }
    };
    Ok(hit(data))
}

fn hit(data: ImageData) -> ImageResponse {
    ImageResponse {
        created: unix_now(),
        data: vec![data],
        cache_hit: true,
        extra: Map::new(),
    }
}

fn render(raw: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory(raw)?;
    if img.dimensions() == (width, height) {
        return Ok(raw.to_vec());
    }
    debug!(from = ?img.dimensions(), to = ?(width, height), "resizing cached image");
    let resized = img.resize_exact(width, height, FilterType::Triangle);
    // JPEG carries no alpha channel
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageOutputFormat::Jpeg(JPEG_QUALITY))?;
    Ok(out.into_inner())
}

fn write_image_file(dir: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let dir = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };
    let stamp = unix_now();
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = match attempt {
            0 => format!("{}.jpeg", stamp),
            n => format!("{}-{}.jpeg", stamp, n),
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(bytes)?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::runtime_with_context(
        "no free file name for cached image",
        ErrorContext::new().with_details(dir.display().to_string()),
    ))
}
