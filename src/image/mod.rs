//! Image parameter pipeline.
//!
//! Image references (file paths, `http(s)` URLs, data URLs or bare base64) are decoded into
//! in-memory images before a function with binary parameters runs, and image results are
//! turned into embeddable data URLs afterwards.

mod options;

pub use options::{parse_format, ImageOptions, IMAGE_OPTIONS_KEY};

use crate::types::{FunctionCallResult, FunctionDefinition};
use crate::utils::truncate;
use crate::{Error, Result};
use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// A decoded image together with its encoded form.
#[derive(Clone)]
pub struct LoadedImage {
    image: DynamicImage,
    format: ImageFormat,
    base64: String,
}

impl LoadedImage {
    /// Decode raw bytes; the base64 form is the bytes themselves.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes)?;
        let image = image::load_from_memory_with_format(bytes, format)?;
        Ok(Self {
            image,
            format,
            base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }

    /// Encode an in-memory image.
    pub fn encode(image: DynamicImage, format: ImageFormat) -> Result<Self> {
        let base64 = encode_base64(&image, format)?;
        Ok(Self {
            image,
            format,
            base64,
        })
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn base64(&self) -> &str {
        &self.base64
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.base64)
    }
}

impl std::fmt::Debug for LoadedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("format", &self.format)
            .field("base64_len", &self.base64.len())
            .finish()
    }
}

/// Scale `image` so its longer side is `max_dimension`, keeping the aspect ratio.
///
/// Smaller images are returned unchanged unless `allow_upscale` is set.
pub fn resize(image: &DynamicImage, max_dimension: u32, allow_upscale: bool) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    let longest = w.max(h);
    if max_dimension == 0 || longest == max_dimension || (longest < max_dimension && !allow_upscale)
    {
        return image.clone();
    }
    image.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

/// Encode as base64 in the given container format.
pub fn encode_base64(image: &DynamicImage, format: ImageFormat) -> Result<String> {
    let prepared = match format {
        // JPEG has no alpha channel.
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        ImageFormat::WebP | ImageFormat::Gif => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => image.clone(),
    };
    let mut buf = Cursor::new(Vec::new());
    prepared.write_to(&mut buf, format)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(buf.into_inner()))
}

/// Decode a base64 payload (bare or as a data URL).
pub fn decode_base64(text: &str) -> Result<DynamicImage> {
    Ok(decode_loaded(text)?.into_image())
}

fn decode_loaded(text: &str) -> Result<LoadedImage> {
    let payload = match text.split_once(";base64,") {
        Some((head, data)) if head.starts_with("data:") => data,
        _ => text,
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| Error::ImageFormat(format!("invalid base64 payload: {}", e)))?;
    LoadedImage::from_bytes(&bytes)
}

fn is_data_url(reference: &str) -> bool {
    reference.starts_with("data:") && reference.contains(";base64,")
}

/// Loads and normalizes images for function calls.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    http: reqwest::Client,
    load_timeout: Duration,
    defaults: ImageOptions,
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), ImageOptions::default())
    }
}

impl ImageProcessor {
    pub fn new(load_timeout: Duration, defaults: ImageOptions) -> Self {
        Self {
            http: reqwest::Client::new(),
            load_timeout,
            defaults,
        }
    }

    pub fn defaults(&self) -> &ImageOptions {
        &self.defaults
    }

    /// Resolve an image reference, bounded by the load timeout.
    pub async fn load(&self, reference: &str) -> Result<LoadedImage> {
        let reference = reference.trim();
        let shown = truncate(reference, 64);
        match tokio::time::timeout(self.load_timeout, self.load_inner(reference)).await {
            Ok(Ok(img)) => {
                debug!(reference = %shown, width = img.width(), height = img.height(), "loaded image");
                Ok(img)
            }
            Ok(Err(e @ Error::ImageLoad { .. })) => Err(e),
            Ok(Err(e)) => Err(Error::image_load(shown, e)),
            Err(_) => Err(Error::Timeout {
                operation: format!("image load from {}", shown),
                timeout_ms: self.load_timeout.as_millis() as u64,
            }),
        }
    }

    async fn load_inner(&self, reference: &str) -> Result<LoadedImage> {
        if reference.is_empty() {
            return Err(Error::image_load("<empty>", "empty image reference"));
        }
        if is_data_url(reference) {
            return decode_loaded(reference);
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let url = url::Url::parse(reference)
                .map_err(|e| Error::image_load(truncate(reference, 64), e))?;
            let resp = self
                .http
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| Error::image_load(truncate(reference, 64), e))?;
            let bytes = resp
                .bytes()
                .await
                .map_err(|e| Error::image_load(truncate(reference, 64), e))?;
            return LoadedImage::from_bytes(&bytes);
        }
        let path = Path::new(reference);
        if reference.len() < 4096 && tokio::fs::try_exists(path).await.unwrap_or(false) {
            let bytes = tokio::fs::read(path).await?;
            return LoadedImage::from_bytes(&bytes);
        }
        decode_loaded(reference).map_err(|_| {
            Error::image_load(
                truncate(reference, 64),
                "not a readable file, URL or base64 image",
            )
        })
    }

    /// Load, optionally resize, and re-encode an image reference.
    pub async fn normalize(&self, reference: &str, options: &ImageOptions) -> Result<LoadedImage> {
        let format = options.image_format()?;
        let loaded = self.load(reference).await?;
        let image = if options.resize {
            resize(loaded.image(), options.max_size, false)
        } else {
            loaded.into_image()
        };
        LoadedImage::encode(image, format)
    }

    /// Replace every binary parameter with its normalized base64 form.
    ///
    /// Per-call options under `image_processing_options` override the defaults and are
    /// removed from the arguments unless the function declares them.
    pub async fn preprocess_call(
        &self,
        def: &FunctionDefinition,
        mut args: Map<String, Value>,
    ) -> Result<(Map<String, Value>, HashMap<String, LoadedImage>)> {
        let mut images = HashMap::new();
        if !def.supports_binary_input {
            return Ok((args, images));
        }

        let options = match args.get(IMAGE_OPTIONS_KEY) {
            Some(overrides) if !overrides.is_null() => self.defaults.merged_with(overrides)?,
            _ => self.defaults.clone(),
        };
        if def.parameters.property(IMAGE_OPTIONS_KEY).is_none() {
            args.remove(IMAGE_OPTIONS_KEY);
        }

        for name in def.binary_parameters() {
            let Some(value) = args.get(name) else { continue };
            let reference = match value {
                Value::String(s) => s.clone(),
                Value::Null => continue,
                other => {
                    return Err(Error::image_load(
                        name,
                        format!("expected an image reference string, got {}", other),
                    ))
                }
            };
            let normalized = self.normalize(&reference, &options).await?;
            args.insert(name.to_string(), Value::String(normalized.base64().to_string()));
            images.insert(name.to_string(), normalized);
        }
        Ok((args, images))
    }

    /// Turn a path or base64 result of an image-returning function into a data URL.
    pub async fn postprocess_result(
        &self,
        def: &FunctionDefinition,
        result: FunctionCallResult,
    ) -> FunctionCallResult {
        if !def.returns_image || !result.is_success() {
            return result;
        }
        let Some(Value::String(reference)) = &result.result else {
            return result;
        };
        if is_data_url(reference) {
            return result;
        }
        match self.load(reference).await {
            Ok(img) => FunctionCallResult {
                result: Some(Value::String(img.data_url())),
                ..result
            },
            Err(e) => {
                warn!(function = %def.name, error = %e, "image result left as returned");
                result
            }
        }
    }
}
