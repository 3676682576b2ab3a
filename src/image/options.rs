use crate::{Error, ErrorContext, Result};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved argument name carrying per-call image options.
pub const IMAGE_OPTIONS_KEY: &str = "image_processing_options";

/// How binary parameters are normalized before a function sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    /// Downscale images larger than `max_size`.
    pub resize: bool,
    /// Longest side after resizing, in pixels.
    pub max_size: u32,
    /// Output encoding: `JPEG`, `PNG`, `WEBP` or `GIF`.
    pub format: String,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            resize: false,
            max_size: 1024,
            format: "JPEG".to_string(),
        }
    }
}

impl ImageOptions {
    /// Overlay per-call options (a JSON mapping) on top of `self`.
    pub fn merged_with(&self, overrides: &Value) -> Result<Self> {
        let obj = overrides.as_object().ok_or_else(|| {
            Error::configuration_with_context(
                "image options must be a mapping",
                ErrorContext::new().with_field_path(IMAGE_OPTIONS_KEY),
            )
        })?;
        let mut out = self.clone();
        if let Some(v) = obj.get("resize") {
            out.resize = match v {
                Value::Bool(b) => *b,
                Value::String(s) => s.eq_ignore_ascii_case("true"),
                _ => return Err(bad_option("resize", v)),
            };
        }
        if let Some(v) = obj.get("max_size") {
            out.max_size = match v {
                Value::Number(n) => n
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| bad_option("max_size", v))?,
                Value::String(s) => s.trim().parse().map_err(|_| bad_option("max_size", v))?,
                _ => return Err(bad_option("max_size", v)),
            };
            if out.max_size == 0 {
                return Err(bad_option("max_size", v));
            }
        }
        if let Some(v) = obj.get("format") {
            out.format = v
                .as_str()
                .ok_or_else(|| bad_option("format", v))?
                .to_string();
            out.image_format()?;
        }
        Ok(out)
    }

    pub fn image_format(&self) -> Result<ImageFormat> {
        parse_format(&self.format)
    }
}

/// `JPEG` / `png` / `webp` / `gif` into an [`ImageFormat`].
pub fn parse_format(name: &str) -> Result<ImageFormat> {
    ImageFormat::from_extension(name.trim().to_ascii_lowercase())
        .ok_or_else(|| Error::ImageFormat(format!("unsupported output format '{}'", name)))
}

fn bad_option(key: &str, value: &Value) -> Error {
    Error::configuration_with_context(
        format!("invalid image option '{}'", key),
        ErrorContext::new()
            .with_field_path(format!("{}.{}", IMAGE_OPTIONS_KEY, key))
            .with_details(value.to_string()),
    )
}
