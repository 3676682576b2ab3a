//! Image parameter example
//!
//! Registers a function taking an image and another returning one, then calls both
//! through the single-shot call-expression path with a scripted model.
//!
//! Usage:
//!   cargo run --example image_tools -- path/to/picture.png

use ai_fn_runtime::image::encode_base64;
use ai_fn_runtime::{
    sync_fn, CallArgs, CallEncoding, FunctionDefinition, ParameterSchema, Runtime, ScriptedModel,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Without an argument, write a generated picture to a temp file.
    let picture = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            let path = std::env::temp_dir().join("fn_runtime_demo.png");
            let img = RgbImage::from_fn(320, 200, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
            img.save_with_format(&path, ImageFormat::Png)?;
            path.to_string_lossy().into_owned()
        }
    };

    let model = Arc::new(ScriptedModel::new([
        format!(
            "describe_image(image=\"{}\", image_processing_options={{\"resize\": true, \"max_size\": 64, \"format\": \"PNG\"}})",
            picture.replace('\\', "\\\\")
        ),
        "[make_swatch(red=200, green=40, blue=90)]".to_string(),
    ]));
    let runtime = Runtime::builder().model(model).build()?;

    runtime
        .register_serialized(
            &json!({
                "name": "describe_image",
                "description": "Report basic facts about an image",
                "parameters": {
                    "type": "object",
                    "properties": {"image": {"type": "string", "format": "binary"}},
                    "required": ["image"]
                },
                "supports_images": true
            }),
            Some(sync_fn(|args: &CallArgs| {
                let image = args
                    .image("image")
                    .ok_or_else(|| anyhow::anyhow!("image argument missing"))?;
                Ok(json!({
                    "width": image.width(),
                    "height": image.height(),
                    "mime_type": image.mime_type(),
                }))
            })),
        )
        .await?;

    runtime
        .register_function(
            FunctionDefinition::new(
                "make_swatch",
                "Render a 16x16 colour swatch",
                ParameterSchema::object()
                    .with_property("red", ParameterSchema::integer(), true)
                    .with_property("green", ParameterSchema::integer(), true)
                    .with_property("blue", ParameterSchema::integer(), true),
            )
            .with_image_output(true)
            .with_implementation(sync_fn(|args: &CallArgs| {
                let channel = |name: &str| args.i64(name).unwrap_or(0).clamp(0, 255) as u8;
                let rgb = Rgb([channel("red"), channel("green"), channel("blue")]);
                let swatch = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, rgb));
                Ok(json!(encode_base64(&swatch, ImageFormat::Png)?))
            })),
        )
        .await?;

    for query in ["Describe my picture", "Make me a raspberry swatch"] {
        let (result, raw) = runtime.call_once(query, CallEncoding::CallExpression).await?;
        println!("> {}\n  model: {}", query, raw);
        match result {
            Some(result) => println!("  result: {}", ai_fn_runtime::utils::truncate(&result.observation(), 120)),
            None => println!("  (no function call)"),
        }
    }

    Ok(())
}
