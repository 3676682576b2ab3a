//! Image parameters: loading from files, data URLs and HTTP, per-call options, and
//! image-returning functions.

use ai_fn_runtime::image::{decode_base64, encode_base64, resize};
use ai_fn_runtime::{
    sync_fn, CallArgs, Error, FunctionCall, FunctionDefinition, FunctionExecutor,
    FunctionRegistry, ImageOptions, ImageProcessor, ParameterSchema,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Map, Value};
use std::time::Duration;

fn gradient(w: u32, h: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 90])
    }))
}

fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn measuring_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    registry
        .register(
            FunctionDefinition::new(
                "measure",
                "Report image dimensions",
                ParameterSchema::object().with_property("photo", ParameterSchema::image(), true),
            )
            .with_binary_input(true)
            .with_implementation(sync_fn(|args: &CallArgs| {
                let photo = args
                    .image("photo")
                    .ok_or_else(|| anyhow::anyhow!("photo was not preprocessed"))?;
                Ok(json!({
                    "width": photo.width(),
                    "height": photo.height(),
                    "mime": photo.mime_type(),
                    "base64_matches": args.str("photo") == Some(photo.base64()),
                }))
            })),
        )
        .unwrap();
    registry
}

fn call(name: &str, params: Value) -> FunctionCall {
    let map: Map<String, Value> = params.as_object().cloned().unwrap_or_default();
    FunctionCall::new(name, map)
}

#[test]
fn test_png_round_trip_and_resize() {
    let img = gradient(40, 20);
    let back = decode_base64(&encode_base64(&img, ImageFormat::Png).unwrap()).unwrap();
    assert_eq!(back.to_rgb8(), img.to_rgb8());

    let small = resize(&img, 10, false);
    assert_eq!((small.width(), small.height()), (10, 5));
    let same = resize(&img, 100, false);
    assert_eq!((same.width(), same.height()), (40, 20));
    let big = resize(&img, 80, true);
    assert_eq!((big.width(), big.height()), (80, 40));
}

#[tokio::test]
async fn test_file_reference_with_call_options() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.png");
    std::fs::write(&path, png_bytes(&gradient(64, 32))).unwrap();

    let registry = measuring_registry();
    let executor = FunctionExecutor::default();
    let result = executor
        .execute(
            &registry,
            &call(
                "measure",
                json!({
                    "photo": path.to_string_lossy(),
                    "image_processing_options": {"resize": true, "max_size": 16, "format": "PNG"}
                }),
            ),
        )
        .await;

    assert!(result.is_success(), "{:?}", result.error);
    let out = result.result.unwrap();
    assert_eq!(out["width"], json!(16));
    assert_eq!(out["height"], json!(8));
    assert_eq!(out["mime"], json!("image/png"));
    assert_eq!(out["base64_matches"], json!(true));
    assert!(result.arguments.get("image_processing_options").is_none());
}

#[tokio::test]
async fn test_data_url_defaults_to_jpeg() {
    let b64 = encode_base64(&gradient(8, 8), ImageFormat::Png).unwrap();
    let registry = measuring_registry();
    let result = FunctionExecutor::default()
        .execute(
            &registry,
            &call("measure", json!({"photo": format!("data:image/png;base64,{}", b64)})),
        )
        .await;
    let out = result.result.unwrap();
    assert_eq!(out["mime"], json!("image/jpeg"));
    assert_eq!(out["width"], json!(8));
}

#[tokio::test]
async fn test_unloadable_reference_is_error_result() {
    let registry = measuring_registry();
    let result = FunctionExecutor::default()
        .execute(&registry, &call("measure", json!({"photo": "/no/such/file.png"})))
        .await;
    let error = result.error.unwrap();
    assert!(error.starts_with("Failed to load image"), "{}", error);
}

#[tokio::test]
async fn test_http_reference() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/cat.png")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(png_bytes(&gradient(12, 6)))
        .create_async()
        .await;

    let processor = ImageProcessor::new(Duration::from_secs(5), ImageOptions::default());
    let loaded = processor
        .load(&format!("{}/cat.png", server.url()))
        .await
        .unwrap();
    assert_eq!((loaded.width(), loaded.height()), (12, 6));
    assert_eq!(loaded.format(), ImageFormat::Png);
    mock.assert_async().await;

    let missing = processor.load(&format!("{}/dog.png", server.url())).await;
    assert!(matches!(missing, Err(Error::ImageLoad { .. })));
}

#[tokio::test]
async fn test_image_result_becomes_data_url() {
    let b64 = encode_base64(&gradient(4, 4), ImageFormat::Png).unwrap();
    let mut registry = FunctionRegistry::new();
    registry
        .register(
            FunctionDefinition::new("render", "Render a tile", ParameterSchema::object())
                .with_image_output(true)
                .with_implementation(sync_fn(move |_: &CallArgs| Ok(json!(b64.clone())))),
        )
        .unwrap();

    let result = FunctionExecutor::default()
        .execute(&registry, &call("render", json!({})))
        .await;
    let url = result.result.unwrap();
    let url = url.as_str().unwrap();
    assert!(url.starts_with("data:image/png;base64,"), "{}", url);
    assert_eq!(decode_base64(url).unwrap().width(), 4);
}
