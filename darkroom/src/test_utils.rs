//! Test utilities shared across the crate's unit tests.

use std::io::Cursor;
use std::path::Path;

use axum_test::TestServer;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use tempfile::TempDir;

use crate::config::{Config, CorsConfig, StorageConfig, UploadConfig};

pub fn create_test_config(storage_path: &Path) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        storage: StorageConfig {
            path: storage_path.to_path_buf(),
        },
        // Small limit so oversize tests stay cheap
        upload: UploadConfig {
            max_bytes: 4 * 1024 * 1024,
        },
        cors: CorsConfig::default(),
        enable_metrics: false,
        enable_otel_export: false,
    }
}

/// Build a test server storing into a fresh temporary directory.
///
/// The returned `TempDir` owns the storage location; keep it alive for the
/// duration of the test.
pub fn create_test_app() -> (TestServer, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = create_test_config(&dir.path().join("image.jpg"));

    let app = crate::Application::new(config).expect("Failed to create application");

    (app.into_test_server(), dir)
}

/// A small opaque RGB image encoded as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    encode(DynamicImage::ImageRgb8(image), ImageFormat::Png)
}

/// A small opaque RGB image encoded as JPEG.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    encode(DynamicImage::ImageRgb8(image), ImageFormat::Jpeg)
}

/// A small semi-transparent RGBA image encoded as PNG.
pub fn rgba_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 128, 64]));
    encode(DynamicImage::ImageRgba8(image), ImageFormat::Png)
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).expect("Failed to encode test fixture");
    buffer.into_inner()
}
