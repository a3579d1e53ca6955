//! Helpers for checking overlay data URLs in tests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbaImage;

use icemap::render::DATA_URL_PREFIX;

/// Decode a PNG data URL into an RGBA image, panicking with a useful
/// message if any step fails.
pub fn decode_data_url(url: &str) -> RgbaImage {
    assert!(
        url.starts_with(DATA_URL_PREFIX),
        "overlay URL missing data-URL prefix: {}...",
        &url[..url.len().min(40)]
    );
    let bytes = STANDARD
        .decode(&url[DATA_URL_PREFIX.len()..])
        .expect("overlay payload is not valid base64");
    image::load_from_memory(&bytes)
        .expect("overlay payload is not a decodable image")
        .to_rgba8()
}

/// Count fully transparent pixels in an image.
pub fn count_transparent(image: &RgbaImage) -> usize {
    image.pixels().filter(|p| p.0[3] == 0).count()
}
