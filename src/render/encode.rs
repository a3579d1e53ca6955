//! PNG encoding and data-URL packaging for map overlays.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbaImage};

use crate::error::{IcemapError, Result};

/// Prefix of every overlay URL handed to the map surface
pub const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encode an RGBA image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| IcemapError::ImageEncoding {
            message: e.to_string(),
        })?;
    Ok(buffer.into_inner())
}

/// Package PNG bytes as a self-contained data URL.
pub fn to_data_url(png: &[u8]) -> String {
    format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(png))
}

/// Encode and package in one step.
pub fn image_to_data_url(image: &RgbaImage) -> Result<String> {
    Ok(to_data_url(&encode_png(image)?))
}
