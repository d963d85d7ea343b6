//! Image encoding: tile `DynamicImage` → base64 PNG.
//!
//! Vision APIs accept images as base64 data-URIs embedded in the JSON
//! request body. PNG is chosen over JPEG because it is lossless — the
//! 6–10 pt tag text on a P&ID sheet is exactly the kind of fine detail
//! JPEG artefacts destroy first.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a tile as base64 PNG ready for the detection request.
pub fn encode_tile(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded tile → {} bytes base64", b64.len());
    Ok(b64)
}
