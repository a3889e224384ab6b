//! Image encoding: `DynamicImage` → PNG bytes, PNG bytes → `ImageData`.
//!
//! Extracted images and page renders are stored and transported as PNG;
//! the model client wraps them into base64 `ImageData` only at request time.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG.
///
/// PNG is lossless, so text inside figures and page renders stays crisp.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Wrap PNG bytes as a base64 attachment for the vision API.
///
/// `detail: "high"` lets GPT-4-class models tile the image instead of
/// downscaling it to a single overview tile.
pub fn to_image_data(png: &[u8]) -> ImageData {
    let b64 = STANDARD.encode(png);
    debug!("Encoded image → {} bytes base64", b64.len());
    ImageData::new(b64, "image/png").with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[1..4], b"PNG");

        let data = to_image_data(&png);
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, png);
    }
}
