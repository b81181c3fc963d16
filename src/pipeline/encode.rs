//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! PNG keeps card text crisp; JPEG artefacts around small glyphs (RxBIN
//! digits, group numbers) are a common source of misread characters.
//! `detail: "high"` makes GPT-4-class models tile the image instead of
//! looking at one downscaled overview.

use crate::error::CardScanError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode one card image as a base64 PNG ready for the model API.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Encode every image, front first. Index in errors is 1-based.
pub fn encode_all(images: &[DynamicImage]) -> Result<Vec<ImageData>, CardScanError> {
    images
        .iter()
        .enumerate()
        .map(|(i, img)| {
            encode_image(img).map_err(|e| CardScanError::EncodeFailed {
                index: i + 1,
                detail: e.to_string(),
            })
        })
        .collect()
}
