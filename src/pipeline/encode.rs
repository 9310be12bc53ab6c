//! Attachment encoding: images and raw PDFs → base64 [`Attachment`]s.
//!
//! Multimodal APIs accept binary inputs as base64 embedded in the JSON
//! request body. Pages are PNG-encoded because the format is lossless: text
//! crispness matters far more than payload size for layout recognition.

use crate::generation::Attachment;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

pub const PDF_MIME: &str = "application/pdf";
pub const PNG_MIME: &str = "image/png";

/// Encode a rasterised page as a base64 PNG attachment.
pub fn encode_page(img: &DynamicImage) -> Result<Attachment, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page → {} bytes base64", b64.len());

    Ok(Attachment::new(b64, PNG_MIME))
}

/// Wrap the PDF itself as an inline attachment.
pub fn encode_pdf(pdf: &[u8]) -> Attachment {
    Attachment::new(STANDARD.encode(pdf), PDF_MIME)
}
