//! Pipeline stages that run before the model call.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable alone and the rendering backend can change without touching the
//! others.
//!
//! ```text
//! input ──▶ (validate) ──▶ render ──▶ encode ──▶ attachments
//! (path/URL)              (pdfium)   (base64)
//! ```
//!
//! 1. [`input`]: read a path or URL into bytes, enforcing the size limit
//! 2. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium blocks
//! 3. [`encode`]: PNG-encode pages, or base64 the PDF itself
//! 4. [`attach`]: choose between the above per [`crate::PdfInput`]

pub mod attach;
pub mod encode;
pub mod input;
pub mod render;

/// The four magic bytes every PDF starts with.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";
