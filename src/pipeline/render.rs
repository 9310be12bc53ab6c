//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and blocks while rendering. `tokio::task::spawn_blocking` moves the
//! work onto the blocking pool so runtime workers are never stalled.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI is 7,000 × 9,900 px.
//! `max_rendered_pixels` caps both edges regardless of physical size, keeping
//! memory bounded and images inside what vision models actually read.

use crate::error::AnalysisError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Rendering parameters taken from the analysis config.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub dpi: u32,
    pub max_pixels: u32,
    pub password: Option<String>,
}

/// Rasterise every page of an in-memory PDF, in page order.
pub async fn render_pages(
    pdf: Vec<u8>,
    options: RenderOptions,
) -> Result<Vec<DynamicImage>, AnalysisError> {
    tokio::task::spawn_blocking(move || render_pages_blocking(pdf, &options))
        .await
        .map_err(|e| AnalysisError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_pages_blocking(
    pdf: Vec<u8>,
    options: &RenderOptions,
) -> Result<Vec<DynamicImage>, AnalysisError> {
    let pdfium = Pdfium::default();
    let password = options.password.as_deref();

    let document = pdfium
        .load_pdf_from_byte_vec(pdf, password)
        .map_err(|e| classify_load_error(format!("{:?}", e), password.is_some()))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(options.dpi as f32 / 72.0)
        .set_maximum_width(options.max_pixels as i32)
        .set_maximum_height(options.max_pixels as i32);

    let mut images = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            AnalysisError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}

/// Map a pdfium load failure onto the precondition taxonomy.
fn classify_load_error(detail: String, had_password: bool) -> AnalysisError {
    if detail.to_lowercase().contains("password") {
        if had_password {
            AnalysisError::WrongPassword
        } else {
            AnalysisError::PasswordRequired
        }
    } else {
        AnalysisError::CorruptPdf { detail }
    }
}
