//! Attachment preparation: turn validated PDF bytes into what the model sees.

use super::encode::{encode_page, encode_pdf};
use super::render::{render_pages, RenderOptions};
use crate::config::{AnalysisConfig, PdfInput};
use crate::error::AnalysisError;
use crate::generation::Attachment;
use tracing::debug;

/// Build the attachment list for `config.pdf_input`.
///
/// `Inline` sends the PDF as one `application/pdf` attachment. `Rendered`
/// sends one PNG per page, in page order.
pub async fn prepare_attachments(
    pdf: &[u8],
    config: &AnalysisConfig,
) -> Result<Vec<Attachment>, AnalysisError> {
    match config.pdf_input {
        PdfInput::Inline => Ok(vec![encode_pdf(pdf)]),
        PdfInput::Rendered => {
            let options = RenderOptions {
                dpi: config.dpi,
                max_pixels: config.max_rendered_pixels,
                password: config.password.clone(),
            };
            let images = render_pages(pdf.to_vec(), options).await?;
            let attachments = images
                .iter()
                .enumerate()
                .map(|(idx, img)| {
                    encode_page(img).map_err(|e| AnalysisError::RasterisationFailed {
                        page: idx + 1,
                        detail: format!("PNG encode failed: {}", e),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            debug!("Prepared {} page attachments", attachments.len());
            Ok(attachments)
        }
    }
}
