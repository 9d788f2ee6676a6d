//! In-process text extraction through pdfium's text layer.

use super::render::{bind_pdfium, load_document};
use super::PAGE_SEPARATOR;
use crate::error::ConversionError;
use std::path::Path;
use tracing::{debug, info};

/// Extract the text of every page, joined in page order.
///
/// A document without a text layer legitimately yields an empty string.
pub fn extract_text(pdf_path: &Path, library: Option<&Path>) -> Result<String, ConversionError> {
    let pdfium = bind_pdfium(library)?;
    let document = load_document(&pdfium, pdf_path)?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| ConversionError::Library {
                detail: format!("page {}: {:?}", idx + 1, e),
            })?
            .all();
        debug!("Page {}: {} chars", idx + 1, text.len());
        texts.push(text);
    }

    Ok(texts.join(PAGE_SEPARATOR))
}
