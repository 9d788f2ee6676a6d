//! pdfium access: library binding, document loading, page rasterisation.
//!
//! Everything here is blocking and must run on
//! `tokio::task::spawn_blocking`; pdfium keeps thread-local state.
//!
//! Rendering scales by `dpi / 72` and then caps either edge at `max_pixels`.

use crate::error::ConversionError;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind to a pdfium library.
///
/// An explicit `library` path is used as-is; otherwise the current
/// directory is tried before the system library search path.
pub fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, ConversionError> {
    let bindings = match library {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ConversionError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Open a PDF, classifying load failures.
pub fn load_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
) -> Result<PdfDocument<'a>, ConversionError> {
    pdfium.load_pdf_from_file(pdf_path, None).map_err(|e| {
        let detail = format!("{:?}", e);
        if detail.contains("Password") || detail.contains("password") {
            ConversionError::PasswordRequired
        } else {
            ConversionError::CorruptPdf { detail }
        }
    })
}

/// Rasterise every page of a PDF into PNG files under `out_dir`.
///
/// # Returns
/// One image path per page, in page order (`page-00001.png`, …).
pub fn rasterize_pages(
    pdf_path: &Path,
    out_dir: &Path,
    library: Option<&Path>,
    dpi: u32,
    max_pixels: u32,
) -> Result<Vec<PathBuf>, ConversionError> {
    let pdfium = bind_pdfium(library)?;
    let document = load_document(&pdfium, pdf_path)?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut images = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ConversionError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        let path = out_dir.join(format!("page-{page_num:05}.png"));
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| ConversionError::RasterisationFailed {
                page: page_num,
                detail: format!("PNG encoding failed: {}", e),
            })?;

        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );
        images.push(path);
    }

    Ok(images)
}
