//! Raster → OCR engine.
//!
//! Two seams keep the pipeline testable without pdfium or tesseract:
//!
//! * [`Rasterizer`] turns a PDF into one image file per page (blocking).
//! * [`Recognizer`] turns one image into text.
//!
//! Pages are recognised sequentially, in page order, and joined with a
//! blank line. What happens when a single page fails is decided by
//! [`PageFailurePolicy`]; a rasterisation failure always fails the whole
//! conversion.

use super::{Engine, EngineOutcome, Extraction};
use crate::config::{EngineConfig, EngineKind, PageFailurePolicy};
use crate::error::ConversionError;
use crate::pipeline::render::rasterize_pages;
use crate::pipeline::{supervise, PAGE_SEPARATOR};
use crate::request::EngineOptions;
use crate::scratch::{ScratchKind, ScratchManager};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ── Seams ────────────────────────────────────────────────────────────────

/// Renders every page of a PDF into `out_dir`, returning one image path per
/// page in page order.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ConversionError>;
}

/// Recognises the text in one page image.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String, ConversionError>;
}

// ── Production implementations ───────────────────────────────────────────

/// pdfium page renderer writing PNG files.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
    dpi: u32,
    max_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            library_path: config.pdfium_library_path.clone(),
            dpi: config.render_dpi,
            max_pixels: config.max_rendered_pixels,
        }
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ConversionError> {
        rasterize_pages(
            pdf,
            out_dir,
            self.library_path.as_deref(),
            self.dpi,
            self.max_pixels,
        )
    }
}

/// Runs `tesseract <image> stdout -l <lang>` for each page.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    program: String,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    async fn recognize(&self, image: &Path) -> Result<String, ConversionError> {
        let args = [
            image.as_os_str(),
            OsStr::new("stdout"),
            OsStr::new("-l"),
            OsStr::new(&self.language),
        ];
        let output = supervise::run(&self.program, &args, None).await?;
        if !output.success() {
            return Err(ConversionError::ProcessFailed {
                program: self.program.clone(),
                returncode: output.code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        // tesseract terminates each page with a form feed
        Ok(output.stdout.trim_end_matches('\u{c}').to_string())
    }
}

// ── Engine ───────────────────────────────────────────────────────────────

pub struct OcrEngine {
    rasterizer: Arc<dyn Rasterizer>,
    recognizer: Arc<dyn Recognizer>,
    scratch: ScratchManager,
    policy: PageFailurePolicy,
}

impl OcrEngine {
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        recognizer: Arc<dyn Recognizer>,
        scratch: ScratchManager,
        policy: PageFailurePolicy,
    ) -> Self {
        Self {
            rasterizer,
            recognizer,
            scratch,
            policy,
        }
    }

    /// pdfium rasterisation + tesseract recognition, as configured.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Arc::new(PdfiumRasterizer::new(config)),
            Arc::new(TesseractRecognizer::new(
                config.tesseract_program.clone(),
                config.ocr_language.clone(),
            )),
            ScratchManager::new(config.scratch_root.clone()),
            config.page_failures,
        )
    }

    async fn recognize_pages(&self, images: &[PathBuf]) -> Result<String, ConversionError> {
        let mut texts = Vec::with_capacity(images.len());

        for (idx, image) in images.iter().enumerate() {
            let page = idx + 1;
            match self.recognizer.recognize(image).await {
                Ok(text) => {
                    debug!("Page {}: {} chars", page, text.len());
                    texts.push(text);
                }
                // A recogniser that cannot start fails every page alike.
                Err(e @ ConversionError::Launch { .. }) => return Err(e),
                Err(e) => {
                    let err = page_failure(page, e);
                    match self.policy {
                        PageFailurePolicy::Abort => return Err(err),
                        PageFailurePolicy::Skip => {
                            warn!("Skipping page: {}", err);
                            texts.push(String::new());
                        }
                    }
                }
            }
        }

        Ok(texts.join(PAGE_SEPARATOR))
    }
}

fn page_failure(page: usize, err: ConversionError) -> ConversionError {
    let detail = match err {
        ConversionError::ProcessFailed {
            program,
            returncode,
            stderr,
            ..
        } => format!("{program} exited with code {returncode}: {}", stderr.trim()),
        ConversionError::RecognitionFailed { detail, .. } => detail,
        other => other.to_string(),
    };
    ConversionError::RecognitionFailed { page, detail }
}

#[async_trait]
impl Engine for OcrEngine {
    fn name(&self) -> &'static str {
        EngineKind::Tesseract.as_str()
    }

    async fn convert(&self, document: &[u8], _options: &EngineOptions) -> EngineOutcome {
        let text = self
            .scratch
            .scoped(ScratchKind::Directory, None, |dir| async move {
                let input = dir.join("input.pdf");
                let pages_dir = dir.join("pages");

                tokio::fs::write(&input, document).await.map_err(|e| {
                    ConversionError::io(format!("Failed to write '{}'", input.display()), e)
                })?;
                tokio::fs::create_dir_all(&pages_dir).await.map_err(|e| {
                    ConversionError::io(format!("Failed to create '{}'", pages_dir.display()), e)
                })?;

                let rasterizer = Arc::clone(&self.rasterizer);
                let images =
                    tokio::task::spawn_blocking(move || rasterizer.rasterize(&input, &pages_dir))
                        .await
                        .map_err(|e| {
                            ConversionError::Internal(format!("Render task panicked: {}", e))
                        })??;
                info!("Rasterised {} pages", images.len());

                self.recognize_pages(&images).await
            })
            .await?;

        Ok(Extraction::text(text))
    }
}
