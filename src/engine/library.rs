//! In-process engine: pdfium's text layer, no external tools.

use super::{Engine, EngineOutcome, Extraction};
use crate::config::{EngineConfig, EngineKind};
use crate::error::ConversionError;
use crate::pipeline::text::extract_text;
use crate::request::EngineOptions;
use crate::scratch::{ScratchKind, ScratchManager};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Extracts the embedded text of every page through pdfium.
///
/// Scanned documents without a text layer produce empty text; use the OCR
/// engine for those.
#[derive(Debug, Clone)]
pub struct PdfiumEngine {
    scratch: ScratchManager,
    library_path: Option<PathBuf>,
}

impl PdfiumEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            scratch: ScratchManager::new(config.scratch_root.clone()),
            library_path: config.pdfium_library_path.clone(),
        }
    }
}

#[async_trait]
impl Engine for PdfiumEngine {
    fn name(&self) -> &'static str {
        EngineKind::Pdfium.as_str()
    }

    async fn convert(&self, document: &[u8], _options: &EngineOptions) -> EngineOutcome {
        let library = self.library_path.clone();

        let text = self
            .scratch
            .scoped(ScratchKind::File, Some(".pdf"), |path| async move {
                tokio::fs::write(&path, document).await.map_err(|e| {
                    ConversionError::io(format!("Failed to write '{}'", path.display()), e)
                })?;

                tokio::task::spawn_blocking(move || extract_text(&path, library.as_deref()))
                    .await
                    .map_err(|e| {
                        ConversionError::Internal(format!("Extraction task panicked: {}", e))
                    })?
            })
            .await?;

        info!("pdfium extracted {} chars", text.len());
        Ok(Extraction::text(text))
    }
}
