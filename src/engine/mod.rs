//! The conversion engines and the contract they share.
//!
//! Every engine takes the decoded document bytes plus the request's
//! [`EngineOptions`] and produces an [`EngineOutcome`]. Engines never write
//! to stdout and never decide the process exit status; that is the job of
//! [`crate::normalize`] and [`crate::emit`].
//!
//! | Engine | Module | Mechanism |
//! |--------|--------|-----------|
//! | `pdfium`    | [`library`]  | in-process text layer extraction |
//! | `mineru`    | [`external`] | supervised `mineru` subprocess |
//! | `tesseract` | [`ocr`]      | rasterise pages, OCR each image |

pub mod external;
pub mod library;
pub mod ocr;

pub use external::MineruEngine;
pub use library::PdfiumEngine;
pub use ocr::{OcrEngine, PdfiumRasterizer, Rasterizer, Recognizer, TesseractRecognizer};

use crate::config::{EngineConfig, EngineKind};
use crate::error::ConversionError;
use crate::request::EngineOptions;
use async_trait::async_trait;
use serde::Serialize;

/// What an engine returns for one request.
pub type EngineOutcome = Result<Extraction, ConversionError>;

/// A successful extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Extracted text; may legitimately be empty.
    pub text: String,
    /// Files the engine produced, for engines that produce any.
    pub artifacts: Option<Vec<Artifact>>,
    /// Captured output of an external tool.
    pub engine_log: Option<EngineLog>,
}

impl Extraction {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// One output file reported by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Path relative to the engine's output directory.
    pub path: String,
    /// Absolute path at the time of conversion. The file is gone once the
    /// response is written.
    pub full_path: String,
    /// Size in bytes.
    pub size: u64,
}

/// stdout/stderr of an external tool that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineLog {
    pub stdout: String,
    pub stderr: String,
}

/// A PDF → text backend.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Stable identifier reported in every response.
    fn name(&self) -> &'static str;

    /// Convert one document.
    async fn convert(&self, document: &[u8], options: &EngineOptions) -> EngineOutcome;
}

/// Construct the engine selected by `kind`.
pub fn build_engine(kind: EngineKind, config: &EngineConfig) -> Box<dyn Engine> {
    match kind {
        EngineKind::Pdfium => Box::new(PdfiumEngine::new(config)),
        EngineKind::Mineru => Box::new(MineruEngine::new(config)),
        EngineKind::Tesseract => Box::new(OcrEngine::from_config(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_engines_report_their_kind() {
        let config = EngineConfig::default();
        for kind in [EngineKind::Pdfium, EngineKind::Mineru, EngineKind::Tesseract] {
            assert_eq!(build_engine(kind, &config).name(), kind.as_str());
        }
    }

    #[test]
    fn artifact_serialises_with_wire_names() {
        let artifact = Artifact {
            path: "doc/auto/doc.md".into(),
            full_path: "/tmp/x/out/doc/auto/doc.md".into(),
            size: 12,
        };
        let v = serde_json::to_value(&artifact).unwrap();
        assert_eq!(v["path"], "doc/auto/doc.md");
        assert_eq!(v["full_path"], "/tmp/x/out/doc/auto/doc.md");
        assert_eq!(v["size"], 12);
    }
}
