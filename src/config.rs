//! Configuration types for the conversion engines.
//!
//! Deployment-level behaviour is controlled through [`EngineConfig`], built via
//! [`EngineConfigBuilder`]. Per-request knobs (timeout, extra CLI arguments)
//! arrive in the request itself; see [`crate::request::EngineOptions`].

use crate::error::ConversionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default wall-clock budget for an external engine, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 240;

/// Configuration shared by all engines.
///
/// Built via [`EngineConfig::builder()`] or using [`EngineConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_engines::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .mineru_program("/opt/mineru/bin/mineru")
///     .default_timeout_secs(600)
///     .build()
///     .unwrap();
/// assert_eq!(config.default_timeout_secs, 600);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory under which scratch files and directories are created.
    /// `None` uses the system temp dir.
    pub scratch_root: Option<PathBuf>,

    /// Explicit pdfium shared library. `None` tries `./` then the system
    /// library search path.
    pub pdfium_library_path: Option<PathBuf>,

    /// Executable used by the `mineru` engine. Default: `mineru`.
    pub mineru_program: String,

    /// Timeout applied when a request carries no `timeout_seconds`. Default: 240.
    pub default_timeout_secs: u64,

    /// Flags callers may pass through `cli_args`. `None` passes everything
    /// through unchecked.
    pub allowed_cli_flags: Option<Vec<String>>,

    /// File extensions (without the dot) collected from the mineru output
    /// directory, matched case-sensitively. Default: `["md"]`.
    pub markdown_extensions: Vec<String>,

    /// Executable used by the OCR engine. Default: `tesseract`.
    pub tesseract_program: String,

    /// Tesseract language code. Default: `eng`.
    pub ocr_language: String,

    /// Rendering DPI for OCR rasterisation. Range: 72–600. Default: 200.
    pub render_dpi: u32,

    /// Cap on either rendered dimension, in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// What the OCR engine does when a single page fails. Default: abort.
    pub page_failures: PageFailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scratch_root: None,
            pdfium_library_path: None,
            mineru_program: "mineru".to_string(),
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            allowed_cli_flags: None,
            markdown_extensions: vec!["md".to_string()],
            tesseract_program: "tesseract".to_string(),
            ocr_language: "eng".to_string(),
            render_dpi: 200,
            max_rendered_pixels: 4000,
            page_failures: PageFailurePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Create a new builder for `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = Some(root.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn mineru_program(mut self, program: impl Into<String>) -> Self {
        self.config.mineru_program = program.into();
        self
    }

    pub fn default_timeout_secs(mut self, secs: u64) -> Self {
        self.config.default_timeout_secs = secs;
        self
    }

    pub fn allowed_cli_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_cli_flags = Some(flags.into_iter().map(Into::into).collect());
        self
    }

    pub fn markdown_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.markdown_extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_string())
            .collect();
        self
    }

    pub fn tesseract_program(mut self, program: impl Into<String>) -> Self {
        self.config.tesseract_program = program.into();
        self
    }

    pub fn ocr_language(mut self, language: impl Into<String>) -> Self {
        self.config.ocr_language = language.into();
        self
    }

    pub fn render_dpi(mut self, dpi: u32) -> Self {
        self.config.render_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn page_failures(mut self, policy: PageFailurePolicy) -> Self {
        self.config.page_failures = policy;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EngineConfig, ConversionError> {
        let c = &self.config;
        if c.default_timeout_secs == 0 {
            return Err(ConversionError::InvalidConfig(
                "Default timeout must be ≥ 1 second".into(),
            ));
        }
        if c.mineru_program.trim().is_empty() || c.tesseract_program.trim().is_empty() {
            return Err(ConversionError::InvalidConfig(
                "Engine executables must not be empty".into(),
            ));
        }
        if c.markdown_extensions.is_empty() {
            return Err(ConversionError::InvalidConfig(
                "At least one markdown extension is required".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(ConversionError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The interchangeable conversion backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// In-process text extraction through pdfium.
    Pdfium,
    /// The external `mineru` command-line tool.
    Mineru,
    /// Page rasterisation followed by tesseract OCR.
    Tesseract,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Pdfium => "pdfium",
            EngineKind::Mineru => "mineru",
            EngineKind::Tesseract => "tesseract",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pdfium" => Some(EngineKind::Pdfium),
            "mineru" => Some(EngineKind::Mineru),
            "tesseract" | "ocr" => Some(EngineKind::Tesseract),
            _ => None,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the OCR engine treats a page whose recognition fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageFailurePolicy {
    /// Any failed page fails the whole conversion. (default)
    #[default]
    Abort,
    /// A failed page contributes empty text; the remaining pages still count.
    Skip,
}
