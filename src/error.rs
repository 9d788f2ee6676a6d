//! Error types for the pdf-engines library.
//!
//! Every engine failure, whatever its origin, is a [`ConversionError`]:
//!
//! * a request that cannot be decoded ([`ConversionError::InvalidRequest`]),
//! * a library fault inside pdfium (load, text, render),
//! * an external process that exits non-zero or runs past its deadline,
//! * an OCR page that cannot be recognised.
//!
//! The variants carry the context each mechanism can capture. Callers that
//! only need the wire shape use [`ConversionError::diagnostics`], which
//! flattens the variant-specific fields into an attribute bag so new variants
//! can add fields without touching the response type.
//!
//! Scratch-resource cleanup failures have no variant: they are logged by
//! [`crate::scratch`] and never reach a response.

use serde_json::{Map, Value};
use thiserror::Error;

/// All errors produced while handling one conversion request.
#[derive(Debug, Error)]
pub enum ConversionError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The input stream is not a usable request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Scratch / I/O errors ──────────────────────────────────────────────
    /// A scratch file or directory could not be created.
    #[error("Failed to create scratch resource: {source}")]
    Scratch {
        #[source]
        source: std::io::Error,
    },

    /// Filesystem work around an engine failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ── Pdfium errors ─────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install libpdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// PDF requires a password.
    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,

    /// The parsing library failed while extracting text.
    #[error("Text extraction failed: {detail}")]
    Library { detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Subprocess errors ─────────────────────────────────────────────────
    /// The external executable could not be started.
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external executable exited with a non-zero status.
    #[error("{program} CLI failed")]
    ProcessFailed {
        program: String,
        returncode: i32,
        stdout: String,
        stderr: String,
    },

    /// The external executable outlived its deadline and was killed.
    #[error("{program} timed out after {timeout_seconds}s and was terminated")]
    Timeout {
        program: String,
        timeout_seconds: f64,
        stdout: String,
        stderr: String,
    },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// Text recognition failed for one page.
    #[error("Recognition failed for page {page}: {detail}")]
    RecognitionFailed { page: usize, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (including a panic inside an engine).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConversionError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ConversionError::Io {
            context: context.into(),
            source,
        }
    }

    /// Variant-specific diagnostic fields, merged into failure responses.
    pub fn diagnostics(&self) -> Map<String, Value> {
        let mut bag = Map::new();
        match self {
            ConversionError::ProcessFailed {
                returncode,
                stdout,
                stderr,
                ..
            } => {
                bag.insert("returncode".into(), Value::from(*returncode));
                bag.insert("stdout".into(), Value::from(stdout.as_str()));
                bag.insert("stderr".into(), Value::from(stderr.as_str()));
            }
            ConversionError::Timeout {
                timeout_seconds,
                stdout,
                stderr,
                ..
            } => {
                bag.insert("timeout_seconds".into(), Value::from(*timeout_seconds));
                bag.insert("stdout".into(), Value::from(stdout.as_str()));
                bag.insert("stderr".into(), Value::from(stderr.as_str()));
            }
            ConversionError::RasterisationFailed { page, .. }
            | ConversionError::RecognitionFailed { page, .. } => {
                bag.insert("page".into(), Value::from(*page));
            }
            _ => {}
        }
        bag
    }
}
