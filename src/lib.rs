//! # pdf-engines
//!
//! A uniform PDF → text bridge over three interchangeable backends.
//!
//! A caller pipes one JSON request into the `pdf-engine` binary and reads
//! exactly one JSON response back. The exit status is `0` iff the response
//! reports success, so callers may trust either channel.
//!
//! ## Engines
//!
//! | Engine | Mechanism | Needs |
//! |--------|-----------|-------|
//! | `pdfium`    | in-process text layer extraction | libpdfium |
//! | `mineru`    | supervised `mineru` CLI run with a wall-clock timeout | `mineru` on `PATH` |
//! | `tesseract` | rasterise pages via pdfium, OCR each page | libpdfium, `tesseract` |
//!
//! ## Wire format
//!
//! ```text
//! request:  { "pdf": "<base64>", "cli_args"?: ["..."], "timeout_seconds"?: 240 }
//! success:  { "success": true,  "engine": "mineru", "output": "...",
//!             "artifacts"?: [{ "path", "full_path", "size" }],
//!             "mineru_stdout"?: "...", "mineru_stderr"?: "..." }
//! failure:  { "success": false, "engine": "mineru", "error": "...",
//!             "returncode"?: 2, "stdout"?: "...", "stderr"?: "..." }
//! ```
//!
//! ## Library use
//!
//! ```rust,no_run
//! use pdf_engines::{build_engine, handle, EngineConfig, EngineKind, ResponseEmitter};
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     let config = EngineConfig::default();
//!     let engine = build_engine(EngineKind::Pdfium, &config);
//!     let raw = br#"{"pdf": "JVBERi0xLjQK"}"#;
//!     let response = handle(raw, engine.as_ref()).await;
//!     ResponseEmitter::stdout().emit(&response)
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-engine` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod emit;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod request;
pub mod scratch;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EngineConfig, EngineConfigBuilder, EngineKind, PageFailurePolicy};
pub use convert::{handle, handle_read_failure};
pub use emit::ResponseEmitter;
pub use engine::{build_engine, Artifact, Engine, EngineLog, EngineOutcome, Extraction};
pub use error::ConversionError;
pub use normalize::{normalize, ConversionResponse};
pub use request::{ConversionRequest, EngineOptions};
pub use scratch::{ScratchKind, ScratchManager, ScratchResource};
