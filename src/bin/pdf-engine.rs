//! CLI binary for pdf-engines.
//!
//! Reads one JSON request from stdin, runs the configured engine, and writes
//! exactly one JSON response to stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use pdf_engines::config::DEFAULT_TIMEOUT_SECS;
use pdf_engines::{
    build_engine, handle, handle_read_failure, normalize, ConversionError, ConversionResponse,
    EngineConfig, EngineKind, PageFailurePolicy, ResponseEmitter,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Text layer via pdfium
  base64 -w0 doc.pdf | jq -Rc '{pdf: .}' | pdf-engine --engine pdfium

  # mineru with extra arguments and a 10 minute budget
  echo '{"pdf": "...", "cli_args": ["--method", "ocr"], "timeout_seconds": 600}' \
    | pdf-engine --engine mineru

  # Scanned documents
  pdf-engine --engine tesseract --lang deu < request.json

EXIT STATUS:
  0  the response has "success": true
  1  anything else (the response still describes the failure)

ENVIRONMENT VARIABLES:
  PDF_ENGINE              Engine to run (pdfium, mineru, tesseract)
  MINERU_BIN              mineru executable
  TESSERACT_BIN           tesseract executable
  PDF_ENGINE_OCR_LANG     tesseract language code
  PDF_ENGINE_TIMEOUT      Default mineru timeout in seconds
  PDF_ENGINE_SCRATCH_DIR  Directory for scratch files
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  RUST_LOG                Log filter (overrides -v / -q)
"#;

/// Convert a base64 PDF read from stdin into text with one of three engines.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-engine",
    version,
    about = "Convert a PDF (JSON on stdin) to text with pdfium, mineru, or tesseract",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Engine to run.
    #[arg(short, long, env = "PDF_ENGINE", value_enum, default_value = "pdfium")]
    engine: EngineArg,

    /// mineru executable.
    #[arg(long, env = "MINERU_BIN", default_value = "mineru")]
    mineru_bin: String,

    /// Default mineru timeout in seconds, used when a request carries none.
    #[arg(long, env = "PDF_ENGINE_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Restrict the flags a request may pass through `cli_args` (repeatable).
    #[arg(long = "allow-flag", env = "PDF_ENGINE_ALLOWED_FLAGS", value_delimiter = ',')]
    allow_flags: Vec<String>,

    /// tesseract executable.
    #[arg(long, env = "TESSERACT_BIN", default_value = "tesseract")]
    tesseract_bin: String,

    /// tesseract language code.
    #[arg(long, env = "PDF_ENGINE_OCR_LANG", default_value = "eng")]
    lang: String,

    /// Rendering DPI for OCR (72–600).
    #[arg(long, env = "PDF_ENGINE_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Cap on either rendered page dimension, in pixels.
    #[arg(long, env = "PDF_ENGINE_MAX_PIXELS", default_value_t = 4000)]
    max_pixels: u32,

    /// Blank out pages tesseract cannot read instead of failing the document.
    #[arg(long, env = "PDF_ENGINE_SKIP_FAILED_PAGES")]
    skip_failed_pages: bool,

    /// Directory for scratch files (default: system temp dir).
    #[arg(long, env = "PDF_ENGINE_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Path to libpdfium (default: ./ then the system library path).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Log errors only.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Pdfium,
    Mineru,
    #[value(alias = "ocr")]
    Tesseract,
}

impl From<EngineArg> for EngineKind {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Pdfium => EngineKind::Pdfium,
            EngineArg::Mineru => EngineKind::Mineru,
            EngineArg::Tesseract => EngineKind::Tesseract,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            let summary = e.to_string();
            let summary = summary.lines().next().unwrap_or("invalid arguments");
            let response = ConversionResponse::failure("unknown", summary.trim());
            return ResponseEmitter::stdout().emit(&response);
        }
    };

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let kind = EngineKind::from(cli.engine);
    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => return ResponseEmitter::stdout().emit(&normalize(Err(e), kind.as_str())),
    };
    let engine = build_engine(kind, &config);

    let response = match read_stdin().await {
        Ok(raw) => handle(&raw, engine.as_ref()).await,
        Err(e) => handle_read_failure(format!("{e:#}"), engine.name()),
    };

    ResponseEmitter::stdout().emit(&response)
}

fn build_config(cli: &Cli) -> Result<EngineConfig, ConversionError> {
    let mut builder = EngineConfig::builder()
        .mineru_program(cli.mineru_bin.as_str())
        .default_timeout_secs(cli.timeout)
        .tesseract_program(cli.tesseract_bin.as_str())
        .ocr_language(cli.lang.as_str())
        .render_dpi(cli.dpi)
        .max_rendered_pixels(cli.max_pixels);

    if !cli.allow_flags.is_empty() {
        builder = builder.allowed_cli_flags(cli.allow_flags.iter().map(String::as_str));
    }
    if cli.skip_failed_pages {
        builder = builder.page_failures(PageFailurePolicy::Skip);
    }
    if let Some(ref dir) = cli.scratch_dir {
        builder = builder.scratch_root(dir);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib);
    }

    builder.build()
}

async fn read_stdin() -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut raw)
        .await
        .context("Failed to read request from stdin")?;
    Ok(raw)
}
