//! The one place that writes to stdout.
//!
//! [`ResponseEmitter::emit`] consumes the emitter, so a process can write at
//! most one response through it. Logging goes to stderr and never interleaves
//! with the JSON document.

use crate::normalize::ConversionResponse;
use serde_json::json;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::error;

pub struct ResponseEmitter<W: Write> {
    writer: W,
}

impl ResponseEmitter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ResponseEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write `response` as one JSON line and return the matching exit status.
    pub fn emit(mut self, response: &ConversionResponse) -> ExitCode {
        let code = if response.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        };

        let body = match serde_json::to_string(response) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to serialise response: {}", e);
                let fallback = json!({
                    "success": false,
                    "engine": response.engine,
                    "error": format!("failed to serialise response: {e}"),
                });
                return self.write_line(&fallback.to_string(), ExitCode::from(1));
            }
        };

        self.write_line(&body, code)
    }

    fn write_line(&mut self, body: &str, code: ExitCode) -> ExitCode {
        let written = writeln!(self.writer, "{body}").and_then(|()| self.writer.flush());
        match written {
            Ok(()) => code,
            Err(e) => {
                error!("Failed to write response: {}", e);
                ExitCode::from(1)
            }
        }
    }
}
