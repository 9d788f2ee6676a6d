//! Request decoding: the stdin byte stream → [`ConversionRequest`].
//!
//! The wire format is a single JSON object:
//!
//! ```text
//! { "pdf": "<base64>", "cli_args": ["..."]?, "timeout_seconds": <number>? }
//! ```
//!
//! Decoding is a pure parse step. Anything wrong with the payload is an
//! [`ConversionError::InvalidRequest`], never an engine failure.

use crate::error::ConversionError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// One decoded conversion request. Immutable once decoded.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Decoded document bytes; never empty.
    pub document: Vec<u8>,
    /// Engine-specific extras and the request timeout.
    pub options: EngineOptions,
}

/// Engine-specific request options.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Request timeout in seconds; finite and positive when present.
    pub timeout_seconds: Option<f64>,
    /// Every other top-level key of the request, verbatim.
    pub extra: Map<String, Value>,
}

impl EngineOptions {
    /// Extra command-line arguments for external engines.
    ///
    /// Only a JSON array of strings counts; any other shape is ignored.
    pub fn cli_args(&self) -> Option<Vec<String>> {
        let value = self.extra.get("cli_args")?;
        let Some(items) = value.as_array() else {
            warn!("Ignoring non-list cli_args");
            return None;
        };
        let args: Option<Vec<String>> = items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect();
        if args.is_none() {
            warn!("Ignoring cli_args containing non-string elements");
        }
        args
    }

    /// The request timeout, or `default` when the request carries none.
    /// Values beyond what a `Duration` holds saturate to `Duration::MAX`.
    pub fn timeout(&self, default: Duration) -> Duration {
        match self.timeout_seconds {
            Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs)
                .unwrap_or(Duration::MAX)
                .max(Duration::from_nanos(1)),
            _ => default,
        }
    }
}

impl ConversionRequest {
    /// Parse a raw request payload.
    pub fn decode(raw: &[u8]) -> Result<Self, ConversionError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(invalid("no input payload provided on stdin"));
        }

        let mut fields: Map<String, Value> = serde_json::from_slice(raw)
            .map_err(|e| invalid(format!("payload is not a JSON object: {e}")))?;

        let encoded = match fields.remove("pdf") {
            Some(Value::String(s)) => s,
            Some(_) => return Err(invalid("'pdf' must be a base64 string")),
            None => return Err(invalid("payload must include a base64 'pdf' field")),
        };

        let compact: String = encoded
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let document = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| invalid(format!("'pdf' is not valid base64: {e}")))?;
        if document.is_empty() {
            return Err(invalid("'pdf' decodes to an empty document"));
        }

        let timeout_seconds = match fields.remove("timeout_seconds") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(secs) if secs > 0.0 => Some(secs),
                _ => return Err(invalid("'timeout_seconds' must be a positive number")),
            },
            Some(_) => return Err(invalid("'timeout_seconds' must be a number")),
        };

        debug!(
            "Decoded request: {} document bytes, {} option keys",
            document.len(),
            fields.len()
        );

        Ok(Self {
            document,
            options: EngineOptions {
                timeout_seconds,
                extra: fields,
            },
        })
    }
}

fn invalid(detail: impl Into<String>) -> ConversionError {
    ConversionError::InvalidRequest(detail.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: Value) -> Vec<u8> {
        serde_json::to_vec(&v).unwrap()
    }

    #[test]
    fn decodes_minimal_request() {
        let req = ConversionRequest::decode(&payload(json!({"pdf": "JVBERi0="}))).unwrap();
        assert_eq!(req.document, b"%PDF-");
        assert!(req.options.timeout_seconds.is_none());
        assert!(req.options.cli_args().is_none());
    }

    #[test]
    fn keeps_unknown_keys_as_engine_options() {
        let req = ConversionRequest::decode(&payload(json!({
            "pdf": "JVBERi0=",
            "cli_args": ["--method", "ocr"],
            "lang": "en",
        })))
        .unwrap();
        assert_eq!(
            req.options.cli_args(),
            Some(vec!["--method".to_string(), "ocr".to_string()])
        );
        assert_eq!(req.options.extra["lang"], "en");
        assert!(!req.options.extra.contains_key("pdf"));
    }

    #[test]
    fn ignores_wrapped_base64() {
        let req = ConversionRequest::decode(&payload(json!({"pdf": "JVBE\nRi0="}))).unwrap();
        assert_eq!(req.document, b"%PDF-");
    }

    #[test]
    fn rejects_empty_stream() {
        let err = ConversionRequest::decode(b"  \n").unwrap_err();
        assert!(err.to_string().contains("no input payload"));
    }

    #[test]
    fn rejects_non_json() {
        let err = ConversionRequest::decode(b"not json").unwrap_err();
        assert!(matches!(err, ConversionError::InvalidRequest(_)));
    }

    #[test]
    fn rejects_json_that_is_not_an_object() {
        assert!(ConversionRequest::decode(b"[1, 2]").is_err());
    }

    #[test]
    fn rejects_missing_pdf() {
        let err = ConversionRequest::decode(&payload(json!({"cli_args": []}))).unwrap_err();
        assert!(err.to_string().contains("'pdf'"), "got: {err}");
    }

    #[test]
    fn rejects_non_string_pdf() {
        assert!(ConversionRequest::decode(&payload(json!({"pdf": 42}))).is_err());
    }

    #[test]
    fn rejects_bad_base64() {
        let err = ConversionRequest::decode(&payload(json!({"pdf": "%%%"}))).unwrap_err();
        assert!(err.to_string().contains("base64"), "got: {err}");
    }

    #[test]
    fn rejects_empty_document() {
        let err = ConversionRequest::decode(&payload(json!({"pdf": ""}))).unwrap_err();
        assert!(err.to_string().contains("empty"), "got: {err}");
    }

    #[test]
    fn non_list_cli_args_are_ignored() {
        let req = ConversionRequest::decode(&payload(json!({
            "pdf": "JVBERi0=",
            "cli_args": "--method ocr",
        })))
        .unwrap();
        assert!(req.options.cli_args().is_none());
    }

    #[test]
    fn mixed_cli_args_are_ignored() {
        let req = ConversionRequest::decode(&payload(json!({
            "pdf": "JVBERi0=",
            "cli_args": ["--method", 3],
        })))
        .unwrap();
        assert!(req.options.cli_args().is_none());
    }

    #[test]
    fn timeout_parsing() {
        let req = ConversionRequest::decode(&payload(json!({
            "pdf": "JVBERi0=",
            "timeout_seconds": 2.5,
        })))
        .unwrap();
        assert_eq!(
            req.options.timeout(Duration::from_secs(240)),
            Duration::from_millis(2500)
        );

        let req = ConversionRequest::decode(&payload(json!({
            "pdf": "JVBERi0=",
            "timeout_seconds": null,
        })))
        .unwrap();
        assert_eq!(
            req.options.timeout(Duration::from_secs(240)),
            Duration::from_secs(240)
        );
    }

    #[test]
    fn huge_timeout_saturates() {
        let req = ConversionRequest::decode(&payload(json!({
            "pdf": "JVBERi0=",
            "timeout_seconds": 1e300,
        })))
        .unwrap();
        assert_eq!(req.options.timeout_seconds, Some(1e300));
        assert_eq!(req.options.timeout(Duration::from_secs(240)), Duration::MAX);

        let req = ConversionRequest::decode(&payload(json!({
            "pdf": "JVBERi0=",
            "timeout_seconds": 1e-300,
        })))
        .unwrap();
        assert_eq!(
            req.options.timeout(Duration::from_secs(240)),
            Duration::from_nanos(1)
        );
    }

    #[test]
    fn rejects_bad_timeouts() {
        for bad in [json!(0), json!(-1), json!("10")] {
            let err = ConversionRequest::decode(&payload(json!({
                "pdf": "JVBERi0=",
                "timeout_seconds": bad,
            })))
            .unwrap_err();
            assert!(err.to_string().contains("timeout_seconds"), "got: {err}");
        }
    }
}
