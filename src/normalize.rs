//! Engine outcome → wire response.
//!
//! [`normalize`] is total: every [`EngineOutcome`] maps to exactly one
//! [`ConversionResponse`] with either the success or the failure shape
//! populated, never both.

use crate::engine::{Artifact, EngineOutcome};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Keys owned by the response itself; engine-supplied extras never replace them.
const RESERVED_KEYS: [&str; 5] = ["success", "engine", "output", "error", "artifacts"];

/// The single JSON object written to stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionResponse {
    pub success: bool,
    pub engine: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<Artifact>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Engine log (`<engine>_stdout`, `<engine>_stderr`) or failure diagnostics.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversionResponse {
    /// A failure with no diagnostics.
    pub fn failure(engine: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            engine: engine.to_string(),
            output: None,
            artifacts: None,
            error: Some(error.into()),
            extra: Map::new(),
        }
    }
}

/// Map an engine outcome onto the response shape.
pub fn normalize(outcome: EngineOutcome, engine: &str) -> ConversionResponse {
    match outcome {
        Ok(extraction) => {
            let mut extra = Map::new();
            if let Some(log) = extraction.engine_log {
                extra.insert(format!("{engine}_stdout"), Value::String(log.stdout));
                extra.insert(format!("{engine}_stderr"), Value::String(log.stderr));
            }
            ConversionResponse {
                success: true,
                engine: engine.to_string(),
                output: Some(extraction.text),
                artifacts: extraction.artifacts,
                error: None,
                extra: without_reserved(extra),
            }
        }
        Err(err) => {
            warn!("{} failed: {}", engine, err);
            let mut response = ConversionResponse::failure(engine, err.to_string());
            response.extra = without_reserved(err.diagnostics());
            response
        }
    }
}

fn without_reserved(mut extra: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_KEYS {
        if extra.remove(key).is_some() {
            warn!("Dropping diagnostic key '{}' that collides with a response field", key);
        }
    }
    extra
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineLog, Extraction};
    use crate::error::ConversionError;
    use serde_json::json;

    fn to_json(r: &ConversionResponse) -> Value {
        serde_json::to_value(r).unwrap()
    }

    #[test]
    fn plain_success_has_only_success_fields() {
        let r = normalize(Ok(Extraction::text("hello")), "pdfium");
        assert_eq!(
            to_json(&r),
            json!({"success": true, "engine": "pdfium", "output": "hello"})
        );
    }

    #[test]
    fn empty_text_is_still_success() {
        let r = normalize(Ok(Extraction::text("")), "tesseract");
        assert!(r.success);
        assert_eq!(to_json(&r)["output"], "");
    }

    #[test]
    fn engine_log_becomes_prefixed_keys() {
        let outcome = Ok(Extraction {
            text: "A".into(),
            artifacts: Some(vec![]),
            engine_log: Some(EngineLog {
                stdout: "out".into(),
                stderr: "err".into(),
            }),
        });
        let v = to_json(&normalize(outcome, "mineru"));
        assert_eq!(v["mineru_stdout"], "out");
        assert_eq!(v["mineru_stderr"], "err");
        assert_eq!(v["artifacts"], json!([]));
        assert!(v.get("error").is_none());
    }

    #[test]
    fn process_failure_carries_diagnostics() {
        let err = ConversionError::ProcessFailed {
            program: "mineru".into(),
            returncode: 2,
            stdout: "o".into(),
            stderr: "e".into(),
        };
        let v = to_json(&normalize(Err(err), "mineru"));
        assert_eq!(
            v,
            json!({
                "success": false,
                "engine": "mineru",
                "error": "mineru CLI failed",
                "returncode": 2,
                "stdout": "o",
                "stderr": "e"
            })
        );
    }

    #[test]
    fn plain_failure_has_only_failure_fields() {
        let err = ConversionError::InvalidRequest("payload must include a base64 'pdf' field".into());
        let v = to_json(&normalize(Err(err), "pdfium"));
        assert_eq!(v["success"], false);
        assert_eq!(v["engine"], "pdfium");
        assert!(v["error"].as_str().unwrap().contains("'pdf'"));
        assert!(v.get("output").is_none());
        assert_eq!(v.as_object().unwrap().len(), 3);
    }

    #[test]
    fn reserved_keys_are_dropped() {
        let mut extra = Map::new();
        extra.insert("success".into(), json!(true));
        extra.insert("returncode".into(), json!(1));
        let kept = without_reserved(extra);
        assert_eq!(kept.len(), 1);
        assert!(kept.contains_key("returncode"));
    }
}
