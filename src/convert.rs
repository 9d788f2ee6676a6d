//! Request handling: raw stdin bytes → one [`ConversionResponse`].
//!
//! ```text
//! stdin bytes
//!  │
//!  ├─ 1. Decode     ConversionRequest::decode (InvalidRequest on any defect)
//!  ├─ 2. Convert    engine.convert inside a scratch scope, panic-guarded
//!  └─ 3. Normalize  EngineOutcome → ConversionResponse
//! ```
//!
//! Nothing here can fail: every problem, including a panicking engine,
//! becomes a failure response naming the engine.

use crate::engine::{Engine, EngineOutcome};
use crate::error::ConversionError;
use crate::normalize::{normalize, ConversionResponse};
use crate::request::ConversionRequest;
use futures::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{error, info};

/// Handle one raw request with `engine`.
pub async fn handle(raw: &[u8], engine: &dyn Engine) -> ConversionResponse {
    let start = Instant::now();
    let name = engine.name();

    let outcome: EngineOutcome = match ConversionRequest::decode(raw) {
        Ok(request) => {
            info!("Converting {} bytes with {}", request.document.len(), name);
            AssertUnwindSafe(engine.convert(&request.document, &request.options))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    error!("{} panicked: {}", name, message);
                    Err(ConversionError::Internal(format!(
                        "{name} engine panicked: {message}"
                    )))
                })
        }
        Err(e) => Err(e),
    };

    let response = normalize(outcome, name);
    info!(
        "{} finished in {}ms (success: {})",
        name,
        start.elapsed().as_millis(),
        response.success
    );
    response
}

/// Failure response for when stdin itself could not be read.
pub fn handle_read_failure(err: impl Display, engine_name: &str) -> ConversionResponse {
    normalize(
        Err(ConversionError::InvalidRequest(format!(
            "failed to read stdin: {err}"
        ))),
        engine_name,
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
