//! Supervised external-process engine driving the `mineru` CLI.
//!
//! ```text
//! <scratch dir>/
//!  ├─ input.pdf      decoded request bytes
//!  └─ out/           mineru -p input.pdf -o out [cli_args…]
//!      └─ <stem>/<method>/<stem>.md   collected, sorted, joined
//! ```
//!
//! Exit status decides the outcome: non-zero is a failure even when mineru
//! managed to write some Markdown before dying.

use super::{Engine, EngineLog, EngineOutcome, Extraction};
use crate::config::{EngineConfig, EngineKind};
use crate::error::ConversionError;
use crate::pipeline::collect::collect_markdown;
use crate::pipeline::supervise;
use crate::request::EngineOptions;
use crate::scratch::{ScratchKind, ScratchManager};
use async_trait::async_trait;
use std::ffi::OsString;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct MineruEngine {
    program: String,
    scratch: ScratchManager,
    default_timeout: Duration,
    allowed_flags: Option<Vec<String>>,
    extensions: Vec<String>,
}

impl MineruEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            program: config.mineru_program.clone(),
            scratch: ScratchManager::new(config.scratch_root.clone()),
            default_timeout: Duration::from_secs(config.default_timeout_secs),
            allowed_flags: config.allowed_cli_flags.clone(),
            extensions: config.markdown_extensions.clone(),
        }
    }

    /// Reject caller flags outside the configured allow-list.
    ///
    /// Only tokens starting with `-` are checked; `--flag=value` is checked
    /// by its `--flag` part. Values following a flag pass unchecked.
    fn check_cli_args(&self, args: Vec<String>) -> Result<Vec<String>, ConversionError> {
        let Some(allowed) = &self.allowed_flags else {
            return Ok(args);
        };
        for arg in args.iter().filter(|a| a.starts_with('-')) {
            let flag = arg.split_once('=').map_or(arg.as_str(), |(flag, _)| flag);
            if !allowed.iter().any(|a| a == flag) {
                return Err(ConversionError::InvalidRequest(format!(
                    "cli_args flag '{flag}' is not allowed"
                )));
            }
        }
        Ok(args)
    }
}

#[async_trait]
impl Engine for MineruEngine {
    fn name(&self) -> &'static str {
        EngineKind::Mineru.as_str()
    }

    async fn convert(&self, document: &[u8], options: &EngineOptions) -> EngineOutcome {
        let extra_args = self.check_cli_args(options.cli_args().unwrap_or_default())?;
        let timeout = options.timeout(self.default_timeout);
        let program = self.program.as_str();
        let extensions = self.extensions.clone();

        let (collected, log) = self
            .scratch
            .scoped(ScratchKind::Directory, None, |dir| async move {
                let input = dir.join("input.pdf");
                let out_dir = dir.join("out");

                tokio::fs::write(&input, document).await.map_err(|e| {
                    ConversionError::io(format!("Failed to write '{}'", input.display()), e)
                })?;
                tokio::fs::create_dir_all(&out_dir).await.map_err(|e| {
                    ConversionError::io(format!("Failed to create '{}'", out_dir.display()), e)
                })?;

                let mut args: Vec<OsString> = vec![
                    "-p".into(),
                    input.into_os_string(),
                    "-o".into(),
                    out_dir.clone().into_os_string(),
                ];
                args.extend(extra_args.into_iter().map(OsString::from));

                let output = supervise::run(program, &args, Some(timeout)).await?;
                if !output.success() {
                    return Err(ConversionError::ProcessFailed {
                        program: program.to_string(),
                        returncode: output.code,
                        stdout: output.stdout,
                        stderr: output.stderr,
                    });
                }

                let collected =
                    tokio::task::spawn_blocking(move || collect_markdown(&out_dir, &extensions))
                        .await
                        .map_err(|e| {
                            ConversionError::Internal(format!("Collect task panicked: {}", e))
                        })??;

                let log = EngineLog {
                    stdout: output.stdout,
                    stderr: output.stderr,
                };
                Ok((collected, log))
            })
            .await?;

        info!(
            "mineru produced {} files, {} chars",
            collected.artifacts.len(),
            collected.text.len()
        );
        debug!("mineru stderr: {} bytes", log.stderr.len());

        Ok(Extraction {
            text: collected.text,
            artifacts: Some(collected.artifacts),
            engine_log: Some(log),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::EngineConfigBuilder;
    use serde_json::{json, Value};
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Write an executable `sh` script standing in for mineru.
    /// `$2` is the input path and `$4` the output directory.
    fn fake_mineru(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("mineru");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    struct Fixture {
        _tools: TempDir,
        scratch: TempDir,
        engine: MineruEngine,
    }

    fn fixture(
        body: &str,
        configure: impl FnOnce(EngineConfigBuilder) -> EngineConfigBuilder,
    ) -> Fixture {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let program = fake_mineru(tools.path(), body);
        let builder = EngineConfig::builder()
            .mineru_program(program.to_string_lossy())
            .scratch_root(scratch.path());
        let config = configure(builder).build().unwrap();
        Fixture {
            _tools: tools,
            scratch,
            engine: MineruEngine::new(&config),
        }
    }

    fn options(v: Value) -> EngineOptions {
        let mut extra = v.as_object().cloned().unwrap_or_default();
        let timeout_seconds = extra.remove("timeout_seconds").and_then(|t| t.as_f64());
        EngineOptions {
            timeout_seconds,
            extra,
        }
    }

    fn scratch_is_empty(f: &Fixture) -> bool {
        std::fs::read_dir(f.scratch.path()).unwrap().count() == 0
    }

    #[tokio::test]
    async fn success_collects_markdown_and_log() {
        let f = fixture(
            r#"mkdir -p "$4/input/auto"
printf '# Hello' > "$4/input/auto/input.md"
echo "parsed $2""#,
            |b| b,
        );

        let out = f.engine.convert(b"%PDF-", &options(json!({}))).await.unwrap();

        assert_eq!(out.text, "# Hello");
        let artifacts = out.artifacts.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, "input/auto/input.md");
        assert_eq!(artifacts[0].size, 7);
        let log = out.engine_log.unwrap();
        assert!(log.stdout.starts_with("parsed "));
        assert!(log.stdout.trim_end().ends_with("input.pdf"));
        assert!(scratch_is_empty(&f));
    }

    #[tokio::test]
    async fn input_file_holds_the_document() {
        let f = fixture(r#"cat "$2" > "$4/echo.md""#, |b| b);
        let out = f.engine.convert(b"%PDF-1.7 body", &options(json!({}))).await.unwrap();
        assert_eq!(out.text, "%PDF-1.7 body");
    }

    #[tokio::test]
    async fn cli_args_are_appended_after_fixed_flags() {
        let f = fixture(r#"echo "$@""#, |b| b);
        let out = f
            .engine
            .convert(b"%PDF-", &options(json!({"cli_args": ["--method", "ocr"]})))
            .await
            .unwrap();

        let stdout = out.engine_log.unwrap().stdout;
        let words: Vec<&str> = stdout.split_whitespace().collect();
        assert_eq!(words.len(), 6);
        assert_eq!(words[0], "-p");
        assert_eq!(words[2], "-o");
        assert_eq!(&words[4..], &["--method", "ocr"]);
    }

    #[tokio::test]
    async fn malformed_cli_args_are_ignored() {
        let f = fixture(r#"echo "$#""#, |b| b);
        for bad in [json!("--method ocr"), json!(["--method", 3]), json!({"a": 1})] {
            let out = f
                .engine
                .convert(b"%PDF-", &options(json!({ "cli_args": bad })))
                .await
                .unwrap();
            assert_eq!(out.engine_log.unwrap().stdout.trim(), "4");
        }
    }

    #[tokio::test]
    async fn nonzero_exit_fails_even_with_output_files() {
        let f = fixture(
            r#"printf 'partial' > "$4/partial.md"
echo "boom" >&2
exit 2"#,
            |b| b,
        );

        let err = f.engine.convert(b"%PDF-", &options(json!({}))).await.unwrap_err();

        assert_eq!(err.to_string(), "mineru CLI failed");
        let diagnostics = err.diagnostics();
        assert_eq!(diagnostics["returncode"], 2);
        assert_eq!(diagnostics["stderr"], "boom\n");
        assert!(scratch_is_empty(&f));
    }

    #[tokio::test]
    async fn empty_output_directory_is_empty_success() {
        let f = fixture("exit 0", |b| b);
        let out = f.engine.convert(b"%PDF-", &options(json!({}))).await.unwrap();
        assert_eq!(out.text, "");
        assert_eq!(out.artifacts, Some(Vec::new()));
    }

    #[tokio::test]
    async fn timeout_is_distinct_from_exit_failure() {
        let f = fixture("sleep 30", |b| b);
        let err = f
            .engine
            .convert(b"%PDF-", &options(json!({"timeout_seconds": 0.3})))
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::Timeout { .. }), "{err:?}");
        assert!(err.diagnostics().get("returncode").is_none());
        assert!(scratch_is_empty(&f));
    }

    #[tokio::test]
    async fn timed_out_tool_stops_writing() {
        let marks = tempfile::tempdir().unwrap();
        let marker = marks.path().join("late.md");
        let body = format!(
            "(sleep 1; printf late > '{}') &\nsleep 30",
            marker.display()
        );
        let f = fixture(&body, |b| b);

        let err = f
            .engine
            .convert(b"%PDF-", &options(json!({"timeout_seconds": 0.2})))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::Timeout { .. }), "{err:?}");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
        assert!(scratch_is_empty(&f));
    }

    #[tokio::test]
    async fn allow_list_rejects_before_spawning() {
        let f = fixture("exit 0", |b| b.allowed_cli_flags(["--method"]));

        let err = f
            .engine
            .convert(b"%PDF-", &options(json!({"cli_args": ["--output-everything"]})))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::InvalidRequest(_)));

        let ok = f
            .engine
            .convert(b"%PDF-", &options(json!({"cli_args": ["--method=ocr"]})))
            .await;
        assert!(ok.is_ok());
        assert!(scratch_is_empty(&f));
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let config = EngineConfig::builder()
            .mineru_program("/nonexistent/mineru")
            .scratch_root(scratch.path())
            .build()
            .unwrap();
        let err = MineruEngine::new(&config)
            .convert(b"%PDF-", &EngineOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::Launch { .. }));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }
}
