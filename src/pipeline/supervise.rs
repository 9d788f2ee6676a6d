//! Supervised external processes: spawn, capture, enforce a deadline, reap.
//!
//! The child runs in its own process group. Waiting for it and reading both
//! pipes share one deadline, so a helper that inherited the pipes cannot hold
//! [`run`] past it. On timeout the whole group is killed and the child is
//! reaped; after a normal exit any group members still running are killed
//! too. Either way nothing the tool started outlives the call.

use crate::error::ConversionError;
use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How long the pipes may stay open after the child exited and its group was killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Captured result of a child that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-signal` when the child was killed by a signal (unix).
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Run `program` with `args`, capturing output as text.
///
/// Returns `Ok` for any exit status; callers decide what a non-zero code
/// means. Fails with [`ConversionError::Launch`] when the program cannot be
/// started and [`ConversionError::Timeout`] when `timeout` elapses before the
/// child has exited and its output has been read.
pub async fn run<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    timeout: Option<Duration>,
) -> Result<ProcessOutput, ConversionError> {
    let mut std_command = std::process::Command::new(program);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        std_command.process_group(0);
    }
    let mut command = Command::from(std_command);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(
        "Spawning {} {:?}",
        program,
        args.iter().map(|a| a.as_ref()).collect::<Vec<_>>()
    );
    let mut child = command.spawn().map_err(|source| ConversionError::Launch {
        program: program.to_string(),
        source,
    })?;
    // The group id equals the child's pid; `child.id()` is gone once reaped.
    let pgid = child.id();

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    let exchange = async {
        let reads = async {
            tokio::join!(
                read_pipe(stdout_pipe, &mut stdout_buf),
                read_pipe(stderr_pipe, &mut stderr_buf)
            )
        };
        tokio::pin!(reads);

        let reads_done = tokio::select! {
            _ = child.wait() => false,
            _ = &mut reads => true,
        };
        // Repeated waits return the cached status.
        let status = child.wait().await;

        #[cfg(unix)]
        if let Some(pid) = pgid {
            kill_process_group(pid);
        }
        if !reads_done && tokio::time::timeout(DRAIN_GRACE, &mut reads).await.is_err() {
            debug!("{} left its pipes open after exiting", program);
        }
        status
    };

    let finished = match timeout {
        None => Some(exchange.await),
        Some(limit) => tokio::time::timeout(limit, exchange).await.ok(),
    };

    let Some(status) = finished else {
        let limit = timeout.unwrap_or_default();
        warn!(
            "{} exceeded {:.1}s, terminating",
            program,
            limit.as_secs_f64()
        );
        #[cfg(unix)]
        if let Some(pid) = pgid {
            kill_process_group(pid);
        }
        if let Err(e) = child.kill().await {
            warn!("Failed to kill {}: {}", program, e);
        }
        return Err(ConversionError::Timeout {
            program: program.to_string(),
            timeout_seconds: limit.as_secs_f64(),
            stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
        });
    };

    let status =
        status.map_err(|e| ConversionError::io(format!("Failed to wait for '{program}'"), e))?;
    let code = exit_code(status);
    info!("{} exited with code {}", program, code);

    Ok(ProcessOutput {
        code,
        stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
    })
}

/// Read a pipe to its end into `buf`. Bytes read before cancellation stay in `buf`.
async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>, buf: &mut Vec<u8>) {
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(buf).await {
            debug!("Pipe read ended early: {}", e);
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) with a negative pid targets the process group created
    // for this child by `process_group(0)`; it touches no memory.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(
            "killpg({}) failed: {}",
            pgid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let out = run("sh", &["-c", "echo out; echo err >&2; exit 3"], None)
            .await
            .unwrap();
        assert_eq!(out.code, 3);
        assert!(!out.success());
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let out = run("sh", &["-c", "printf ok"], Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "ok");
    }

    #[tokio::test]
    async fn invalid_utf8_output_is_decoded_lossily() {
        let out = run("sh", &["-c", r"printf 'a\377b'"], None).await.unwrap();
        assert_eq!(out.stdout, "a\u{FFFD}b");
    }

    #[tokio::test]
    async fn signal_death_reports_negative_code() {
        let out = run("sh", &["-c", "kill -9 $$"], None).await.unwrap();
        assert_eq!(out.code, -9);
    }

    #[tokio::test]
    async fn timeout_kills_and_reports() {
        let started = Instant::now();
        let err = run(
            "sh",
            &["-c", "echo started; sleep 30"],
            Some(Duration::from_millis(300)),
        )
        .await
        .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(10));
        match err {
            ConversionError::Timeout {
                program,
                timeout_seconds,
                ..
            } => {
                assert_eq!(program, "sh");
                assert!((timeout_seconds - 0.3).abs() < 1e-9);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn background_helper_does_not_hold_the_call_open() {
        let started = Instant::now();
        let out = run(
            "sh",
            &["-c", "echo done; sleep 8 & exit 0"],
            Some(Duration::from_millis(300)),
        )
        .await
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(out.success());
        assert_eq!(out.stdout, "done\n");
    }

    #[tokio::test]
    async fn timeout_leaves_no_group_member_running() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late");

        let err = run(
            "sh",
            &[
                "-c",
                r#"(sleep 1; touch "$1") & sleep 30"#,
                "sh",
                marker.to_str().unwrap(),
            ],
            Some(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConversionError::Timeout { .. }));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "a group member outlived the timeout");
    }

    #[tokio::test]
    async fn helpers_left_after_exit_are_killed() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late");

        let out = run(
            "sh",
            &[
                "-c",
                r#"(sleep 1; touch "$1") & exit 0"#,
                "sh",
                marker.to_str().unwrap(),
            ],
            None,
        )
        .await
        .unwrap();
        assert!(out.success());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "a group member outlived the child");
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let err = run::<&str>("/nonexistent/definitely-not-a-tool", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::Launch { .. }));
    }
}
