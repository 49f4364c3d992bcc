use std::{
    fs, io,
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use derive_more::{Display, Error, From};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cancel::Cancelled;

/// Directory under the project root holding tool state (invocation log,
/// lock file).
pub(crate) const STATE_DIR: &str = ".suitesync";

/// Append-only diagnostic log of every external tool invocation.
const INVOCATION_LOG: &str = "suitecloud.log";

/// How long an interrupted child gets to exit before it is killed outright.
const INTERRUPT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// External tool invocation errors.
#[derive(Debug, Display, Error, From)]
pub(crate) enum ToolError {
    /// IO-related error, including spawn failures.
    Io(io::Error),

    /// Unable to determine the location of the tool binary.
    #[display(fmt = "unable to locate the SuiteCloud CLI: {}", _0)]
    Which(which::Error),

    /// Operation was cancelled cooperatively.
    Cancelled(Cancelled),

    /// Tool exited with a non-zero status code.
    #[display(
        fmt = "suitecloud exited with status code {}\n{}{}",
        code,
        stdout,
        stderr
    )]
    ExitStatus {
        /// Status code reported by the child process.
        code: i32,

        /// Captured standard output.
        stdout: String,

        /// Captured standard error.
        stderr: String,
    },
}

/// Captured output of a finished tool invocation.
pub(crate) struct ToolOutput {
    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,
}

/// Handle to the external SuiteCloud CLI.
pub(crate) struct SuiteCloud {
    /// Resolved tool binary location.
    binary: PathBuf,

    /// Project root, used to anchor the invocation log.
    log_root: PathBuf,
}

impl SuiteCloud {
    /// Resolve the tool binary through `PATH`.
    pub(crate) fn new(binary_name: &str, project_root: &Path) -> Result<Self, which::Error> {
        Ok(Self {
            binary: which::which(binary_name)?,
            log_root: project_root.to_path_buf(),
        })
    }

    /// Spawn the tool with the given arguments and working directory,
    /// capturing both output streams. The environment is inherited.
    ///
    /// A fired cancellation token interrupts the child and resolves to
    /// [`Cancelled`]; callers must treat that as a silent abort, not a
    /// reported failure.
    pub(crate) async fn invoke(
        &self,
        working_dir: &Path,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        if cancel.is_cancelled() {
            return Err(Cancelled.into());
        }

        debug!(?args, working_dir = %working_dir.display(), "invoking suitecloud");

        let mut child = Command::new(&self.binary)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout_pipe = child.stdout.take().expect("stdout is piped");
        let stderr_pipe = child.stderr.take().expect("stderr is piped");

        let stdout_task = tokio::spawn(read_stream(stdout_pipe));
        let stderr_task = tokio::spawn(read_stream(stderr_pipe));

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                interrupt(&mut child);

                if tokio::time::timeout(INTERRUPT_GRACE_PERIOD, child.wait())
                    .await
                    .is_err()
                {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }

                stdout_task.abort();
                stderr_task.abort();

                self.log_invocation(args, None, "", "interrupted");

                return Err(Cancelled.into());
            }
        };

        let stdout = collect(stdout_task).await?;
        let stderr = collect(stderr_task).await?;

        self.log_invocation(args, status.code(), &stdout, &stderr);

        if !status.success() {
            return Err(ToolError::ExitStatus {
                code: status.code().unwrap_or(-1),
                stdout,
                stderr,
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }

    /// Invoke the tool and split its combined, ANSI-stripped output into
    /// structured lines.
    ///
    /// The tool emits interactive-terminal formatting even when run
    /// non-interactively, so the escape sequences have to go before the
    /// output can be treated as records.
    pub(crate) async fn invoke_listing(
        &self,
        working_dir: &Path,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ToolError> {
        let output = self.invoke(working_dir, args, cancel).await?;

        Ok(clean_lines(&format!("{}{}", output.stdout, output.stderr)))
    }

    /// Append an invocation record to the diagnostic log.
    ///
    /// Purely a side effect: failures are logged and never affect control
    /// flow.
    fn log_invocation(&self, args: &[&str], code: Option<i32>, stdout: &str, stderr: &str) {
        let dir = self.log_root.join(STATE_DIR);
        if fs::create_dir_all(&dir).is_err() {
            return;
        }

        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let code = code
            .map(|code| code.to_string())
            .unwrap_or_else(|| String::from("signal"));

        let entry = format!(
            "[{timestamp}] suitecloud {}\nexit: {code}\nstdout:\n{stdout}\nstderr:\n{stderr}\n",
            args.join(" "),
        );

        let result = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(INVOCATION_LOG))
            .and_then(|mut file| file.write_all(entry.as_bytes()));

        if let Err(error) = result {
            warn!(%error, "unable to append to the invocation log");
        }
    }
}

/// Drain a child output stream to completion.
async fn read_stream<R: AsyncRead + Unpin>(mut stream: R) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Await a stream-draining task and decode its bytes.
async fn collect(task: JoinHandle<io::Result<Vec<u8>>>) -> Result<String, ToolError> {
    let bytes = task
        .await
        .map_err(|error| io::Error::new(io::ErrorKind::Other, error))??;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Send an interrupt to the child process.
///
/// SIGINT matches what the tool receives on Ctrl-C in a terminal and gives
/// it a chance to clean up its own state; non-Unix targets fall back to a
/// hard kill.
fn interrupt(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
            return;
        }
    }

    let _ = child.start_kill();
}

/// Strip terminal escape sequences and split into trimmed, non-empty lines.
fn clean_lines(raw: &str) -> Vec<String> {
    strip_ansi_escapes::strip_str(raw)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_escape_sequences_and_blank_lines() {
        let raw = "\u{1b}[2K\u{1b}[1mAuth ID\u{1b}[0m | Account\r\n\r\n  prod | Acme Inc\n";

        assert_eq!(
            clean_lines(raw),
            vec![String::from("Auth ID | Account"), String::from("prod | Acme Inc")]
        );
    }

    #[test]
    fn empty_output_yields_no_lines() {
        assert!(clean_lines("").is_empty());
        assert!(clean_lines("\u{1b}[2K\n\n").is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_interrupts_the_child_and_logs_the_invocation() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let tool = SuiteCloud {
            binary: PathBuf::from("/bin/sleep"),
            log_root: dir.path().to_path_buf(),
        };

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });

        let result = tool.invoke(dir.path(), &["30"], &cancel).await;
        assert!(matches!(result, Err(ToolError::Cancelled(_))));

        let log = fs::read_to_string(dir.path().join(STATE_DIR).join(INVOCATION_LOG))
            .expect("missing invocation log");
        assert!(log.contains("30"));
        assert!(log.contains("interrupted"));
    }
}
