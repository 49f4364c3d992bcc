use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
};

use derive_more::{Display, Error, From};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{cancel::Cancelled, pathmap};

/// Transpilation errors.
#[derive(Debug, Display, Error, From)]
pub(crate) enum TranspileError {
    /// IO-related error.
    Io(io::Error),

    /// Unable to locate the TypeScript compiler binary.
    #[display(fmt = "unable to locate the TypeScript compiler: {}", _0)]
    Which(which::Error),

    /// Operation was cancelled cooperatively.
    Cancelled(Cancelled),

    /// Source has no `.ts` suffix to substitute.
    #[display(fmt = "{} is not a TypeScript source", "_0.display()")]
    #[from(ignore)]
    NotTypeScript(#[error(not(source))] PathBuf),

    /// The compiler ran but the expected output never appeared.
    #[display(fmt = "expected compiled output {} is missing", "_0.display()")]
    #[from(ignore)]
    OutputMissing(#[error(not(source))] PathBuf),
}

/// Recompile a TypeScript source and return the path of its compiled
/// companion.
///
/// The compiler's own exit code is not the success criterion: `tsc` still
/// emits output when it reports type errors. Only the presence of the
/// expected companion file counts.
pub(crate) async fn transpile(
    tsc_binary: &str,
    project_root: &Path,
    source: &Path,
    cancel: &CancellationToken,
) -> Result<PathBuf, TranspileError> {
    let compiled = pathmap::companion_path(source, ".ts", ".js")
        .ok_or_else(|| TranspileError::NotTypeScript(source.to_path_buf()))?;

    if cancel.is_cancelled() {
        return Err(Cancelled.into());
    }

    let tsc = which::which(tsc_binary)?;

    debug!(source = %source.display(), "transpiling");

    let mut child = Command::new(tsc)
        .arg(source)
        .current_dir(project_root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    tokio::select! {
        // The exit code is deliberately ignored; the emitted-file check
        // below is the actual success criterion.
        status = child.wait() => {
            status?;
        }
        _ = cancel.cancelled() => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(Cancelled.into());
        }
    }

    if !compiled.is_file() {
        return Err(TranspileError::OutputMissing(compiled));
    }

    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_typescript_sources_are_rejected() {
        let cancel = CancellationToken::new();

        let result = transpile("tsc", Path::new("."), Path::new("a.js"), &cancel).await;

        assert!(matches!(result, Err(TranspileError::NotTypeScript(_))));
    }
}
