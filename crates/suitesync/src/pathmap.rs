use std::path::{Component, Path, PathBuf};

use derive_more::{Display, Error};

/// Top-level local folder mirroring the remote file tree's root.
pub(crate) const CABINET_FOLDER: &str = "FileCabinet";

/// Content folder this tool is restricted to operating on.
pub(crate) const CONTENT_FOLDER: &str = "SuiteScripts";

/// Local folder holding metadata-object XML definitions.
pub(crate) const OBJECTS_FOLDER: &str = "Objects";

/// Path mapping errors.
#[derive(Debug, Display, Error)]
pub(crate) enum PathMapError {
    /// Expected local content folder is absent on disk.
    #[display(fmt = "content folder {} is missing on disk", "_0.display()")]
    ContentFolderMissing(#[error(not(source))] PathBuf),

    /// Path lies outside of the designated content folder.
    #[display(fmt = "{} is outside of the 'SuiteScripts' content folder", "_0.display()")]
    OutsideContentFolder(#[error(not(source))] PathBuf),

    /// Path contains components that cannot be represented remotely.
    #[display(fmt = "{} contains non-portable path components", "_0.display()")]
    NonPortablePath(#[error(not(source))] PathBuf),
}

/// Convert a local path under the content folder into its remote counterpart.
///
/// The mapping is only defined for paths inside
/// `<root>/FileCabinet/SuiteScripts`; anything else is an error, never a
/// silent fallback. The remote form always uses `/` separators.
pub(crate) fn local_to_remote(project_root: &Path, local: &Path) -> Result<String, PathMapError> {
    let content_dir = project_root.join(CABINET_FOLDER).join(CONTENT_FOLDER);

    if !content_dir.is_dir() {
        return Err(PathMapError::ContentFolderMissing(content_dir));
    }

    let relative = local
        .strip_prefix(&content_dir)
        .map_err(|_| PathMapError::OutsideContentFolder(local.to_path_buf()))?;

    let mut remote = format!("/{CONTENT_FOLDER}");

    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| PathMapError::NonPortablePath(local.to_path_buf()))?;
                remote.push('/');
                remote.push_str(part);
            }
            _ => return Err(PathMapError::NonPortablePath(local.to_path_buf())),
        }
    }

    Ok(remote)
}

/// Convert a remote path back into its local counterpart under the cabinet
/// folder of the given root.
pub(crate) fn remote_to_local(project_root: &Path, remote: &str) -> PathBuf {
    let mut local = project_root.join(CABINET_FOLDER);

    for part in remote.split('/').filter(|part| !part.is_empty()) {
        local.push(part);
    }

    local
}

/// Derive a companion path by suffix substitution, without touching the
/// file system.
///
/// Returns [`None`] when the path does not end with `from`.
pub(crate) fn companion(path: &str, from: &str, to: &str) -> Option<String> {
    path.strip_suffix(from).map(|stem| format!("{stem}{to}"))
}

/// Local-path flavor of [`companion`].
pub(crate) fn companion_path(path: &Path, from: &str, to: &str) -> Option<PathBuf> {
    companion(path.to_str()?, from, to).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn project_with_content_folder() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        fs::create_dir_all(dir.path().join(CABINET_FOLDER).join(CONTENT_FOLDER))
            .expect("unable to create content folder");
        dir
    }

    #[test]
    fn round_trip() {
        let dir = project_with_content_folder();
        let local = dir
            .path()
            .join(CABINET_FOLDER)
            .join(CONTENT_FOLDER)
            .join("a")
            .join("b.ts");

        let remote = local_to_remote(dir.path(), &local).expect("mapping failed");

        assert_eq!(remote, "/SuiteScripts/a/b.ts");
        assert_eq!(remote_to_local(dir.path(), &remote), local);
    }

    #[test]
    fn outside_content_folder_is_rejected() {
        let dir = project_with_content_folder();
        let local = dir.path().join(CABINET_FOLDER).join("Templates").join("x.ts");

        assert!(matches!(
            local_to_remote(dir.path(), &local),
            Err(PathMapError::OutsideContentFolder(_))
        ));
    }

    #[test]
    fn missing_content_folder_is_rejected() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let local = dir.path().join(CABINET_FOLDER).join(CONTENT_FOLDER).join("a.ts");

        assert!(matches!(
            local_to_remote(dir.path(), &local),
            Err(PathMapError::ContentFolderMissing(_))
        ));
    }

    #[test]
    fn companion_substitutes_suffix() {
        assert_eq!(
            companion("/SuiteScripts/a/b.ts", ".ts", ".js").as_deref(),
            Some("/SuiteScripts/a/b.js")
        );
        assert_eq!(companion("/SuiteScripts/a/b.js", ".ts", ".js"), None);
    }

    #[test]
    fn source_and_compiled_companion_map_to_expected_remotes() {
        let dir = project_with_content_folder();
        let source = dir
            .path()
            .join(CABINET_FOLDER)
            .join(CONTENT_FOLDER)
            .join("a")
            .join("b.ts");

        let remote = local_to_remote(dir.path(), &source).expect("mapping failed");
        assert_eq!(remote, "/SuiteScripts/a/b.ts");

        let compiled = companion(&remote, ".ts", ".js").expect("substitution failed");
        assert_eq!(compiled, "/SuiteScripts/a/b.js");
    }
}
