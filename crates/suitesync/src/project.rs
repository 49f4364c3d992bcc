use std::{
    fs, io,
    path::{Path, PathBuf},
};

use derive_more::{Display, Error, From};
use serde_json::Value;

/// Marker manifest file defining the project root.
pub(crate) const MANIFEST_FILE: &str = "manifest.xml";

/// Project descriptor holding the selected authentication profile.
pub(crate) const DESCRIPTOR_FILE: &str = "project.json";

/// Descriptor key holding the selected authentication profile identifier.
const DEFAULT_AUTH_ID_KEY: &str = "defaultAuthId";

/// Substrings of an account identifier that mark it as a sandbox target.
const SANDBOX_MARKERS: &[&str] = &["-sb", "_sb", "sandbox"];

/// Project location errors.
#[derive(Debug, Display, Error)]
pub(crate) enum ProjectError {
    /// No manifest was found above the starting path.
    #[display(fmt = "no 'manifest.xml' found above {}", "_0.display()")]
    ProjectNotFound(#[error(not(source))] PathBuf),
}

/// Project descriptor errors.
#[derive(Debug, Display, Error, From)]
pub(crate) enum DescriptorError {
    /// IO-related error.
    Io(io::Error),

    /// Descriptor JSON parsing error.
    Json(serde_json::Error),

    /// Descriptor root is not a JSON object.
    #[display(fmt = "'project.json' does not contain a JSON object")]
    NotAnObject,

    /// Descriptor has no usable default authentication identifier.
    #[display(fmt = "'project.json' has no 'defaultAuthId'; run 'suitesync account' first")]
    MissingAuthId,
}

/// A located project, identified by the directory holding its manifest file.
#[derive(Debug, Clone)]
pub(crate) struct Project {
    /// Directory containing the manifest file.
    root: PathBuf,
}

impl Project {
    /// Locate the project root by searching upward from `start`, checking
    /// each candidate directory and its immediate `src` child for the
    /// manifest marker.
    ///
    /// No retries: a missing manifest is surfaced immediately.
    pub(crate) fn locate(start: &Path) -> Result<Self, ProjectError> {
        let origin = if start.is_dir() {
            start
        } else {
            start.parent().unwrap_or(start)
        };

        for candidate in origin.ancestors() {
            if candidate.join(MANIFEST_FILE).is_file() {
                return Ok(Self {
                    root: candidate.to_path_buf(),
                });
            }

            let src = candidate.join("src");
            if src.join(MANIFEST_FILE).is_file() {
                return Ok(Self { root: src });
            }
        }

        Err(ProjectError::ProjectNotFound(start.to_path_buf()))
    }

    /// Project root directory.
    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the manifest marker file.
    pub(crate) fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Location of the project descriptor file.
    pub(crate) fn descriptor_path(&self) -> PathBuf {
        self.root.join(DESCRIPTOR_FILE)
    }

    /// Read the configured default authentication profile from the descriptor.
    pub(crate) fn default_auth_id(&self) -> Result<String, DescriptorError> {
        let descriptor = self.read_descriptor()?;

        descriptor
            .get(DEFAULT_AUTH_ID_KEY)
            .and_then(Value::as_str)
            .filter(|auth_id| !auth_id.is_empty())
            .map(ToOwned::to_owned)
            .ok_or(DescriptorError::MissingAuthId)
    }

    /// Rewrite the descriptor's default authentication profile in place,
    /// preserving every other field.
    pub(crate) fn set_default_auth_id(&self, auth_id: &str) -> Result<(), DescriptorError> {
        let mut descriptor = self.read_descriptor()?;

        descriptor
            .as_object_mut()
            .ok_or(DescriptorError::NotAnObject)?
            .insert(DEFAULT_AUTH_ID_KEY.to_owned(), Value::from(auth_id));

        let mut serialized = serde_json::to_string_pretty(&descriptor)?;
        serialized.push('\n');

        fs::write(self.descriptor_path(), serialized)?;

        Ok(())
    }

    /// Parse the descriptor file into a JSON value.
    fn read_descriptor(&self) -> Result<Value, DescriptorError> {
        let raw = fs::read_to_string(self.descriptor_path())?;
        let descriptor: Value = serde_json::from_str(&raw)?;

        if !descriptor.is_object() {
            return Err(DescriptorError::NotAnObject);
        }

        Ok(descriptor)
    }
}

/// Classify an account identifier as production-like.
///
/// Anything without an explicit sandbox marker counts as production,
/// including unknown or malformed identifiers. Failing safe costs one
/// extra confirmation prompt.
pub(crate) fn is_production(auth_id: &str) -> bool {
    let lowered = auth_id.to_lowercase();

    !SANDBOX_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn locates_manifest_at_root() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        fs::write(dir.path().join(MANIFEST_FILE), "<manifest/>").expect("unable to write manifest");

        let nested = dir.path().join("FileCabinet").join("SuiteScripts");
        fs::create_dir_all(&nested).expect("unable to create content folder");

        let project = Project::locate(&nested.join("a.ts")).expect("project not found");
        assert_eq!(project.root(), dir.path());
    }

    #[test]
    fn locates_manifest_in_src_child() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let src = dir.path().join("src");
        fs::create_dir_all(&src).expect("unable to create src");
        fs::write(src.join(MANIFEST_FILE), "<manifest/>").expect("unable to write manifest");

        let project = Project::locate(dir.path()).expect("project not found");
        assert_eq!(project.root(), src);
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");

        assert!(matches!(
            Project::locate(dir.path()),
            Err(ProjectError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn descriptor_rewrite_preserves_other_fields() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        fs::write(dir.path().join(MANIFEST_FILE), "<manifest/>").expect("unable to write manifest");
        fs::write(
            dir.path().join(DESCRIPTOR_FILE),
            r#"{"defaultAuthId": "old", "projectName": "demo"}"#,
        )
        .expect("unable to write descriptor");

        let project = Project::locate(dir.path()).expect("project not found");
        project
            .set_default_auth_id("fresh")
            .expect("unable to rewrite descriptor");

        assert_eq!(project.default_auth_id().expect("missing auth id"), "fresh");

        let raw = fs::read_to_string(project.descriptor_path()).expect("unreadable descriptor");
        let value: Value = serde_json::from_str(&raw).expect("invalid descriptor");
        assert_eq!(value["projectName"], "demo");
    }

    #[test]
    fn missing_auth_id_is_an_error() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        fs::write(dir.path().join(MANIFEST_FILE), "<manifest/>").expect("unable to write manifest");
        fs::write(dir.path().join(DESCRIPTOR_FILE), r#"{"projectName": "demo"}"#)
            .expect("unable to write descriptor");

        let project = Project::locate(dir.path()).expect("project not found");

        assert!(matches!(
            project.default_auth_id(),
            Err(DescriptorError::MissingAuthId)
        ));
    }

    #[test]
    fn sandbox_markers_disable_production_classification() {
        assert!(!is_production("PROD-SB2"));
        assert!(!is_production("acct_sb1"));
        assert!(!is_production("my-sandbox-account"));
    }

    #[test]
    fn production_is_the_default_classification() {
        assert!(is_production("PROD"));
        assert!(is_production(""));
        assert!(is_production("release-tier"));
    }
}
