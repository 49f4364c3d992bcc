use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;

use crate::{
    pathmap::{CABINET_FOLDER, CONTENT_FOLDER, OBJECTS_FOLDER},
    project::{Project, DESCRIPTOR_FILE, MANIFEST_FILE},
};

/// Deploy descriptor staged next to the manifest for object deployments.
const DEPLOY_FILE: &str = "deploy.xml";

/// Deploy descriptor covering the sandbox's entire object tree.
const DEPLOY_OBJECTS: &str = "<deploy>
    <objects>
        <path>~/Objects/*</path>
    </objects>
</deploy>
";

/// A disposable project skeleton used to sandbox remote fetch and deploy
/// operations away from the real working tree.
///
/// Created fresh per operation, never reused. The backing directory is
/// deleted on drop, on every exit path.
pub(crate) struct Sandbox {
    /// Backing temporary directory.
    dir: TempDir,
}

impl Sandbox {
    /// Stage a fresh skeleton: copied manifest and descriptor files plus
    /// the expected empty content-folder tree.
    ///
    /// Missing source files surface as filesystem errors; no partial-state
    /// rollback is attempted since the whole directory is disposable.
    pub(crate) fn stage(project: &Project) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("suitesync-").tempdir()?;

        fs::copy(project.manifest_path(), dir.path().join(MANIFEST_FILE))?;
        fs::copy(project.descriptor_path(), dir.path().join(DESCRIPTOR_FILE))?;

        fs::create_dir_all(dir.path().join(CABINET_FOLDER).join(CONTENT_FOLDER))?;
        fs::create_dir_all(dir.path().join(OBJECTS_FOLDER))?;

        Ok(Self { dir })
    }

    /// Sandbox root directory.
    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Location of the object tree inside the sandbox.
    pub(crate) fn objects(&self) -> PathBuf {
        self.dir.path().join(OBJECTS_FOLDER)
    }

    /// Copy a metadata-object definition into the sandbox's object tree.
    pub(crate) fn stage_object(&self, source: &Path) -> io::Result<PathBuf> {
        let file_name = source.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "object path has no file name")
        })?;

        let destination = self.objects().join(file_name);
        fs::copy(source, &destination)?;

        Ok(destination)
    }

    /// Write the deploy descriptor covering the staged object tree.
    pub(crate) fn write_deploy_descriptor(&self) -> io::Result<()> {
        fs::write(self.dir.path().join(DEPLOY_FILE), DEPLOY_OBJECTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_project() -> (tempfile::TempDir, Project) {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        fs::write(dir.path().join(MANIFEST_FILE), "<manifest/>").expect("unable to write manifest");
        fs::write(dir.path().join(DESCRIPTOR_FILE), r#"{"defaultAuthId": "sb"}"#)
            .expect("unable to write descriptor");

        let project = Project::locate(dir.path()).expect("project not found");
        (dir, project)
    }

    #[test]
    fn stages_the_expected_skeleton() {
        let (_dir, project) = fixture_project();
        let sandbox = Sandbox::stage(&project).expect("unable to stage sandbox");

        assert!(sandbox.path().join(MANIFEST_FILE).is_file());
        assert!(sandbox.path().join(DESCRIPTOR_FILE).is_file());
        assert!(sandbox
            .path()
            .join(CABINET_FOLDER)
            .join(CONTENT_FOLDER)
            .is_dir());
        assert!(sandbox.objects().is_dir());
    }

    #[test]
    fn removed_on_drop() {
        let (_dir, project) = fixture_project();
        let sandbox = Sandbox::stage(&project).expect("unable to stage sandbox");
        let path = sandbox.path().to_path_buf();

        drop(sandbox);

        assert!(!path.exists());
    }

    #[test]
    fn missing_descriptor_surfaces_as_error() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        fs::write(dir.path().join(MANIFEST_FILE), "<manifest/>").expect("unable to write manifest");

        let project = Project::locate(dir.path()).expect("project not found");

        assert!(Sandbox::stage(&project).is_err());
    }

    #[test]
    fn stages_objects_and_deploy_descriptor() {
        let (dir, project) = fixture_project();
        let object = dir.path().join("customscript_foo.xml");
        fs::write(&object, "<clientscript scriptid=\"customscript_foo\"/>")
            .expect("unable to write object");

        let sandbox = Sandbox::stage(&project).expect("unable to stage sandbox");
        let staged = sandbox.stage_object(&object).expect("unable to stage object");
        sandbox
            .write_deploy_descriptor()
            .expect("unable to write deploy descriptor");

        assert!(staged.is_file());
        assert!(sandbox.path().join(DEPLOY_FILE).is_file());
    }
}
