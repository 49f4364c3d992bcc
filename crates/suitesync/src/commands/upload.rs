use std::{fs, io};

use common::config::Config;
use derive_more::{Display, Error, From};
use tokio_util::sync::CancellationToken;

use crate::{
    commands::Upload,
    project::{Project, ProjectError},
    suitecloud::SuiteCloud,
    workflow::{self, Mode, WorkflowError},
};

/// `upload` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum UploadError {
    /// IO-related error.
    Io(io::Error),

    /// Project location error.
    Project(ProjectError),

    /// Configuration loading error.
    Figment(figment::Error),

    /// Unable to locate the SuiteCloud CLI binary.
    #[display(fmt = "unable to locate the SuiteCloud CLI: {}", _0)]
    Which(which::Error),

    /// Workflow error.
    Workflow(WorkflowError),
}

/// Upload flow entrypoint.
pub(crate) async fn upload(
    Upload { file, compare }: Upload,
    cancel: &CancellationToken,
) -> Result<(), UploadError> {
    let file = fs::canonicalize(&file)?;

    let project = Project::locate(&file)?;
    let config = Config::new(Some(project.root()))?;
    let tool = SuiteCloud::new(&config.suitecloud_binary, project.root())?;

    let mode = if compare {
        Mode::CompareAndUpload
    } else {
        Mode::Upload
    };

    workflow::run(&project, &config, &tool, &file, mode, cancel).await?;

    Ok(())
}
