use std::{fs, io};

use common::config::Config;
use derive_more::{Display, Error, From};
use tokio_util::sync::CancellationToken;

use crate::{
    commands::Compare,
    project::{Project, ProjectError},
    suitecloud::SuiteCloud,
    workflow::{self, Mode, WorkflowError},
};

/// `compare` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum CompareError {
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

/// Compare flow entrypoint.
pub(crate) async fn compare(
    Compare { file }: Compare,
    cancel: &CancellationToken,
) -> Result<(), CompareError> {
    let file = fs::canonicalize(&file)?;

    let project = Project::locate(&file)?;
    let config = Config::new(Some(project.root()))?;
    let tool = SuiteCloud::new(&config.suitecloud_binary, project.root())?;

    workflow::run(&project, &config, &tool, &file, Mode::Compare, cancel).await?;

    Ok(())
}
