use std::{env, io, time::Duration};

use common::config::Config;
use derive_more::{Display, Error, From};
use dialoguer::{Confirm, MultiSelect};
use indicatif::ProgressBar;
use itertools::Itertools;
use tokio_util::sync::CancellationToken;

use crate::{
    cancel::Cancelled,
    commands::Import,
    pathmap::CONTENT_FOLDER,
    project::{Project, ProjectError},
    suitecloud::{SuiteCloud, ToolError},
};

/// How many remote paths go into a single tool invocation.
///
/// The tool accepts arbitrarily many paths but degrades badly on long
/// argument lists; chunking also keeps cancellation responsive between
/// invocations.
const IMPORT_CHUNK_SIZE: usize = 10;

/// `import` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum ImportError {
    /// IO-related error.
    Io(io::Error),

    /// Project location error.
    Project(ProjectError),

    /// Configuration loading error.
    Figment(figment::Error),

    /// Unable to locate the SuiteCloud CLI binary.
    #[display(fmt = "unable to locate the SuiteCloud CLI: {}", _0)]
    Which(which::Error),

    /// External tool error.
    Tool(ToolError),

    /// Interactive prompt failure.
    Prompt(dialoguer::Error),

    /// Operation was cancelled cooperatively.
    Cancelled(Cancelled),

    /// The remote content folder has nothing to offer.
    #[display(fmt = "no files found under '/SuiteScripts' in the account")]
    NothingToImport,
}

/// Import flow entrypoint.
pub(crate) async fn import(
    Import { paths }: Import,
    cancel: &CancellationToken,
) -> Result<(), ImportError> {
    let cwd = env::current_dir()?;

    let project = Project::locate(&cwd)?;
    let config = Config::new(Some(project.root()))?;
    let tool = SuiteCloud::new(&config.suitecloud_binary, project.root())?;

    let paths = if paths.is_empty() {
        let Some(selected) = select_remote_paths(&project, &tool, cancel).await? else {
            return Ok(());
        };
        selected
    } else {
        paths
    };

    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Importing overwrites the local copies of {} file(s). Continue?",
            paths.len()
        ))
        .default(false)
        .interact_opt()?
        .unwrap_or(false);

    if !confirmed {
        println!("Import aborted; no local files were touched.");
        return Ok(());
    }

    let pg = ProgressBar::new_spinner();
    pg.enable_steady_tick(Duration::from_millis(150));

    let mut imported = 0;

    for chunk in &paths.iter().chunks(IMPORT_CHUNK_SIZE) {
        if cancel.is_cancelled() {
            pg.finish_and_clear();
            return Err(Cancelled.into());
        }

        let chunk = chunk.map(String::as_str).collect::<Vec<_>>();

        pg.set_message(format!("Importing... ({imported}/{} done)", paths.len()));

        let mut args = vec!["file:import", "--paths"];
        args.extend(&chunk);

        tool.invoke(project.root(), &args, cancel).await?;

        imported += chunk.len();
    }

    pg.finish_and_clear();
    println!("Imported {imported} file(s).");

    Ok(())
}

/// List the remote content folder and let the user pick paths to import.
///
/// Resolves to [`None`] when the prompt was dismissed or nothing was
/// selected.
async fn select_remote_paths(
    project: &Project,
    tool: &SuiteCloud,
    cancel: &CancellationToken,
) -> Result<Option<Vec<String>>, ImportError> {
    let pg = ProgressBar::new_spinner();
    pg.enable_steady_tick(Duration::from_millis(150));
    pg.set_message("Listing remote files...");

    let folder = format!("/{CONTENT_FOLDER}");
    let lines = tool
        .invoke_listing(project.root(), &["file:list", "--folder", &folder], cancel)
        .await?;

    pg.finish_and_clear();

    // Remote paths are absolute; everything else in the output is framing.
    let candidates = lines
        .into_iter()
        .filter(|line| line.starts_with('/'))
        .collect::<Vec<_>>();

    if candidates.is_empty() {
        return Err(ImportError::NothingToImport);
    }

    let selection = MultiSelect::new()
        .with_prompt("Select the files to import")
        .items(&candidates)
        .interact_opt()?;

    let Some(indices) = selection else {
        return Ok(None);
    };

    if indices.is_empty() {
        println!("Nothing selected; no local files were touched.");
        return Ok(None);
    }

    Ok(Some(
        indices
            .into_iter()
            .map(|index| candidates[index].clone())
            .collect(),
    ))
}
