use std::{env, io, time::Duration};

use common::config::Config;
use derive_more::{Display, Error, From};
use dialoguer::{Confirm, MultiSelect};
use indicatif::ProgressBar;
use tokio_util::sync::CancellationToken;

use crate::{
    cancel::Cancelled,
    commands::ImportObjects,
    pathmap::OBJECTS_FOLDER,
    project::{Project, ProjectError},
    suitecloud::{SuiteCloud, ToolError},
};

/// `import-objects` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum ImportObjectsError {
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

    /// The account has no matching objects to offer.
    #[display(fmt = "no matching metadata objects found in the account")]
    NothingToImport,
}

/// A remote metadata object reported by the listing.
#[derive(Debug, PartialEq, Eq)]
struct RemoteObject {
    /// Object type, e.g. `clientscript`.
    kind: String,

    /// Declared script id of the object.
    script_id: String,
}

/// Object import flow entrypoint.
pub(crate) async fn import_objects(
    ImportObjects { object_type }: ImportObjects,
    cancel: &CancellationToken,
) -> Result<(), ImportObjectsError> {
    let cwd = env::current_dir()?;

    let project = Project::locate(&cwd)?;
    let config = Config::new(Some(project.root()))?;
    let tool = SuiteCloud::new(&config.suitecloud_binary, project.root())?;

    let pg = ProgressBar::new_spinner();
    pg.enable_steady_tick(Duration::from_millis(150));
    pg.set_message("Listing remote objects...");

    let mut args = vec!["object:list"];
    if let Some(object_type) = &object_type {
        args.extend(["--type", object_type.as_str()]);
    }

    let lines = tool.invoke_listing(project.root(), &args, cancel).await?;

    pg.finish_and_clear();

    let objects = parse_objects(&lines);
    if objects.is_empty() {
        return Err(ImportObjectsError::NothingToImport);
    }

    let labels = objects
        .iter()
        .map(|object| format!("{} ({})", object.script_id, object.kind))
        .collect::<Vec<_>>();

    let selection = MultiSelect::new()
        .with_prompt("Select the objects to import")
        .items(&labels)
        .interact_opt()?;

    let Some(indices) = selection else {
        return Ok(());
    };

    if indices.is_empty() {
        println!("Nothing selected; no local files were touched.");
        return Ok(());
    }

    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Importing overwrites the local copies of {} object(s). Continue?",
            indices.len()
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

    let destination = format!("/{OBJECTS_FOLDER}");
    let mut imported = 0;

    for index in indices {
        if cancel.is_cancelled() {
            pg.finish_and_clear();
            return Err(Cancelled.into());
        }

        let object = &objects[index];

        pg.set_message(format!("Importing {}...", object.script_id));

        tool.invoke(
            project.root(),
            &[
                "object:import",
                "--scriptid",
                object.script_id.as_str(),
                "--type",
                object.kind.as_str(),
                "--destinationfolder",
                destination.as_str(),
            ],
            cancel,
        )
        .await?;

        imported += 1;
    }

    pg.finish_and_clear();
    println!("Imported {imported} object(s).");

    Ok(())
}

/// Parse the tool's object listing into structured entries.
///
/// Listing rows have the `type:scriptid` shape; both halves are single
/// tokens, so anything with whitespace is framing and gets dropped.
fn parse_objects(lines: &[String]) -> Vec<RemoteObject> {
    lines
        .iter()
        .filter_map(|line| {
            let (kind, script_id) = line.split_once(':')?;
            let kind = kind.trim();
            let script_id = script_id.trim();

            if kind.is_empty()
                || script_id.is_empty()
                || kind.contains(char::is_whitespace)
                || script_id.contains(char::is_whitespace)
            {
                return None;
            }

            Some(RemoteObject {
                kind: kind.to_owned(),
                script_id: script_id.to_owned(),
            })
        })
        .collect()
}
