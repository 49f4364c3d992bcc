use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use console::style;
use derive_more::{Display, Error, From};
use dialoguer::Confirm;
use indicatif::ProgressBar;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use walkdir::WalkDir;

use common::config::Config;

use crate::{
    cancel::Cancelled,
    diff,
    object::{self, ObjectMetadataError},
    pathmap::{self, PathMapError, OBJECTS_FOLDER},
    project::{self, DescriptorError, Project},
    sandbox::Sandbox,
    suitecloud::{SuiteCloud, ToolError, ToolOutput, STATE_DIR},
    transpile::{self, TranspileError},
};

/// Lock file guarding against concurrent workflow invocations per project
/// root.
const LOCK_FILE: &str = "lock";

/// How a workflow invocation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Compare only; never upload.
    Compare,

    /// Upload, comparing first only when the target forces it.
    Upload,

    /// Compare, then upload after explicit confirmation.
    CompareAndUpload,
}

/// Workflow errors.
#[derive(Debug, Display, Error, From)]
pub(crate) enum WorkflowError {
    /// IO-related error.
    Io(io::Error),

    /// Project descriptor error.
    Descriptor(DescriptorError),

    /// Path mapping error.
    PathMap(PathMapError),

    /// Metadata-object inspection error.
    Object(ObjectMetadataError),

    /// External tool error.
    Tool(ToolError),

    /// Transpilation error.
    Transpile(TranspileError),

    /// Operation was cancelled cooperatively.
    Cancelled(Cancelled),

    /// Interactive prompt failure.
    Prompt(dialoguer::Error),

    /// Another workflow already holds the project lock.
    #[display(fmt = "another suitesync operation is already running for this project")]
    AlreadyRunning,

    /// The artifact is neither a script source nor a recognized metadata
    /// object.
    #[display(fmt = "{} is neither a SuiteScript source nor a metadata object", "_0.display()")]
    #[from(ignore)]
    UnsupportedFile(#[error(not(source))] PathBuf),

    /// The artifact disappeared before the workflow could read it.
    #[display(fmt = "{} does not exist or is not readable", "_0.display()")]
    #[from(ignore)]
    SourceMissing(#[error(not(source))] PathBuf),
}

/// Classified artifact kind for a workflow invocation.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Artifact {
    /// Script source or compiled companion under the content folder.
    Script {
        /// Absolute local path.
        local: PathBuf,

        /// `true` for a `.ts` source that needs transpilation.
        typescript: bool,
    },

    /// Metadata-object XML definition under the objects folder.
    Object {
        /// Absolute local path.
        local: PathBuf,
    },
}

/// Classify the active file into the script or object path.
///
/// Containment inside the content folder is enforced later by the path
/// mapper; this only decides which flow handles the file.
pub(crate) fn classify(project: &Project, file: &Path) -> Result<Artifact, WorkflowError> {
    let objects_dir = project.root().join(OBJECTS_FOLDER);

    if file.starts_with(&objects_dir) {
        if file.extension().and_then(|ext| ext.to_str()) == Some("xml") {
            return Ok(Artifact::Object {
                local: file.to_path_buf(),
            });
        }

        return Err(WorkflowError::UnsupportedFile(file.to_path_buf()));
    }

    match file.extension().and_then(|ext| ext.to_str()) {
        Some("ts") => Ok(Artifact::Script {
            local: file.to_path_buf(),
            typescript: true,
        }),
        Some("js") => Ok(Artifact::Script {
            local: file.to_path_buf(),
            typescript: false,
        }),
        _ => Err(WorkflowError::UnsupportedFile(file.to_path_buf())),
    }
}

/// Single-slot lock rejecting a second concurrent invocation per project
/// root.
pub(crate) struct WorkflowLock {
    /// Lock file location.
    path: PathBuf,
}

impl WorkflowLock {
    /// Acquire the lock, failing fast when it is already held.
    pub(crate) fn acquire(project: &Project) -> Result<Self, WorkflowError> {
        let dir = project.root().join(STATE_DIR);
        fs::create_dir_all(&dir)?;

        let path = dir.join(LOCK_FILE);

        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                Err(WorkflowError::AlreadyRunning)
            }
            Err(error) => Err(error.into()),
        }
    }
}

impl Drop for WorkflowLock {
    fn drop(&mut self) {
        // Best effort; cleanup must not mask the workflow's own outcome.
        let _ = fs::remove_file(&self.path);
    }
}

/// Whether the workflow must stop at the confirmation step before uploading.
pub(crate) fn needs_confirmation(mode: Mode, production: bool, guard_enabled: bool) -> bool {
    match mode {
        Mode::Compare => false,
        Mode::CompareAndUpload => true,
        Mode::Upload => production && guard_enabled,
    }
}

/// What the compare-fetch learned about the remote counterpart.
#[derive(Debug)]
enum RemoteState {
    /// Fetched into the sandbox at this location.
    Present(PathBuf),

    /// The fetch succeeded but produced no file; the counterpart does not
    /// exist remotely.
    Missing,

    /// The fetch itself failed; nothing is known about the remote side.
    Unknown,
}

/// Interpret a compare-fetch outcome.
///
/// Cancellation propagates. Any other tool failure leaves the remote state
/// unknown instead of being conflated with a genuinely absent counterpart,
/// so a confirmation prompt is never based on a diff built from a failed
/// fetch.
fn fetched_remote(
    fetch: Result<ToolOutput, ToolError>,
    fetched_file: Option<PathBuf>,
) -> Result<RemoteState, WorkflowError> {
    match fetch {
        Ok(_) => match fetched_file {
            Some(path) => Ok(RemoteState::Present(path)),
            None => Ok(RemoteState::Missing),
        },
        Err(ToolError::Cancelled(cancelled)) => Err(cancelled.into()),
        Err(error) => {
            warn!(%error, "remote fetch failed; remote state is unknown");
            Ok(RemoteState::Unknown)
        }
    }
}

/// Shared state of a single workflow invocation.
struct Invocation<'a> {
    /// Located project.
    project: &'a Project,

    /// Effective configuration.
    config: &'a Config,

    /// External tool handle.
    tool: &'a SuiteCloud,

    /// Cooperative cancellation signal for the whole invocation.
    cancel: &'a CancellationToken,

    /// Resolved target account identifier.
    auth_id: String,

    /// Whether the target classifies as production-like.
    production: bool,

    /// Requested mode.
    mode: Mode,
}

/// Run the compare/confirm/upload workflow for a single file.
pub(crate) async fn run(
    project: &Project,
    config: &Config,
    tool: &SuiteCloud,
    file: &Path,
    mode: Mode,
    cancel: &CancellationToken,
) -> Result<(), WorkflowError> {
    let _lock = WorkflowLock::acquire(project)?;

    if !file.is_file() {
        return Err(WorkflowError::SourceMissing(file.to_path_buf()));
    }

    let auth_id = project.default_auth_id()?;
    let production = project::is_production(&auth_id);

    let invocation = Invocation {
        project,
        config,
        tool,
        cancel,
        auth_id,
        production,
        mode,
    };

    match classify(project, file)? {
        Artifact::Script { local, typescript } => script_flow(&invocation, local, typescript).await,
        Artifact::Object { local } => object_flow(&invocation, local).await,
    }
}

/// Compare/confirm/upload flow for script sources and their compiled
/// companions.
async fn script_flow(
    invocation: &Invocation<'_>,
    local: PathBuf,
    typescript: bool,
) -> Result<(), WorkflowError> {
    let root = invocation.project.root();
    let source_remote = pathmap::local_to_remote(root, &local)?;

    let progress = spinner();

    // Always recompile so the compiled companion reflects the latest edits.
    let (upload_local, upload_remote) = if typescript {
        progress.set_message("Transpiling...");
        let compiled = transpile::transpile(
            &invocation.config.tsc_binary,
            root,
            &local,
            invocation.cancel,
        )
        .await?;
        let compiled_remote = pathmap::local_to_remote(root, &compiled)?;
        (compiled, compiled_remote)
    } else {
        (local.clone(), source_remote.clone())
    };

    let (diff_local, diff_remote) = if typescript && !invocation.config.compare_transpiled {
        (&local, &source_remote)
    } else {
        (&upload_local, &upload_remote)
    };

    let confirm = needs_confirmation(
        invocation.mode,
        invocation.production,
        invocation.config.production_guard,
    );
    let comparing = matches!(invocation.mode, Mode::Compare | Mode::CompareAndUpload) || confirm;

    if comparing {
        progress.set_message("Fetching remote counterpart...");

        let sandbox = Sandbox::stage(invocation.project)?;
        let fetch = invocation
            .tool
            .invoke(
                sandbox.path(),
                &["file:import", "--paths", diff_remote.as_str()],
                invocation.cancel,
            )
            .await;

        let fetched = pathmap::remote_to_local(sandbox.path(), diff_remote);
        let state = fetched_remote(fetch, fetched.is_file().then_some(fetched))?;

        let remote_content = match &state {
            RemoteState::Present(path) => Some(fs::read_to_string(path)?),
            _ => None,
        };

        let local_content = fs::read_to_string(diff_local)?;

        progress.suspend(|| match &remote_content {
            Some(remote) => {
                diff::print_diff(diff_remote, &local_content, remote);
            }
            None if matches!(state, RemoteState::Unknown) => {
                println!("{diff_remote}: unable to fetch the remote counterpart; diff skipped")
            }
            None => println!("{diff_remote}: no remote counterpart (new file)"),
        });
    }

    if invocation.mode == Mode::Compare {
        progress.finish_and_clear();
        return Ok(());
    }

    let mut remote_paths = vec![upload_remote];
    if typescript {
        // The source travels along with its compiled companion.
        remote_paths.push(source_remote);
    }

    if confirm {
        progress.finish_and_clear();

        if !confirm_upload(&invocation.auth_id, invocation.production, &remote_paths)? {
            println!("Upload aborted; nothing was written to {}.", invocation.auth_id);
            return Ok(());
        }
    }

    progress.set_message("Uploading...");

    let mut args = vec!["file:upload", "--paths"];
    args.extend(remote_paths.iter().map(String::as_str));

    invocation.tool.invoke(root, &args, invocation.cancel).await?;

    progress.finish_and_clear();
    println!(
        "Uploaded {} to {}.",
        remote_paths.join(", "),
        invocation.auth_id
    );

    Ok(())
}

/// Compare/confirm/deploy flow for metadata-object definitions.
async fn object_flow(invocation: &Invocation<'_>, local: PathBuf) -> Result<(), WorkflowError> {
    let metadata = object::extract(&local)?;

    let progress = spinner();

    let confirm = needs_confirmation(
        invocation.mode,
        invocation.production,
        invocation.config.production_guard,
    );
    let comparing = matches!(invocation.mode, Mode::Compare | Mode::CompareAndUpload) || confirm;

    let remote_label = format!("/{}/{}.xml", OBJECTS_FOLDER, metadata.script_id);

    if comparing {
        progress.set_message("Fetching remote object...");

        let sandbox = Sandbox::stage(invocation.project)?;
        let destination = format!("/{OBJECTS_FOLDER}");
        let fetch = invocation
            .tool
            .invoke(
                sandbox.path(),
                &[
                    "object:import",
                    "--scriptid",
                    metadata.script_id.as_str(),
                    "--type",
                    metadata.kind.as_str(),
                    "--destinationfolder",
                    destination.as_str(),
                ],
                invocation.cancel,
            )
            .await;

        let fetched = find_fetched_object(&sandbox.objects(), &metadata.script_id);
        let state = fetched_remote(fetch, fetched)?;

        let local_content = fs::read_to_string(&local)?;
        let remote_content = match &state {
            RemoteState::Present(path) => Some(fs::read_to_string(path)?),
            _ => None,
        };

        progress.suspend(|| match &remote_content {
            Some(remote) => {
                diff::print_diff(&remote_label, &local_content, remote);
            }
            None if matches!(state, RemoteState::Unknown) => println!(
                "{}: unable to fetch the remote object; diff skipped",
                metadata.script_id
            ),
            None => println!("{}: no remote counterpart (new object)", metadata.script_id),
        });
    }

    if invocation.mode == Mode::Compare {
        progress.finish_and_clear();
        return Ok(());
    }

    if confirm {
        progress.finish_and_clear();

        if !confirm_upload(
            &invocation.auth_id,
            invocation.production,
            std::slice::from_ref(&remote_label),
        )? {
            println!("Upload aborted; nothing was written to {}.", invocation.auth_id);
            return Ok(());
        }
    }

    // Deploy through a fresh sandbox: stage the object plus a deploy
    // descriptor, resolve dependencies, then deploy the whole workspace.
    progress.set_message("Deploying...");

    let sandbox = Sandbox::stage(invocation.project)?;
    sandbox.stage_object(&local)?;
    sandbox.write_deploy_descriptor()?;

    invocation
        .tool
        .invoke(sandbox.path(), &["project:adddependencies"], invocation.cancel)
        .await?;
    invocation
        .tool
        .invoke(sandbox.path(), &["project:deploy"], invocation.cancel)
        .await?;

    progress.finish_and_clear();
    println!(
        "Deployed {} ({}) to {}.",
        metadata.script_id, metadata.kind, invocation.auth_id
    );

    Ok(())
}

/// Present the destination account and the remote paths that would be
/// written; an explicit "yes" is required.
///
/// Dismissing the prompt counts as decline.
fn confirm_upload(
    auth_id: &str,
    production: bool,
    remote_paths: &[String],
) -> Result<bool, WorkflowError> {
    let target = if production {
        style(format!("{auth_id} (PRODUCTION)")).red().bold().to_string()
    } else {
        auth_id.to_string()
    };

    println!("About to upload to {target}:");
    for path in remote_paths {
        println!("  {path}");
    }

    let confirmed = Confirm::new()
        .with_prompt("Upload these files?")
        .default(false)
        .interact_opt()?
        .unwrap_or(false);

    Ok(confirmed)
}

/// Best-effort match of an imported object file by its script id.
fn find_fetched_object(objects_dir: &Path, script_id: &str) -> Option<PathBuf> {
    WalkDir::new(objects_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| entry.file_name().to_string_lossy().contains(script_id))
        .map(|entry| entry.into_path())
}

/// Progress spinner shared by both flows.
fn spinner() -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    progress.enable_steady_tick(Duration::from_millis(150));
    progress
}
