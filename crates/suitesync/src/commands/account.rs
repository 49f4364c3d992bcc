use std::{env, io, time::Duration};

use common::config::Config;
use derive_more::{Display, Error, From};
use dialoguer::Select;
use indicatif::ProgressBar;
use tokio_util::sync::CancellationToken;

use crate::{
    commands::Account,
    project::{DescriptorError, Project, ProjectError},
    suitecloud::{SuiteCloud, ToolError},
};

/// `account` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum AccountError {
    /// IO-related error.
    Io(io::Error),

    /// Project location error.
    Project(ProjectError),

    /// Project descriptor error.
    Descriptor(DescriptorError),

    /// Configuration loading error.
    Figment(figment::Error),

    /// Unable to locate the SuiteCloud CLI binary.
    #[display(fmt = "unable to locate the SuiteCloud CLI: {}", _0)]
    Which(which::Error),

    /// External tool error.
    Tool(ToolError),

    /// Interactive prompt failure.
    Prompt(dialoguer::Error),

    /// The tool reported no authenticated profiles on this machine.
    #[display(fmt = "no authentication profiles found; run 'suitecloud account:setup' first")]
    NoProfiles,
}

/// A single authenticated profile reported by the tool.
#[derive(Debug, PartialEq, Eq)]
struct AuthProfile {
    /// Profile identifier usable as a `defaultAuthId`.
    auth_id: String,

    /// Free-form account description for display.
    info: String,
}

/// Account selection flow entrypoint.
pub(crate) async fn account(
    Account {}: Account,
    cancel: &CancellationToken,
) -> Result<(), AccountError> {
    let cwd = env::current_dir()?;

    let project = Project::locate(&cwd)?;
    let config = Config::new(Some(project.root()))?;
    let tool = SuiteCloud::new(&config.suitecloud_binary, project.root())?;

    let pg = ProgressBar::new_spinner();
    pg.enable_steady_tick(Duration::from_millis(150));
    pg.set_message("Listing authentication profiles...");

    let lines = tool
        .invoke_listing(project.root(), &["account:manageauth", "--list"], cancel)
        .await?;

    pg.finish_and_clear();

    let profiles = parse_profiles(&lines);
    if profiles.is_empty() {
        return Err(AccountError::NoProfiles);
    }

    let current = project.default_auth_id().ok();
    let default = current
        .as_deref()
        .and_then(|current| profiles.iter().position(|profile| profile.auth_id == current))
        .unwrap_or(0);

    let labels = profiles
        .iter()
        .map(|profile| {
            if profile.info.is_empty() {
                profile.auth_id.clone()
            } else {
                format!("{} ({})", profile.auth_id, profile.info)
            }
        })
        .collect::<Vec<_>>();

    let selection = Select::new()
        .with_prompt("Select the default account")
        .items(&labels)
        .default(default)
        .interact_opt()?;

    // A dismissed prompt leaves the descriptor untouched.
    let Some(index) = selection else {
        return Ok(());
    };

    project.set_default_auth_id(&profiles[index].auth_id)?;

    println!("Default account set to {}.", profiles[index].auth_id);

    Ok(())
}

/// Parse the tool's profile listing into structured entries.
///
/// Profile identifiers are single tokens; lines whose first column contains
/// whitespace are headers or decoration and get dropped.
fn parse_profiles(lines: &[String]) -> Vec<AuthProfile> {
    lines
        .iter()
        .filter_map(|line| {
            let (auth_id, info) = line.split_once('|')?;
            let auth_id = auth_id.trim();

            if auth_id.is_empty() || auth_id.contains(char::is_whitespace) {
                return None;
            }

            Some(AuthProfile {
                auth_id: auth_id.to_owned(),
                info: info.trim().to_owned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| String::from(*line)).collect()
    }

    #[test]
    fn parses_profile_rows() {
        let profiles = parse_profiles(&lines(&[
            "Auth ID | Account",
            "prod | Acme Inc - Administrator",
            "acme-sb1 | Acme Inc Sandbox 1",
        ]));

        assert_eq!(
            profiles,
            vec![
                AuthProfile {
                    auth_id: String::from("prod"),
                    info: String::from("Acme Inc - Administrator"),
                },
                AuthProfile {
                    auth_id: String::from("acme-sb1"),
                    info: String::from("Acme Inc Sandbox 1"),
                },
            ]
        );
    }

    #[test]
    fn lines_without_separator_are_dropped() {
        let profiles = parse_profiles(&lines(&[
            "The following authentication IDs are available:",
            "prod | Acme Inc",
        ]));

        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].auth_id, "prod");
    }

    #[test]
    fn empty_listing_yields_no_profiles() {
        assert!(parse_profiles(&[]).is_empty());
    }
}
