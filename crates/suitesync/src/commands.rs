/// `account` subcommand.
mod account;

/// `compare` subcommand.
mod compare;

/// `import` subcommand.
mod import;

/// `import-objects` subcommand.
mod objects;

/// `upload` subcommand.
mod upload;

pub(crate) use account::account;
pub(crate) use compare::compare;
pub(crate) use import::import;
pub(crate) use objects::import_objects;
pub(crate) use upload::upload;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// CLI configuration.
#[derive(Parser)]
#[command(about)]
pub(crate) struct Cli {
    /// Selected subcommand.
    #[command(subcommand)]
    pub command: Commands,
}

/// Supported subcommands.
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Compare a local file against its remote counterpart.
    Compare(Compare),

    /// Upload a local file to the configured account.
    Upload(Upload),

    /// Select the default account from the authenticated profiles.
    Account(Account),

    /// Import remote files into the local content folder.
    Import(Import),

    /// Import metadata objects into the local object folder.
    ImportObjects(ImportObjects),
}

/// `compare` subcommand configuration.
#[derive(Args)]
pub struct Compare {
    /// File to compare.
    file: PathBuf,
}

/// `upload` subcommand configuration.
#[derive(Args)]
pub struct Upload {
    /// File to upload.
    file: PathBuf,

    /// Show the diff and ask for confirmation even for sandbox targets.
    #[arg(short, long)]
    compare: bool,
}

/// `account` subcommand configuration.
#[derive(Args)]
pub struct Account {}

/// `import` subcommand configuration.
#[derive(Args)]
pub struct Import {
    /// Remote paths to import; interactive selection when omitted.
    paths: Vec<String>,
}

/// `import-objects` subcommand configuration.
#[derive(Args)]
pub struct ImportObjects {
    /// Restrict the listing to a single object type.
    #[arg(short = 't', long = "type")]
    object_type: Option<String>,
}
