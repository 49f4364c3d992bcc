//! # suitesync
//!
//! Terminal companion for SuiteScript projects: compares and uploads local
//! source files and metadata-object XML definitions against a remote account,
//! delegating every remote operation to the external SuiteCloud CLI.
//!
//! Remote fetches land in disposable sandbox workspaces so that fetched
//! content never overwrites the real working tree, and uploads to
//! production-like accounts are gated behind an explicit diff-and-confirm
//! step.

#![deny(missing_docs)]

use clap::Parser;
use commands::{Cli, Commands};
use common::config::Config;
use tokio_util::sync::CancellationToken;

/// Distinguished cancellation outcome.
mod cancel;

/// CLI subcommands.
mod commands;

/// Terminal diff rendering.
mod diff;

/// Metadata-object XML inspection.
mod object;

/// Local/remote path mapping.
mod pathmap;

/// Project root location and descriptor handling.
mod project;

/// Ephemeral sandbox workspaces.
mod sandbox;

/// External SuiteCloud CLI invocation.
mod suitecloud;

/// TypeScript transpilation.
mod transpile;

/// Compare/confirm/upload orchestration.
mod workflow;

/// CLI entrypoint.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // The logging level may come from the environment before any project
    // root is known; per-project configuration is loaded by each command.
    common::logging::init(&Config::new(None)?);

    let cancel = CancellationToken::new();

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let result = match cli.command {
        Commands::Compare(args) => commands::compare(args, &cancel)
            .await
            .map_err(anyhow::Error::from),
        Commands::Upload(args) => commands::upload(args, &cancel)
            .await
            .map_err(anyhow::Error::from),
        Commands::Account(args) => commands::account(args, &cancel)
            .await
            .map_err(anyhow::Error::from),
        Commands::Import(args) => commands::import(args, &cancel)
            .await
            .map_err(anyhow::Error::from),
        Commands::ImportObjects(args) => commands::import_objects(args, &cancel)
            .await
            .map_err(anyhow::Error::from),
    };

    match result {
        Ok(()) => Ok(()),
        // Cancellation is a silent abort, not a reported failure.
        Err(error)
            if error
                .chain()
                .any(|cause| cause.downcast_ref::<cancel::Cancelled>().is_some()) =>
        {
            Ok(())
        }
        Err(error) => Err(error),
    }
}
