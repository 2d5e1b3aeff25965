pub mod daemon;
pub mod next;
pub mod status;
pub mod sync;

use std::sync::Arc;

use clap::Subcommand;
use orgmirror_core::config::MirrorConfig;
use orgmirror_sync::engine::{EngineSettings, SyncEngine};
use orgmirror_sync::git_ops::{self, GitCli};
use tracing::warn;

use crate::settings::SettingsArgs;

#[derive(Subcommand)]
pub enum Command {
    /// Run forever, mirroring once a day at the configured time
    Daemon(daemon::DaemonArgs),
    /// Run one mirror cycle now and print a summary
    Sync,
    /// Show the local mirrors under the data directory
    Status,
    /// Show the next scheduled trigger times
    Next(next::NextArgs),
}

pub async fn run(cmd: Command, settings: &SettingsArgs) -> anyhow::Result<()> {
    match cmd {
        Command::Daemon(args) => daemon::run(args, settings).await,
        Command::Sync => sync::run(settings).await,
        Command::Status => status::run(settings),
        Command::Next(args) => next::run(args, settings),
    }
}

/// Wire the GitHub lister and the git executable into an engine.
pub fn build_engine(config: &MirrorConfig) -> anyhow::Result<SyncEngine> {
    let lister = orgmirror_host::create_lister(config)?;
    Ok(SyncEngine::new(
        Arc::from(lister),
        Arc::new(GitCli),
        EngineSettings::from(config),
    ))
}

/// Set the git identity used for any commits a pull creates.
pub fn configure_git(config: &MirrorConfig) {
    if let Err(e) = git_ops::configure_identity(&config.username, &config.email) {
        warn!("could not set git identity: {e}");
    }
}
