use std::sync::Arc;

use chrono::Utc;
use clap::Args;
use orgmirror_sync::scheduler::{DailyScheduler, SchedulerHandle};
use tracing::{info, warn};

use crate::settings::SettingsArgs;

#[derive(Args)]
pub struct DaemonArgs {
    /// Run one cycle immediately before waiting for the first trigger
    #[arg(long, env = "RUN_ON_START")]
    run_on_start: bool,
}

pub async fn run(args: DaemonArgs, settings: &SettingsArgs) -> anyhow::Result<()> {
    let config = settings.load()?;

    super::configure_git(&config);

    info!(
        "Using user {} with email {} for git.",
        config.username, config.email
    );
    info!(
        "Mirroring organization {} into {}",
        config.organization,
        config.data_dir.display()
    );
    info!("Current time: {}", Utc::now().with_timezone(&config.timezone));

    let engine = Arc::new(super::build_engine(&config)?);
    let scheduler = DailyScheduler::new(engine, config.timezone, config.backup_time);

    let (handle, shutdown) = SchedulerHandle::channel();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown requested");
        handle.stop();
    });

    if args.run_on_start {
        scheduler.run_once().await;
    }
    scheduler.run(shutdown).await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("cannot listen for SIGTERM: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
