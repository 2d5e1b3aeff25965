use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn, Instrument, Span};

use orgmirror_core::config::{MirrorConfig, Secret};
use orgmirror_core::credentials::transfer_url;
use orgmirror_core::error::MirrorError;
use orgmirror_core::models::cycle::{format_duration, CycleReport, RepoOutcome, SyncAction, SyncStatus};
use orgmirror_core::models::repo::RepositoryDescriptor;
use orgmirror_host::RepoLister;

use crate::git_ops::{self, Transfer};

/// What the engine needs to know about a run, taken from [`MirrorConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub organization: String,
    pub username: String,
    pub token: Secret,
    pub data_dir: PathBuf,
    pub timezone: Tz,
    pub concurrency: usize,
    pub include_archived: bool,
}

impl From<&MirrorConfig> for EngineSettings {
    fn from(config: &MirrorConfig) -> Self {
        Self {
            organization: config.organization.clone(),
            username: config.username.clone(),
            token: config.access_token.clone(),
            data_dir: config.data_dir.clone(),
            timezone: config.timezone,
            concurrency: config.concurrency,
            include_archived: config.include_archived,
        }
    }
}

/// Runs sync cycles: list the organization, then clone or pull every repo.
pub struct SyncEngine {
    lister: Arc<dyn RepoLister>,
    transfer: Arc<dyn Transfer>,
    settings: EngineSettings,
}

impl SyncEngine {
    pub fn new(
        lister: Arc<dyn RepoLister>,
        transfer: Arc<dyn Transfer>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            lister,
            transfer,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run one full cycle.
    ///
    /// Only a failure to provision the data directory or to list the
    /// organization is returned as an error; per-repository failures are
    /// recorded in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport, MirrorError> {
        let report = CycleReport::new(Utc::now());
        let span = info_span!("cycle", id = %report.id);
        self.run_cycle_inner(report).instrument(span).await
    }

    async fn run_cycle_inner(&self, mut report: CycleReport) -> Result<CycleReport, MirrorError> {
        let tz = self.settings.timezone;
        info!("Start backup at {}", report.started_at.with_timezone(&tz));

        if let Err(e) = tokio::fs::create_dir_all(&self.settings.data_dir).await {
            error!(
                "cannot create data directory {}: {e}",
                self.settings.data_dir.display()
            );
            return Err(e.into());
        }

        let repos = match self.lister.list_repos(&self.settings.organization).await {
            Ok(repos) => repos,
            Err(e) => {
                error!("Error fetching repositories for {}: {e}", self.settings.organization);
                return Err(e);
            }
        };
        info!("{} repositories listed for {}", repos.len(), self.settings.organization);

        report.outcomes = self.sync_all(repos).await;
        report.finished_at = Utc::now();

        log_report(&report, tz);
        Ok(report)
    }

    /// Clone or pull every repo on a bounded pool. Outcomes keep listing order.
    async fn sync_all(&self, repos: Vec<RepositoryDescriptor>) -> Vec<RepoOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut slots: Vec<Slot> = Vec::with_capacity(repos.len());

        for repo in repos {
            if let Some(reason) = self.skip_reason(&repo) {
                info!("Skipping {}: {reason}", repo.name);
                slots.push(Slot::Done(RepoOutcome::skipped(repo.name, SyncAction::Clone, reason)));
                continue;
            }

            let action = if git_ops::is_working_copy(&self.settings.data_dir, &repo.name) {
                SyncAction::Pull
            } else {
                SyncAction::Clone
            };

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let transfer = self.transfer.clone();
            let root = self.settings.data_dir.clone();
            let username = self.settings.username.clone();
            let token = self.settings.token.clone();
            let name = repo.name.clone();

            let span = Span::current();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                span.in_scope(|| sync_repo(transfer.as_ref(), &root, &repo, &username, &token))
            });
            slots.push(Slot::Running { name, action, handle });
        }

        let mut outcomes = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Slot::Done(outcome) => outcomes.push(outcome),
                Slot::Running { name, action, handle } => match handle.await {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => {
                        error!("! Sync task for {name} aborted: {e}");
                        outcomes.push(RepoOutcome::failed(
                            name,
                            action,
                            format!("sync task aborted: {e}"),
                            std::time::Duration::ZERO,
                        ));
                    }
                },
            }
        }
        outcomes
    }

    fn skip_reason(&self, repo: &RepositoryDescriptor) -> Option<&'static str> {
        if !is_safe_name(&repo.name) {
            return Some("invalid repository name");
        }
        if repo.archived && !self.settings.include_archived {
            return Some("archived");
        }
        None
    }
}

enum Slot {
    Done(RepoOutcome),
    Running {
        name: String,
        action: SyncAction,
        handle: tokio::task::JoinHandle<RepoOutcome>,
    },
}

/// A repo name must stay a single directory below the data root.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).components().count() == 1
}

/// Mirror one repository. Never panics on transfer failure; the outcome says
/// what happened.
pub fn sync_repo(
    transfer: &dyn Transfer,
    root: &Path,
    repo: &RepositoryDescriptor,
    username: &str,
    token: &Secret,
) -> RepoOutcome {
    let url = transfer_url(&repo.clone_url, username, token.expose());
    let dest = root.join(&repo.name);
    let started = Instant::now();

    if git_ops::is_working_copy(root, &repo.name) {
        info!("Updating {} ({})", repo.name, url);
        match transfer.pull_into(&url, &dest) {
            Ok(()) => {
                info!("{} is updated", repo.name);
                RepoOutcome::success(&repo.name, SyncAction::Pull, started.elapsed())
            }
            Err(e) => {
                warn!("! Failed to update {}: {e}", repo.name);
                RepoOutcome::failed(&repo.name, SyncAction::Pull, e.to_string(), started.elapsed())
            }
        }
    } else {
        info!("Cloning {} ({})", repo.name, url);
        match transfer.clone_into(&url, &dest) {
            Ok(()) => {
                info!("{} is cloned", repo.name);
                RepoOutcome::success(&repo.name, SyncAction::Clone, started.elapsed())
            }
            Err(e) => {
                warn!("! Failed to clone {}: {e}", repo.name);
                RepoOutcome::failed(&repo.name, SyncAction::Clone, e.to_string(), started.elapsed())
            }
        }
    }
}

fn log_report(report: &CycleReport, tz: Tz) {
    info!("Ready at {}", report.finished_at.with_timezone(&tz));
    info!(
        "{} synced | {} failed | {} skipped",
        report.count(SyncStatus::Success),
        report.count(SyncStatus::Failed),
        report.count(SyncStatus::Skipped)
    );
    let failed = report.failed_names();
    if !failed.is_empty() {
        warn!("Failed repositories: {}", failed.join(", "));
    }
    info!("The backup took {}", format_duration(report.elapsed()));
}
