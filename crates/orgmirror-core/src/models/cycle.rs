use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Which transfer was chosen for a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Clone,
    Pull,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncAction::Clone => write!(f, "clone"),
            SyncAction::Pull => write!(f, "pull"),
        }
    }
}

/// Status of a single repository transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Success,
    Failed,
    Skipped,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Success => write!(f, "success"),
            SyncStatus::Failed => write!(f, "failed"),
            SyncStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of mirroring one repository during a cycle.
#[derive(Debug, Clone)]
pub struct RepoOutcome {
    pub name: String,
    pub action: SyncAction,
    pub status: SyncStatus,
    pub error: Option<String>,
    pub duration: Duration,
}

impl RepoOutcome {
    pub fn success(name: impl Into<String>, action: SyncAction, duration: Duration) -> Self {
        Self {
            name: name.into(),
            action,
            status: SyncStatus::Success,
            error: None,
            duration,
        }
    }

    pub fn failed(
        name: impl Into<String>,
        action: SyncAction,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            action,
            status: SyncStatus::Failed,
            error: Some(error.into()),
            duration,
        }
    }

    pub fn skipped(name: impl Into<String>, action: SyncAction, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action,
            status: SyncStatus::Skipped,
            error: Some(reason.into()),
            duration: Duration::ZERO,
        }
    }
}

/// Result of one full pass over the organization. Lives only long enough to
/// be reported.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<RepoOutcome>,
}

impl CycleReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            started_at,
            finished_at: started_at,
            outcomes: Vec::new(),
        }
    }

    /// Wall-clock time from cycle start to finish.
    pub fn elapsed(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn count(&self, status: SyncStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == SyncStatus::Failed)
            .map(|o| o.name.as_str())
            .collect()
    }
}

/// Render a duration as `M:SS`, e.g. 125 seconds becomes `2:05`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(125)), "2:05");
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_millis(59_900)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(3600)), "60:00");
    }

    #[test]
    fn test_report_elapsed_and_counts() {
        let start = Utc::now();
        let mut report = CycleReport::new(start);
        report.finished_at = start + chrono::Duration::seconds(125);
        report.outcomes = vec![
            RepoOutcome::success("a", SyncAction::Clone, Duration::from_secs(1)),
            RepoOutcome::failed("b", SyncAction::Pull, "exit 1", Duration::from_secs(1)),
            RepoOutcome::success("c", SyncAction::Pull, Duration::from_secs(1)),
        ];

        assert_eq!(format_duration(report.elapsed()), "2:05");
        assert_eq!(report.count(SyncStatus::Success), 2);
        assert_eq!(report.count(SyncStatus::Failed), 1);
        assert_eq!(report.failed_names(), vec!["b"]);
    }
}
