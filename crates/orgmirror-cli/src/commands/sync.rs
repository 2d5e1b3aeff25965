use comfy_table::{Cell, Color, Table};
use orgmirror_core::models::cycle::{format_duration, CycleReport, SyncStatus};

use crate::settings::SettingsArgs;

pub async fn run(settings: &SettingsArgs) -> anyhow::Result<()> {
    let config = settings.load()?;
    super::configure_git(&config);
    let engine = super::build_engine(&config)?;

    let report = engine.run_cycle().await?;
    println!("{}", render(&report));
    println!(
        "Sync complete: {} synced | {} failed | {} skipped in {}",
        report.count(SyncStatus::Success),
        report.count(SyncStatus::Failed),
        report.count(SyncStatus::Skipped),
        format_duration(report.elapsed())
    );
    Ok(())
}

pub fn render(report: &CycleReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["REPO", "ACTION", "STATUS", "TIME", "ERROR"]);

    for outcome in &report.outcomes {
        let color = match outcome.status {
            SyncStatus::Success => Color::Green,
            SyncStatus::Failed => Color::Red,
            SyncStatus::Skipped => Color::Yellow,
        };
        table.add_row(vec![
            Cell::new(&outcome.name),
            Cell::new(outcome.action.to_string()),
            Cell::new(outcome.status.to_string()).fg(color),
            Cell::new(format_duration(outcome.duration)),
            Cell::new(outcome.error.as_deref().unwrap_or("")),
        ]);
    }
    table
}
