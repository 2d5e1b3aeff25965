use comfy_table::{Cell, Color, Table};
use orgmirror_sync::scanner::scan_mirrors;

use crate::settings::SettingsArgs;

pub fn run(settings: &SettingsArgs) -> anyhow::Result<()> {
    let root = settings.raw()?.data_dir_or_default();
    let mirrors = scan_mirrors(&root);

    if mirrors.is_empty() {
        println!("No mirrors under {}.", root.display());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["REPO", "BRANCH", "STATE"]);

    let mut broken = 0usize;
    for mirror in &mirrors {
        let (state, color) = if mirror.is_working_copy {
            ("mirrored", Color::Green)
        } else {
            broken += 1;
            ("no .git", Color::Red)
        };
        table.add_row(vec![
            Cell::new(&mirror.name),
            Cell::new(mirror.branch.as_deref().unwrap_or("—")),
            Cell::new(state).fg(color),
        ]);
    }

    println!("{table}");
    println!(
        "{} mirrors under {} | {} without a working copy",
        mirrors.len(),
        root.display(),
        broken
    );
    Ok(())
}
