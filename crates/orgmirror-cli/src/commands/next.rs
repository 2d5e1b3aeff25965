use chrono::Utc;
use clap::Args;
use orgmirror_sync::scheduler::upcoming;

use crate::settings::SettingsArgs;

#[derive(Args)]
pub struct NextArgs {
    /// How many upcoming triggers to show
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u16).range(1..=1000))]
    count: u16,
}

pub fn run(args: NextArgs, settings: &SettingsArgs) -> anyhow::Result<()> {
    let (tz, time) = settings.raw()?.schedule()?;
    println!("Every day at {time} - {tz}");
    for at in upcoming(Utc::now(), tz, time).take(usize::from(args.count)) {
        println!(
            "  {}  ({})",
            at.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z"),
            at.format("%Y-%m-%d %H:%M UTC")
        );
    }
    Ok(())
}
