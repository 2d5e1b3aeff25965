use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use orgmirror_core::config::{MirrorConfig, RawConfig, Secret};

/// Configuration from flags or environment. Anything left unset falls back
/// to the TOML config file.
#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// TOML config file (default: ~/.orgmirror/config.toml if present)
    #[arg(long, env = "ORGMIRROR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// GitHub organization to mirror
    #[arg(long, env = "ORGANIZATION", global = true)]
    pub organization: Option<String>,

    /// Personal access token for the API and for git transfers
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub access_token: Option<String>,

    /// Git user name; also embedded in transfer URLs
    #[arg(long, env = "USERNAME", global = true)]
    pub username: Option<String>,

    /// Git user email
    #[arg(long, env = "EMAIL", global = true)]
    pub email: Option<String>,

    /// IANA timezone for the daily trigger, e.g. Europe/Amsterdam
    #[arg(long, env = "TIMEZONE", global = true)]
    pub timezone: Option<String>,

    /// Daily trigger time, HH:MM (24-hour) [default: 2:00]
    #[arg(long, env = "BACKUP_TIME", global = true)]
    pub backup_time: Option<String>,

    /// Directory that holds the mirrors [default: /data]
    #[arg(long, env = "DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// API base URL [default: https://api.github.com]
    #[arg(long, env = "GITHUB_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Concurrent clone/pull operations [default: 1]
    #[arg(long, env = "SYNC_CONCURRENCY", global = true)]
    pub concurrency: Option<usize>,

    /// Mirror archived repositories too [default: true]
    #[arg(long, env = "INCLUDE_ARCHIVED", global = true)]
    pub include_archived: Option<bool>,
}

impl SettingsArgs {
    fn layer(&self) -> RawConfig {
        RawConfig {
            organization: self.organization.clone(),
            access_token: self.access_token.clone().map(Secret::new),
            username: self.username.clone(),
            email: self.email.clone(),
            timezone: self.timezone.clone(),
            backup_time: self.backup_time.clone(),
            data_dir: self.data_dir.clone(),
            api_url: self.api_url.clone(),
            concurrency: self.concurrency,
            include_archived: self.include_archived,
        }
    }

    /// File layer overlaid with flags and environment.
    pub fn raw(&self) -> anyhow::Result<RawConfig> {
        let file = match &self.config {
            Some(path) => RawConfig::load_from(path)
                .with_context(|| format!("reading config file {}", path.display()))?,
            None => RawConfig::load_default()?,
        };
        Ok(file.merge(self.layer()))
    }

    /// Fully validated configuration. Fails if a required value is missing.
    pub fn load(&self) -> anyhow::Result<MirrorConfig> {
        Ok(MirrorConfig::from_raw(self.raw()?)?)
    }
}
