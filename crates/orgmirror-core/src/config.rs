use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::MirrorError;

pub const DEFAULT_BACKUP_TIME: &str = "2:00";
pub const DEFAULT_DATA_DIR: &str = "/data";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// A token or password. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}

/// Wall-clock time of day, 24-hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, MirrorError> {
        if hour > 23 || minute > 59 {
            return Err(MirrorError::config(format!(
                "invalid time of day {hour}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn as_naive(&self) -> NaiveTime {
        // Range checked in `new`.
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = MirrorError;

    /// Accepts `H:MM` or `HH:MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MirrorError::config(format!("invalid time '{s}', expected HH:MM"));
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        TimeOfDay::new(hour, minute)
    }
}

/// Unvalidated configuration values, as read from a TOML file or the
/// environment. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    pub organization: Option<String>,
    pub access_token: Option<Secret>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub timezone: Option<String>,
    pub backup_time: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub api_url: Option<String>,
    pub concurrency: Option<usize>,
    pub include_archived: Option<bool>,
}

impl RawConfig {
    /// Overlay `other` on top of `self`; values set in `other` win.
    pub fn merge(self, other: RawConfig) -> RawConfig {
        RawConfig {
            organization: other.organization.or(self.organization),
            access_token: other.access_token.or(self.access_token),
            username: other.username.or(self.username),
            email: other.email.or(self.email),
            timezone: other.timezone.or(self.timezone),
            backup_time: other.backup_time.or(self.backup_time),
            data_dir: other.data_dir.or(self.data_dir),
            api_url: other.api_url.or(self.api_url),
            concurrency: other.concurrency.or(self.concurrency),
            include_archived: other.include_archived.or(self.include_archived),
        }
    }

    /// Load a TOML config layer from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, MirrorError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| MirrorError::Serialization(e.to_string()))
    }

    /// Timezone and daily trigger time; the timezone is required.
    pub fn schedule(&self) -> Result<(Tz, TimeOfDay), MirrorError> {
        let name = required(self.timezone.clone(), "TIMEZONE", "Timezone")?;
        let timezone: Tz = name.trim().parse().map_err(|_| {
            MirrorError::config(format!(
                "unknown timezone '{name}', expected an IANA name such as Europe/Amsterdam"
            ))
        })?;
        let backup_time: TimeOfDay = self
            .backup_time
            .as_deref()
            .unwrap_or(DEFAULT_BACKUP_TIME)
            .parse()?;
        Ok((timezone, backup_time))
    }

    pub fn data_dir_or_default(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    /// Load the default config file, or an empty layer if there is none.
    pub fn load_default() -> Result<Self, MirrorError> {
        match MirrorConfig::config_path() {
            Ok(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Validated, immutable configuration for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub organization: String,
    pub access_token: Secret,
    pub username: String,
    pub email: String,
    pub timezone: Tz,
    pub backup_time: TimeOfDay,
    pub data_dir: PathBuf,
    pub api_url: url::Url,
    /// Maximum concurrent clone/pull operations.
    pub concurrency: usize,
    pub include_archived: bool,
}

fn required(value: Option<String>, env: &str, what: &str) -> Result<String, MirrorError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MirrorError::config(format!(
            "{what} is not set. Provide it with the '{env}' environment variable"
        ))),
    }
}

impl MirrorConfig {
    /// Returns the orgmirror home directory (`~/.orgmirror/`).
    pub fn home_dir() -> Result<PathBuf, MirrorError> {
        let base = dirs::home_dir()
            .ok_or_else(|| MirrorError::config("could not determine home directory"))?;
        Ok(base.join(".orgmirror"))
    }

    /// Returns the path to the optional config file.
    pub fn config_path() -> Result<PathBuf, MirrorError> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    /// Validate a merged raw layer. Missing required values are fatal.
    pub fn from_raw(raw: RawConfig) -> Result<Self, MirrorError> {
        let (timezone, backup_time) = raw.schedule()?;
        let data_dir = raw.data_dir_or_default();

        let organization = required(raw.organization, "ORGANIZATION", "Organization name")?;
        let access_token = match raw.access_token {
            Some(t) if !t.expose().trim().is_empty() => t,
            _ => {
                return Err(MirrorError::config(
                    "Personal access token is not set. Provide it with the 'ACCESS_TOKEN' environment variable",
                ))
            }
        };
        let username = required(raw.username, "USERNAME", "Git username")?;
        let email = required(raw.email, "EMAIL", "Git email")?;

        let api_url_str = raw.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = url::Url::parse(&api_url_str)
            .map_err(|e| MirrorError::config(format!("invalid API URL '{api_url_str}': {e}")))?;

        let concurrency = raw.concurrency.unwrap_or(1);
        if concurrency == 0 {
            return Err(MirrorError::config("concurrency must be at least 1"));
        }

        Ok(Self {
            organization,
            access_token,
            username,
            email,
            timezone,
            backup_time,
            data_dir,
            api_url,
            concurrency,
            include_archived: raw.include_archived.unwrap_or(true),
        })
    }
}
