use anyhow::Context;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    /// Bot token. When unset or blank, the DISCORD_TOKEN environment
    /// variable is used instead so the token can stay out of the file.
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Channel receiving the startup announcement and hourly broadcasts.
    pub target_channel_id: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_file")]
    pub file: PathBuf,
    /// IANA time zone name for slot matching and timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            file: default_schedule_file(),
            timezone: default_timezone(),
        }
    }
}

fn default_schedule_file() -> PathBuf {
    PathBuf::from("sched.json")
}

fn default_timezone() -> String {
    "Europe/London".to_string()
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn resolve_token(&self) -> anyhow::Result<String> {
        if let Some(token) = &self.discord.bot_token {
            if !token.trim().is_empty() {
                return Ok(token.clone());
            }
        }
        std::env::var("DISCORD_TOKEN").context(
            "no Discord token: set [discord] bot_token or the DISCORD_TOKEN environment variable",
        )
    }

    pub fn timezone(&self) -> anyhow::Result<Tz> {
        self.schedule
            .timezone
            .parse()
            .with_context(|| format!("invalid timezone '{}'", self.schedule.timezone))
    }
}
