use crate::error::ConfigError;
use crate::models::Snowflake;
use db_pool::DbConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub const SERVICE_NAME: &str = "forum-sync-service";

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DbConfig,
    pub redis: RedisConfig,
    pub discord: DiscordConfig,
    pub workers: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub metrics_port: u16,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    pub api_base: String,
    pub guild_id: Snowflake,
    pub forum_channel_id: Snowflake,
    pub notification_channel_id: Snowflake,
    /// Where compromised-resource broadcasts go. Optional: without it the
    /// compromised handler reports failure per event.
    pub update_channel_id: Option<Snowflake>,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("guild_id", &self.guild_id)
            .field("forum_channel_id", &self.forum_channel_id)
            .field("notification_channel_id", &self.notification_channel_id)
            .field("update_channel_id", &self.update_channel_id)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Sleep between polls when a stream has nothing new
    pub poll_interval_ms: u64,
    /// Period of the reconciliation sweep
    pub sweep_interval_secs: u64,
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            sweep_interval_secs: 300,
        }
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn parse<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn required_parsed<T: FromStr>(key: &'static str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    parse(key, &required(key)?)
}

fn optional_parsed<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => parse(key, &v).map(Some),
        _ => Ok(None),
    }
}

fn parsed_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    Ok(optional_parsed(key)?.unwrap_or(default))
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Missing forum ids are fatal here so no worker ever starts against an
    /// unknown target.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database =
            DbConfig::from_env(SERVICE_NAME).map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let log_format = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") | Some("") | None => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    reason: format!("expected 'json' or 'pretty', got '{}'", other),
                })
            }
        };

        let defaults = WorkerConfig::default();

        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                metrics_port: parsed_or("METRICS_PORT", 9100)?,
                log_format,
            },
            database,
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            discord: DiscordConfig {
                bot_token: required("DISCORD_BOT_TOKEN")?,
                api_base: std::env::var("DISCORD_API_BASE")
                    .unwrap_or_else(|_| "https://discord.com/api/v10".to_string()),
                guild_id: required_parsed("DISCORD_GUILD_ID")?,
                forum_channel_id: required_parsed("DISCORD_FORUM_CHANNEL_ID")?,
                notification_channel_id: required_parsed("DISCORD_NOTIFICATION_CHANNEL_ID")?,
                update_channel_id: optional_parsed("DISCORD_UPDATE_CHANNEL_ID")?,
            },
            workers: WorkerConfig {
                poll_interval_ms: parsed_or("SYNC_POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
                sweep_interval_secs: parsed_or(
                    "SYNC_SWEEP_INTERVAL_SECS",
                    defaults.sweep_interval_secs,
                )?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "DATABASE_URL",
        "DISCORD_BOT_TOKEN",
        "DISCORD_GUILD_ID",
        "DISCORD_FORUM_CHANNEL_ID",
        "DISCORD_NOTIFICATION_CHANNEL_ID",
        "DISCORD_UPDATE_CHANNEL_ID",
        "SYNC_POLL_INTERVAL_MS",
        "SYNC_SWEEP_INTERVAL_SECS",
        "LOG_FORMAT",
    ];

    fn set_required() {
        for key in KEYS {
            std::env::remove_var(key);
        }
        std::env::set_var("DATABASE_URL", "postgres://localhost/catalog");
        std::env::set_var("DISCORD_BOT_TOKEN", "token");
        std::env::set_var("DISCORD_GUILD_ID", "100");
        std::env::set_var("DISCORD_FORUM_CHANNEL_ID", "200");
        std::env::set_var("DISCORD_NOTIFICATION_CHANNEL_ID", "300");
    }

    #[test]
    #[serial]
    fn loads_with_defaults() {
        set_required();
        let config = Config::from_env().unwrap();
        assert_eq!(config.discord.guild_id, 100);
        assert_eq!(config.discord.update_channel_id, None);
        assert_eq!(config.workers.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.workers.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.app.log_format, LogFormat::Pretty);
    }

    #[test]
    #[serial]
    fn missing_forum_channel_is_fatal() {
        set_required();
        std::env::remove_var("DISCORD_FORUM_CHANNEL_ID");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DISCORD_FORUM_CHANNEL_ID")));
    }

    #[test]
    #[serial]
    fn malformed_id_is_rejected() {
        set_required();
        std::env::set_var("DISCORD_GUILD_ID", "not-a-snowflake");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DISCORD_GUILD_ID", .. }));
    }

    #[test]
    #[serial]
    fn debug_output_hides_token() {
        set_required();
        std::env::set_var("DISCORD_BOT_TOKEN", "super-secret");
        let config = Config::from_env().unwrap();
        assert!(!format!("{:?}", config.discord).contains("super-secret"));
    }
}
