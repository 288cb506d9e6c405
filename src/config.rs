//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::RetryPolicy;

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot name for identification.
    pub name: String,
    /// Session idle timeout (sessions are evicted after this duration).
    pub session_idle_timeout: Duration,
    /// How often idle sessions are pruned.
    pub prune_interval: Duration,
    /// Retry policy applied to every LLM call.
    pub retry: RetryPolicy,
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Directory for the daily-rolling log file.
    pub log_dir: PathBuf,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "custos".to_string(),
            session_idle_timeout: Duration::from_secs(3600), // 1 hour
            prune_interval: Duration::from_secs(60),         // 1 minute
            retry: RetryPolicy::default(),
            db_path: PathBuf::from("./data/custos.db"),
            log_dir: PathBuf::from("./logs"),
        }
    }
}

impl BotConfig {
    /// Read the bot settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the bot settings through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let idle_secs = env_parse(
            &lookup,
            "CUSTOS_SESSION_IDLE_SECS",
            defaults.session_idle_timeout.as_secs(),
        )?;
        let retry = RetryPolicy {
            max_retries: env_parse(&lookup, "CUSTOS_LLM_MAX_RETRIES", defaults.retry.max_retries)?,
            base_delay_ms: env_parse(
                &lookup,
                "CUSTOS_LLM_RETRY_DELAY_MS",
                defaults.retry.base_delay_ms,
            )?,
            ..defaults.retry
        };

        Ok(Self {
            session_idle_timeout: Duration::from_secs(idle_secs),
            retry,
            db_path: env_string(&lookup, "CUSTOS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            log_dir: env_string(&lookup, "CUSTOS_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            ..Self::default()
        })
    }
}

/// Telegram channel settings. Present only when a bot token is configured.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Usernames or numeric ids; `*` allows everyone.
    pub allowed_users: Vec<String>,
}

impl TelegramConfig {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let bot_token = env_string(&lookup, "TELEGRAM_BOT_TOKEN")?;
        let allowed_users = env_string(&lookup, "TELEGRAM_ALLOWED_USERS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Some(Self {
            bot_token: SecretString::from(bot_token),
            allowed_users,
        })
    }

    /// Allowlist as shown in the startup banner.
    pub fn allowed_display(&self) -> String {
        if self.allowed_users.iter().any(|u| u == "*") {
            "everyone".to_string()
        } else if self.allowed_users.is_empty() {
            "none (deny all)".to_string()
        } else {
            self.allowed_users.join(", ")
        }
    }
}

/// Non-empty value of `key`, trimmed.
pub(crate) fn env_string(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `key` as `T`, or `default` when unset.
pub(crate) fn env_parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(lookup, key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}
