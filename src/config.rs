use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::games::tile_merge::DEFAULT_TIME_LIMIT_SECS;
use crate::quiz::ai_helper::RetryPolicy;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub chatgpt_api_key: String,
    /// One progress document per chat lives here.
    pub data_dir: PathBuf,
    pub dialogue_db: String,
    pub retry: RetryPolicy,
    pub puzzle_seconds: u32,
}

impl Config {
    /// Loads `.env` if there is one, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenv::dotenv() {
            log::debug!("No .env loaded: {}", e);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chatgpt_api_key = lookup("CHATGPT_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("CHATGPT_API_KEY"))?;

        let number = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(key) {
                None => Ok(default),
                Some(value) => parse(key, &value),
            }
        };
        let max_attempts = number("MATHMATE_LLM_ATTEMPTS", 3)?;
        let backoff_ms = number("MATHMATE_LLM_BACKOFF_MS", 500)?;
        let puzzle_seconds = number("MATHMATE_PUZZLE_SECONDS", u64::from(DEFAULT_TIME_LIMIT_SECS))?;

        let narrow = |key: &'static str, value: u64| {
            u32::try_from(value)
                .ok()
                .filter(|v| *v > 0)
                .ok_or(ConfigError::Invalid {
                    key,
                    value: value.to_string(),
                })
        };

        Ok(Self {
            chatgpt_api_key,
            data_dir: lookup("MATHMATE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            dialogue_db: lookup("MATHMATE_DIALOGUE_DB").unwrap_or_else(|| "db.sqlite".to_string()),
            retry: RetryPolicy {
                max_attempts: narrow("MATHMATE_LLM_ATTEMPTS", max_attempts)?,
                base_delay: Duration::from_millis(backoff_ms),
            },
            puzzle_seconds: narrow("MATHMATE_PUZZLE_SECONDS", puzzle_seconds)?,
        })
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
