use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

const DEFAULT_CARD_URL: &str =
    "https://card.wb.ru/cards/v1/detail?appType=1&curr=rub&dest=-1257786&spp=30";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is required")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub database_url: String,
    pub card_url: String,
    /// Time between two notifications of one subscription.
    pub notify_interval: Duration,
    /// Upper bound for a single lookup or delivery made by a notification task.
    pub call_timeout: Duration,
    /// Timeout of the HTTP client used for product lookups.
    pub lookup_timeout: Duration,
    pub history_limit: u32,
    pub history_timezone: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| get(var).filter(|v| !v.trim().is_empty());

        let bot_token = get("BOT_TOKEN")
            .or_else(|| get("TELOXIDE_TOKEN"))
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let database_url = get("DATABASE_URL")
            .or_else(|| get("DB_URI"))
            .unwrap_or_else(|| "sqlite://wbnotifybot.db".to_owned());

        let card_url = get("WB_CARD_URL").unwrap_or_else(|| DEFAULT_CARD_URL.to_owned());

        macro_rules! parse_or {
            ($var:literal, $default:expr) => {
                match get($var) {
                    Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                        var: $var,
                        value: value.clone(),
                    })?,
                    None => $default,
                }
            };
        }

        let notify_interval = Duration::from_secs(parse_or!("NOTIFY_INTERVAL_SECS", 15));
        let call_timeout = Duration::from_secs(parse_or!("CALL_TIMEOUT_SECS", 10));
        let lookup_timeout = Duration::from_secs(parse_or!("LOOKUP_TIMEOUT_SECS", 5));
        let history_limit = parse_or!("HISTORY_LIMIT", 5);

        let history_timezone = match get("HISTORY_TIMEZONE") {
            Some(value) => Tz::from_str(value.trim()).map_err(|_| ConfigError::Invalid {
                var: "HISTORY_TIMEZONE",
                value,
            })?,
            None => chrono_tz::Europe::Moscow,
        };

        if notify_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "NOTIFY_INTERVAL_SECS",
                value: "0".to_owned(),
            });
        }

        Ok(Self {
            bot_token,
            database_url,
            card_url,
            notify_interval,
            call_timeout,
            lookup_timeout,
            history_limit,
            history_timezone,
        })
    }
}
