use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when DATA_BACKEND=rest")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Hosted REST data API.
    Rest { url: String, api_key: String },
    /// In-process store snapshotted to a JSON file.
    Memory { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: Backend,
    /// Local offset used for "today", date truncation and display.
    pub time_offset_minutes: i32,
    pub http_timeout: Duration,
    pub employee_cache_ttl: Duration,
    pub telegram_api_base: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|value| value.trim().to_string()).filter(|value| !value.is_empty());

        let backend = match var("DATA_BACKEND").as_deref().unwrap_or("rest") {
            "rest" => Backend::Rest {
                url: var("DATA_API_URL").ok_or(ConfigError::Missing("DATA_API_URL"))?,
                api_key: var("DATA_API_KEY").ok_or(ConfigError::Missing("DATA_API_KEY"))?,
            },
            "memory" => Backend::Memory {
                path: var("APP_DATA_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("data/store.json")),
            },
            other => {
                return Err(ConfigError::Invalid {
                    name: "DATA_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            port: parse(&var, "PORT", 8080)?,
            backend,
            time_offset_minutes: parse(&var, "TIME_OFFSET_MINUTES", 420)?,
            http_timeout: Duration::from_secs(parse(&var, "HTTP_TIMEOUT_SECS", 10)?),
            employee_cache_ttl: Duration::from_secs(parse(&var, "EMPLOYEE_CACHE_TTL_SECS", 300)?),
            telegram_api_base: var("TELEGRAM_API_BASE")
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
        })
    }
}

fn parse<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}
