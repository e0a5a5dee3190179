use std::env;

use chrono_tz::Tz;
use dotenvy::dotenv;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set")]
    MissingDatabaseUrl,

    #[error("APP_TIMEZONE is not a valid IANA timezone name: {0:?}")]
    InvalidTimezone(String),
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    /// All wall-clock comparisons and submitted-at stamps happen in this zone,
    /// never UTC-normalized.
    pub timezone: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingDatabaseUrl)?,
            timezone: timezone_from(env::var("APP_TIMEZONE").ok())?,
        })
    }
}

fn timezone_from(value: Option<String>) -> Result<Tz, ConfigError> {
    match value {
        Some(name) => name
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(name)),
        None => Ok(chrono_tz::Asia::Kolkata),
    }
}
