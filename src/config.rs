use std::env;
use std::fmt::{self, Display};
use std::path::PathBuf;

use chrono::Duration;

use crate::store::Retention;

pub const BIND_ADDR_KEY: &str = "PICKYPOLL_BIND_ADDR";
pub const STATE_DIR_KEY: &str = "PICKYPOLL_STATE_DIR";
pub const RETENTION_DAYS_KEY: &str = "PICKYPOLL_RETENTION_DAYS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STATE_DIR: &str = ".";

#[derive(Debug, PartialEq, Eq)]
pub struct ConfigError {
    key: &'static str,
    value: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.key, self.value)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: String,
    pub state_dir: PathBuf,
    pub retention: Retention,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let bind_addr = lookup(BIND_ADDR_KEY).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned());
        let state_dir = lookup(STATE_DIR_KEY).unwrap_or_else(|| DEFAULT_STATE_DIR.to_owned());

        let retention = match lookup(RETENTION_DAYS_KEY) {
            None => Retention::KeepAll,
            Some(value) => match value.trim().parse::<i64>() {
                Ok(days) if days > 0 => Retention::PurgeAfter(Duration::days(days)),
                _ => return Err(ConfigError { key: RETENTION_DAYS_KEY, value }),
            },
        };

        Ok(Config {
            bind_addr,
            state_dir: PathBuf::from(state_dir),
            retention,
        })
    }
}
