use std::env;
use std::path::PathBuf;

use chrono::Duration as ChronoDuration;
use log::warn;
use tokio::time::Duration;

use crate::ingest::IngestSettings;

/// Process configuration, read from environment variables with defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub bind_addr: String,
    pub user_id: i64,
    pub window_secs: i64,
    pub poll_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("cardata.db"),
            bind_addr: "127.0.0.1:5000".to_string(),
            user_id: 1,
            window_secs: 60,
            poll_ms: 500,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            db_path: env::var("CARDATA_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            bind_addr: env::var("CARDATA_BIND").unwrap_or(defaults.bind_addr),
            user_id: parse_var("CARDATA_USER_ID", defaults.user_id),
            window_secs: parse_var("CARDATA_WINDOW_SECS", defaults.window_secs),
            poll_ms: parse_var("CARDATA_POLL_MS", defaults.poll_ms),
        }
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            user_id: self.user_id,
            window: ChronoDuration::seconds(self.window_secs),
            poll_period: Duration::from_millis(self.poll_ms),
        }
    }
}

fn parse_var<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("could not parse {name}='{raw}', using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.window_secs, 60);
        assert_eq!(config.poll_ms, 500);
        assert_eq!(config.ingest_settings().user_id, 1);
    }
}
