use log::{info, warn};
use std::{env, fmt::Display, path::PathBuf, str::FromStr};
use thiserror::Error;

const DEV_COOKIE_KEY: [u8; 32] = [0u8; 32];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

pub struct Config {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub report_dir: PathBuf,
    pub model_path: PathBuf,
    pub cookie_key: Vec<u8>,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: try_load("DONOR_CHECK_ADDR", "127.0.0.1:8081")?,
            db_path: try_load("DONOR_CHECK_DB", "donor-check.db")?,
            report_dir: try_load("DONOR_CHECK_REPORT_DIR", "reports")?,
            model_path: try_load("DONOR_CHECK_MODEL", "models/donor_forest.json")?,
            cookie_key: cookie_key("DONOR_CHECK_COOKIE_KEY")?,
            bcrypt_cost: try_load("DONOR_CHECK_BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())?,
        })
    }
}

/// The parts of the configuration handlers need at request time.
pub struct Settings {
    pub report_dir: PathBuf,
    pub bcrypt_cost: u32,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Settings {
            report_dir: config.report_dir.clone(),
            bcrypt_cost: config.bcrypt_cost,
        }
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{} not set, using default: {}", key, default);
            default.to_owned()
        })
        .parse()
        .map_err(|err: T::Err| ConfigError::Invalid {
            key,
            message: err.to_string(),
        })
}

fn cookie_key(key: &'static str) -> Result<Vec<u8>, ConfigError> {
    match env::var(key) {
        Ok(value) if value.len() >= 32 => Ok(value.into_bytes()),
        Ok(_) => Err(ConfigError::Invalid {
            key,
            message: "cookie key must be at least 32 bytes".to_owned(),
        }),
        Err(_) => {
            warn!("{} not set, using the insecure development key", key);
            Ok(DEV_COOKIE_KEY.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_cost_is_a_config_error() {
        env::set_var("DONOR_CHECK_TEST_BAD_COST", "-1");
        let result: Result<u32, _> = try_load("DONOR_CHECK_TEST_BAD_COST", "12");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));

        env::set_var("DONOR_CHECK_TEST_COST", "5");
        let cost: u32 = try_load("DONOR_CHECK_TEST_COST", "12").unwrap();
        assert_eq!(cost, 5);
    }

    #[test]
    fn model_path_defaults() {
        env::remove_var("DONOR_CHECK_TEST_MODEL");
        let path: PathBuf = try_load("DONOR_CHECK_TEST_MODEL", "models/donor_forest.json").unwrap();
        assert_eq!(path, PathBuf::from("models/donor_forest.json"));
    }

    #[test]
    fn short_cookie_key_is_rejected() {
        env::set_var("DONOR_CHECK_TEST_SHORT_KEY", "0123456789");
        assert!(matches!(
            cookie_key("DONOR_CHECK_TEST_SHORT_KEY"),
            Err(ConfigError::Invalid { .. })
        ));
        env::set_var("DONOR_CHECK_TEST_KEY", "0123456789abcdef0123456789abcdef");
        assert_eq!(cookie_key("DONOR_CHECK_TEST_KEY").unwrap().len(), 32);
        env::remove_var("DONOR_CHECK_TEST_NO_KEY");
        assert_eq!(cookie_key("DONOR_CHECK_TEST_NO_KEY").unwrap(), DEV_COOKIE_KEY);
    }
}
