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
    pub ticket_dir: PathBuf,
    pub cookie_key: Vec<u8>,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: try_load("MOVIE_TICKETS_ADDR", "127.0.0.1:8080")?,
            db_path: try_load("MOVIE_TICKETS_DB", "movie-tickets.db")?,
            ticket_dir: try_load("MOVIE_TICKETS_TICKET_DIR", "tickets")?,
            cookie_key: cookie_key("MOVIE_TICKETS_COOKIE_KEY")?,
            bcrypt_cost: try_load(
                "MOVIE_TICKETS_BCRYPT_COST",
                &bcrypt::DEFAULT_COST.to_string(),
            )?,
        })
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

/// The parts of the configuration handlers need at request time.
pub struct Settings {
    pub ticket_dir: PathBuf,
    pub bcrypt_cost: u32,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Settings {
            ticket_dir: config.ticket_dir.clone(),
            bcrypt_cost: config.bcrypt_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Every test uses its own variable names; the environment is shared
    // between test threads.

    #[test]
    fn unset_values_fall_back_to_defaults() {
        env::remove_var("MOVIE_TICKETS_TEST_UNSET");
        let cost: u32 = try_load("MOVIE_TICKETS_TEST_UNSET", "12").unwrap();
        assert_eq!(cost, 12);
    }

    #[test]
    fn set_values_are_parsed() {
        env::set_var("MOVIE_TICKETS_TEST_COST", "6");
        let cost: u32 = try_load("MOVIE_TICKETS_TEST_COST", "12").unwrap();
        assert_eq!(cost, 6);
    }

    #[test]
    fn malformed_values_are_rejected() {
        env::set_var("MOVIE_TICKETS_TEST_BAD_COST", "twelve");
        let result: Result<u32, _> = try_load("MOVIE_TICKETS_TEST_BAD_COST", "12");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "MOVIE_TICKETS_TEST_BAD_COST",
                ..
            })
        ));
    }

    #[test]
    fn cookie_keys() {
        env::set_var("MOVIE_TICKETS_TEST_SHORT_KEY", "too short");
        assert!(cookie_key("MOVIE_TICKETS_TEST_SHORT_KEY").is_err());

        let long = "k".repeat(64);
        env::set_var("MOVIE_TICKETS_TEST_LONG_KEY", &long);
        assert_eq!(
            cookie_key("MOVIE_TICKETS_TEST_LONG_KEY").unwrap(),
            long.into_bytes()
        );

        env::remove_var("MOVIE_TICKETS_TEST_NO_KEY");
        assert_eq!(
            cookie_key("MOVIE_TICKETS_TEST_NO_KEY").unwrap(),
            DEV_COOKIE_KEY.to_vec()
        );
    }
}
