//! Server configuration from the environment
//!
//! Variables (the binary loads a `.env` file from the working directory
//! before reading them):
//! - `SCORECARD_DB_PATH` / `DATABASE_PATH`: scoring store location
//!   (default `scorecard.db`)
//! - `SCORECARD_PORT` / `PORT`: listen port (default 8080)
//! - `SCORECARD_INIT_SCHEMA`: create the store when missing (default true)

use std::net::SocketAddr;

pub const DEFAULT_DB_PATH: &str = "scorecard.db";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a valid port number, got '{value}'")]
    InvalidPort { var: &'static str, value: String },

    #[error("{var} must be a boolean (true/false/1/0), got '{value}'")]
    InvalidBool { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Store URI or path handed to `backend_from_uri`
    pub db_path: String,
    pub port: u16,
    pub init_schema: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            port: DEFAULT_PORT,
            init_schema: true,
        }
    }
}

impl ServerConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&'static str]| -> Option<(&'static str, String)> {
            keys.iter()
                .find_map(|key| lookup(*key).map(|value| (*key, value)))
        };

        let db_path = first(&["SCORECARD_DB_PATH", "DATABASE_PATH"])
            .map(|(_, value)| value)
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let port = match first(&["SCORECARD_PORT", "PORT"]) {
            Some((var, value)) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort { var, value })?,
            None => DEFAULT_PORT,
        };

        let init_schema = match first(&["SCORECARD_INIT_SCHEMA"]) {
            Some((var, value)) => match parse_bool(&value) {
                Some(flag) => flag,
                None => return Err(ConfigError::InvalidBool { var, value }),
            },
            None => true,
        };

        Ok(Self {
            db_path,
            port,
            init_schema,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config_from(&[]).unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_primary_variables_win() {
        let config = config_from(&[
            ("SCORECARD_DB_PATH", "/data/scorecard.db"),
            ("DATABASE_PATH", "/ignored.db"),
            ("SCORECARD_PORT", "9090"),
            ("PORT", "1"),
            ("SCORECARD_INIT_SCHEMA", "false"),
        ])
        .unwrap();

        assert_eq!(config.db_path, "/data/scorecard.db");
        assert_eq!(config.port, 9090);
        assert!(!config.init_schema);
    }

    #[test]
    fn test_fallback_variables() {
        let config = config_from(&[("DATABASE_PATH", "fallback.db"), ("PORT", "3000")]).unwrap();
        assert_eq!(config.db_path, "fallback.db");
        assert_eq!(config.port, 3000);
        assert_eq!(config.socket_addr().port(), 3000);
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            config_from(&[("PORT", "eighty")]).unwrap_err(),
            ConfigError::InvalidPort {
                var: "PORT",
                value: "eighty".into()
            }
        );
        assert!(config_from(&[("SCORECARD_INIT_SCHEMA", "maybe")]).is_err());
    }
}
