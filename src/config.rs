//! Application configuration loaded from environment variables.

use std::time::Duration;

use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address to bind the HTTP server to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    // === Storage ===
    /// SQLite database file. Unset or `:memory:` keeps records in memory.
    #[serde(default)]
    pub database_url: Option<String>,

    // === Authentication ===
    /// Accounts allowed to obtain tokens, as `user:password` pairs separated
    /// by commas.
    #[serde(default)]
    pub api_users: String,

    /// Access token lifetime in seconds.
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_seconds: u64,

    /// Refresh token lifetime in seconds.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_seconds: u64,

    // === Observability ===
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Emit logs as JSON lines.
    #[serde(default)]
    pub log_json: bool,

    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_access_ttl() -> u64 {
    300 // 5 minutes
}

fn default_refresh_ttl() -> u64 {
    86_400 // 1 day
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            database_url: None,
            api_users: String::new(),
            access_token_ttl_seconds: default_access_ttl(),
            refresh_token_ttl_seconds: default_refresh_ttl(),
            rust_log: default_log_level(),
            log_json: false,
            enable_metrics: true,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        let accounts = self.accounts()?;
        if accounts.is_empty() {
            return Err("API_USERS must name at least one user:password pair".to_string());
        }

        if self.access_token_ttl_seconds == 0 {
            return Err("ACCESS_TOKEN_TTL_SECONDS must be greater than 0".to_string());
        }

        if self.refresh_token_ttl_seconds < self.access_token_ttl_seconds {
            return Err(
                "REFRESH_TOKEN_TTL_SECONDS must not be shorter than ACCESS_TOKEN_TTL_SECONDS"
                    .to_string(),
            );
        }

        Ok(())
    }

    /// Parse `api_users` into (username, password) pairs.
    pub fn accounts(&self) -> Result<Vec<(String, String)>, String> {
        self.api_users
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.split_once(':') {
                Some((user, password)) if !user.is_empty() && !password.is_empty() => {
                    Ok((user.to_string(), password.to_string()))
                }
                _ => Err(format!(
                    "API_USERS entry {:?} must look like user:password",
                    entry.split(':').next().unwrap_or_default()
                )),
            })
            .collect()
    }

    /// Access token lifetime.
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_ttl_seconds)
    }

    /// Refresh token lifetime.
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_ttl_seconds)
    }

    /// Whether records live only in memory.
    pub fn is_in_memory(&self) -> bool {
        matches!(self.database_url.as_deref(), None | Some("") | Some(":memory:"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_users(users: &str) -> Config {
        Config {
            api_users: users.to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn default_values_are_sensible() {
        assert_eq!(default_port(), 8080);
        assert_eq!(default_access_ttl(), 300);
        assert_eq!(default_refresh_ttl(), 86_400);
        assert!(default_true());
        assert!(Config::default().is_in_memory());
    }

    #[test]
    fn accounts_are_parsed() {
        let config = config_with_users("alice:secret, bob:hunter2,");

        assert_eq!(
            config.accounts().unwrap(),
            vec![
                ("alice".to_string(), "secret".to_string()),
                ("bob".to_string(), "hunter2".to_string()),
            ]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn password_may_contain_colons() {
        let config = config_with_users("alice:se:cret");

        assert_eq!(
            config.accounts().unwrap(),
            vec![("alice".to_string(), "se:cret".to_string())]
        );
    }

    #[test]
    fn validate_rejects_missing_users() {
        assert!(config_with_users("").validate().is_err());
    }

    #[test]
    fn validate_rejects_malformed_user_entry() {
        let err = config_with_users("alice").validate().unwrap_err();
        assert!(err.contains("alice"));
        assert!(config_with_users("alice:").validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_access_ttl() {
        let config = Config {
            access_token_ttl_seconds: 0,
            ..config_with_users("alice:secret")
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_refresh_shorter_than_access() {
        let config = Config {
            access_token_ttl_seconds: 600,
            refresh_token_ttl_seconds: 60,
            ..config_with_users("alice:secret")
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn file_database_is_not_in_memory() {
        let config = Config {
            database_url: Some("grades.db".to_string()),
            ..Config::default()
        };

        assert!(!config.is_in_memory());
    }
}
