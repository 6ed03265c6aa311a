//! Configuration management for the taskboard client.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use taskboard_core::todo::DEFAULT_USER_ID;

/// Default base URL of the remote todo service
pub const DEFAULT_API_URL: &str = "https://jsonplaceholder.typicode.com";

/// Default number of todos requested by the initial fetch
pub const DEFAULT_FETCH_LIMIT: u32 = 20;

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "taskboard=info,taskboard_runtime=warn";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the remote todo service, without trailing slash
    pub api_url: String,
    /// `_limit` sent with the list request
    pub fetch_limit: u32,
    /// Owner id attached to created todos
    pub user_id: i64,
    /// Log filter (`RUST_LOG` syntax)
    pub log_filter: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// ```
    /// use taskboard::config::Config;
    ///
    /// let config = Config::from_lookup(|key| match key {
    ///     "TASKBOARD_FETCH_LIMIT" => Some("5".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(config.fetch_limit, 5);
    /// ```
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            api_url: lookup("TASKBOARD_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            fetch_limit: lookup("TASKBOARD_FETCH_LIMIT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_FETCH_LIMIT),
            user_id: lookup("TASKBOARD_USER_ID")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_USER_ID),
            log_filter: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            shutdown_timeout: lookup("TASKBOARD_SHUTDOWN_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        }
    }
}
