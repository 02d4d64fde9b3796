//! Client configuration resolved from the environment.

use std::env;
use std::path::PathBuf;

/// Selects the API base URL.
pub const API_URL_ENV: &str = "TASKS_API_URL";

/// Overrides where `FileSessionStore` keeps the session.
pub const SESSION_FILE_ENV: &str = "TASKS_SESSION_FILE";

/// Local development server.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Explicit session file; `None` falls back to the per-user config dir.
    pub session_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            session_path: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            session_path: None,
        }
    }

    /// Read `TASKS_API_URL` and `TASKS_SESSION_FILE` from the process
    /// environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            base_url: non_empty(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            session_path: non_empty(SESSION_FILE_ENV).map(PathBuf::from),
        }
    }

    /// The session file to use: the explicit path, else
    /// `<config dir>/tasks-client/session.json`.
    pub fn session_file(&self) -> Option<PathBuf> {
        self.session_path.clone().or_else(|| {
            dirs::config_dir().map(|dir| dir.join("tasks-client").join("session.json"))
        })
    }
}
