use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Config file looked up in the current directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = ".github-pullrequest-review.toml";

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Client identifier sent as `User-Agent` on every GitHub request.
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("GITHUB_TOKEN environment variable is not set")]
    MissingToken,
}

/// Top-level configuration loaded from `.github-pullrequest-review.toml`.
///
/// All fields are optional in the file. The token may come from the
/// environment instead, but it must be resolved from somewhere before the
/// server starts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// API root, e.g. `https://github.example.com/api/v3` for Enterprise.
    pub api_base: Option<String>,
    pub user_agent: Option<String>,
}

/// Fully resolved settings handed to the GitHub client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubSettings {
    pub token: String,
    pub api_base: String,
    pub user_agent: String,
}

impl Config {
    /// Load configuration from `path`, or from the default file in the current
    /// directory when no path is given. A missing default file yields the
    /// default config; a missing explicit file is an error.
    ///
    /// GITHUB_TOKEN and GITHUB_API_BASE are then applied from the process
    /// environment, falling back to a `.env` file in the current directory.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        Self::load_in(Path::new("."), path, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with the default file and `.env` resolved in `dir`
    /// and variables read through `lookup`. `.env` never overrides a
    /// variable `lookup` already knows.
    pub fn load_in<F>(dir: &Path, path: Option<&Path>, lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = dir.join(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from(&default_path)?
                } else {
                    Config::default()
                }
            }
        };

        let dotenv_vars = read_dotenv(&dir.join(".env"));
        config.apply_env(|key| lookup(key).or_else(|| dotenv_vars.get(key).cloned()));

        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Fill in values from environment variables. The file's token wins over
    /// GITHUB_TOKEN; GITHUB_API_BASE wins over the file's base URL.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if self.github.token.as_deref().map_or(true, str::is_empty) {
            self.github.token = non_empty("GITHUB_TOKEN");
        }
        if let Some(api_base) = non_empty("GITHUB_API_BASE") {
            self.github.api_base = Some(api_base);
        }
    }

    /// Resolve the settings the GitHub client needs. Fails only when no
    /// token is available.
    pub fn github_settings(&self) -> Result<GitHubSettings, ConfigError> {
        let token = self
            .github
            .token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        Ok(GitHubSettings {
            token,
            api_base: self
                .github
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            user_agent: self
                .github
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }
}

/// Variables from a `.env` file. A missing file is the same as an empty one.
fn read_dotenv(path: &Path) -> HashMap<String, String> {
    let Ok(entries) = dotenv::from_path_iter(path) else {
        return HashMap::new();
    };

    entries
        .filter_map(|entry| {
            entry
                .inspect_err(|err| warn!(path = %path.display(), error = %err, "skipping .env entry"))
                .ok()
        })
        .collect()
}
