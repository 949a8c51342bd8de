use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
///
/// Loaded from the config file with env vars layered on top.
/// Priority: Env > File > Defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load config from the default location, falling back to defaults
    /// when no file exists. `GITHUB_TOKEN` always wins over the file.
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents)
                .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))?
        } else {
            Self::default()
        };

        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.is_empty() {
                config.github.token = Some(token);
            }
        }

        Ok(config)
    }

    /// Save config to disk
    pub fn save(&self) -> crate::Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&config_path, contents)?;
        Ok(())
    }

    /// Config file path: XDG on Linux/macOS, AppData on Windows
    fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?
            .join("bountyscout");

        Ok(config_dir.join("config.toml"))
    }

    /// Where the SQLite store lives, honoring an explicit override.
    pub fn store_path(&self) -> crate::Result<PathBuf> {
        if let Some(path) = &self.store.path {
            return Ok(PathBuf::from(path));
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find data directory".into()))?
            .join("bountyscout");
        Ok(data_dir.join("bounties.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// GitHub personal access token
    /// Get one at https://github.com/settings/tokens
    pub token: Option<String>,

    /// API URL (for GitHub Enterprise)
    #[serde(default = "default_github_url")]
    pub api_url: String,
}

fn default_github_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_github_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Results per search page
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// How many pages to walk before giving up
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Fetch issue comments while ranking. Costs one request per issue.
    #[serde(default)]
    pub fetch_comments: bool,
}

fn default_per_page() -> u32 {
    100 // search API maximum
}

fn default_max_pages() -> u32 {
    5
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            max_pages: default_max_pages(),
            fetch_comments: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Hard deadline for one refresh pass, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Explicit database path. Defaults to the platform data directory.
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fetch.per_page, 100);
        assert_eq!(config.fetch.max_pages, 5);
        assert!(!config.fetch.fetch_comments);
        assert_eq!(config.refresh.timeout_secs, 120);
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert!(config.github.token.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("per_page"));
        assert!(toml.contains("timeout_secs"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [github]
            token = "ghp_abc"

            [fetch]
            max_pages = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.github.token.as_deref(), Some("ghp_abc"));
        assert_eq!(config.fetch.max_pages, 2);
        assert_eq!(config.fetch.per_page, 100);
        assert_eq!(config.refresh.timeout_secs, 120);
    }
}
