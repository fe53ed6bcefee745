use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CadastroError, Result};
use crate::search::SearchPolicy;

/// Root application configuration, loaded from `~/.config/cadastro/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub lookup: LookupConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub base_url: String,
    pub user_agent: String,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Fetch the full list once, no filtering.
    Eager,
    /// Debounce while the list is open and the query non-empty.
    Open,
    /// Debounce on query text, filter server-side.
    #[default]
    Text,
}

impl std::str::FromStr for SearchMode {
    type Err = CadastroError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eager" => Ok(Self::Eager),
            "open" => Ok(Self::Open),
            "text" => Ok(Self::Text),
            other => Err(CadastroError::ConfigError(format!(
                "unknown search mode '{other}' (expected eager, open or text)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub mode: SearchMode,
    /// Overrides the per-mode default quiet period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    /// `0` disables the timeout.
    pub lookup_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            user_agent: concat!("cadastro/", env!("CARGO_PKG_VERSION")).to_string(),
            max_retries: 0,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            debounce_ms: None,
            lookup_timeout_ms: 10_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl SearchConfig {
    pub fn policy(&self) -> SearchPolicy {
        let debounce = self.debounce_ms.map(Duration::from_millis);
        match self.mode {
            SearchMode::Eager => SearchPolicy::EagerFetchOnce,
            SearchMode::Open => SearchPolicy::OpenTriggered {
                debounce: debounce.unwrap_or(SearchPolicy::OPEN_DEBOUNCE),
            },
            SearchMode::Text => SearchPolicy::TextTriggered {
                debounce: debounce.unwrap_or(SearchPolicy::TEXT_DEBOUNCE),
            },
        }
    }

    pub fn lookup_timeout(&self) -> Option<Duration> {
        (self.lookup_timeout_ms > 0).then(|| Duration::from_millis(self.lookup_timeout_ms))
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/cadastro/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CADASTRO_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cadastro")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn search_policy(&self) -> SearchPolicy {
        self.search.policy()
    }
}
