//! Settings configuration loaded from TOML files.
//!
//! This module handles the on-disk configuration stored in the XDG config
//! directory (~/.config/kioku/config.toml).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::memory::MemorySource;

const DEFAULT_CONFIG_TOML: &str = r#"# kioku configuration

[agents.defaults]
workspace = "~/kioku/workspace"

[agents.defaults.memory_search]
enabled = true
sources = ["memory"]
extra_paths = []

[agents.defaults.memory_search.chunking]
tokens = 400
overlap = 80

[agents.defaults.memory_search.sync]
on_search = true
watch = true
interval_minutes = 0

[agents.defaults.memory_search.query]
max_results = 6
min_score = 0.35

[logging]
level = "info"
"#;

/// Settings loaded from the TOML configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    /// Agent defaults and per-agent overrides
    #[serde(default)]
    pub agents: AgentsSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Agent configuration: shared defaults plus entries keyed by agent id.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AgentsSettings {
    #[serde(default)]
    pub defaults: AgentDefaults,

    #[serde(default)]
    pub list: BTreeMap<String, AgentEntry>,
}

/// Defaults applied to every agent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AgentDefaults {
    /// Workspace directory of the default agent (`~` is expanded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    #[serde(default)]
    pub memory_search: MemorySearchConfig,
}

/// Per-agent entry; every field overrides the matching default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AgentEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    #[serde(default)]
    pub memory_search: MemorySearchConfig,
}

/// Memory search configuration (all fields optional).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MemorySearchConfig {
    pub enabled: Option<bool>,
    pub sources: Option<Vec<MemorySource>>,
    pub extra_paths: Option<Vec<String>>,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

/// Chunking overrides
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Approximate chunk size in tokens
    pub tokens: Option<usize>,
    /// Approximate overlap between consecutive chunks in tokens
    pub overlap: Option<usize>,
}

/// Sync overrides
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Resync before a search when the index is dirty
    pub on_search: Option<bool>,
    /// Watch memory files and mark the index dirty on change
    pub watch: Option<bool>,
    /// Periodic background resync (0 disables it)
    pub interval_minutes: Option<u64>,
}

/// Query overrides
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QueryConfig {
    pub max_results: Option<usize>,
    pub min_score: Option<f64>,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error("Data directory not found")]
    DataDirNotFound,
}

impl Settings {
    /// Load settings from the TOML configuration file.
    ///
    /// If the config file doesn't exist, creates it with default values.
    pub fn load() -> Result<Self, SettingsError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("Creating default configuration at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Get the configuration file path.
    ///
    /// Uses XDG config directory: `~/.config/kioku/config.toml`
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        if let Ok(override_dir) = std::env::var("KIOKU_CONFIG_DIR") {
            let dir = PathBuf::from(override_dir);
            return Ok(dir.join("config.toml"));
        }

        let config_dir = dirs::config_dir()
            .ok_or(SettingsError::ConfigDirNotFound)?
            .join("kioku");

        Ok(config_dir.join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG_TOML)?;
        Ok(())
    }

    /// Entry for `agent_id`, if one is configured.
    pub fn agent(&self, agent_id: &str) -> Option<&AgentEntry> {
        self.agents.list.get(agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert!(settings.agents.list.is_empty());
        assert!(settings.agents.defaults.workspace.is_none());
        assert!(settings.agents.defaults.memory_search.enabled.is_none());
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_default_config_toml_parses() {
        let settings = Settings::from_toml(DEFAULT_CONFIG_TOML).unwrap();
        let memory = &settings.agents.defaults.memory_search;

        assert_eq!(
            settings.agents.defaults.workspace.as_deref(),
            Some("~/kioku/workspace")
        );
        assert_eq!(memory.enabled, Some(true));
        assert_eq!(memory.sources, Some(vec![MemorySource::Memory]));
        assert_eq!(memory.chunking.tokens, Some(400));
        assert_eq!(memory.sync.interval_minutes, Some(0));
        assert_eq!(memory.query.max_results, Some(6));
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
[agents.defaults]
workspace = "/srv/agents/main"

[agents.defaults.memory_search]
sources = ["memory", "sessions"]
extra_paths = ["/srv/shared-notes"]

[agents.list.research]
workspace = "/srv/agents/research"

[agents.list.research.memory_search.query]
max_results = 12
min_score = 0.1

[logging]
level = "debug"
"#;

        let settings = Settings::from_toml(toml).unwrap();

        assert_eq!(
            settings.agents.defaults.memory_search.sources,
            Some(vec![MemorySource::Memory, MemorySource::Sessions])
        );
        let research = settings.agent("research").expect("research agent");
        assert_eq!(research.workspace.as_deref(), Some("/srv/agents/research"));
        assert_eq!(research.memory_search.query.max_results, Some(12));
        assert_eq!(research.memory_search.query.min_score, Some(0.1));
        assert!(research.memory_search.sources.is_none());
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn test_from_toml_rejects_unknown_source() {
        let toml = r#"
[agents.defaults.memory_search]
sources = ["vectors"]
"#;
        assert!(Settings::from_toml(toml).is_err());
    }

    #[test]
    fn test_config_path_uses_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let value = dir.path().to_string_lossy().to_string();

        // SAFETY: test-scoped env mutation.
        unsafe { std::env::set_var("KIOKU_CONFIG_DIR", &value) };
        let path = Settings::config_path().unwrap();
        // SAFETY: test-scoped env mutation cleanup.
        unsafe { std::env::remove_var("KIOKU_CONFIG_DIR") };

        assert_eq!(path, dir.path().join("config.toml"));
    }
}
