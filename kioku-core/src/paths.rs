use std::path::{Path, PathBuf};

use crate::config::{Settings, SettingsError};

/// Agent that inherits the defaults workspace.
pub const DEFAULT_AGENT_ID: &str = "main";

pub const AGENTS_DIR: &str = "agents";
pub const SESSIONS_DIR: &str = "sessions";

pub fn data_root() -> Result<PathBuf, SettingsError> {
    if let Ok(override_dir) = std::env::var("KIOKU_DATA_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let dir = dirs::data_dir().ok_or(SettingsError::DataDirNotFound)?;
    Ok(dir.join("kioku"))
}

/// Root holding `<agent>/sessions/*.jsonl` transcripts.
pub fn sessions_root() -> Result<PathBuf, SettingsError> {
    Ok(data_root()?.join(AGENTS_DIR))
}

pub fn agent_sessions_dir(root: &Path, agent_id: &str) -> PathBuf {
    root.join(agent_id).join(SESSIONS_DIR)
}

/// Workspace directory for `agent_id`.
///
/// Explicit per-agent workspace first, then the defaults workspace for the
/// default agent, then `<data root>/workspace-<agent>`.
pub fn resolve_agent_workspace(settings: &Settings, agent_id: &str) -> Result<PathBuf, SettingsError> {
    if let Some(workspace) = settings
        .agent(agent_id)
        .and_then(|entry| entry.workspace.as_deref())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Ok(expand_home(workspace));
    }

    if agent_id == DEFAULT_AGENT_ID
        && let Some(workspace) = settings
            .agents
            .defaults
            .workspace
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    {
        return Ok(expand_home(workspace));
    }

    Ok(data_root()?.join(format!("workspace-{agent_id}")))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw));
    }
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_agent_workspace_wins() {
        let settings = Settings::from_toml(
            r#"
[agents.defaults]
workspace = "/srv/default"

[agents.list.main]
workspace = "/srv/main"
"#,
        )
        .unwrap();

        assert_eq!(
            resolve_agent_workspace(&settings, "main").unwrap(),
            PathBuf::from("/srv/main")
        );
    }

    #[test]
    fn default_agent_uses_defaults_workspace() {
        let settings = Settings::from_toml(
            r#"
[agents.defaults]
workspace = "/srv/default"
"#,
        )
        .unwrap();

        assert_eq!(
            resolve_agent_workspace(&settings, DEFAULT_AGENT_ID).unwrap(),
            PathBuf::from("/srv/default")
        );
    }

    #[test]
    fn other_agents_get_a_data_root_workspace() {
        let settings = Settings::from_toml(
            r#"
[agents.defaults]
workspace = "/srv/default"
"#,
        )
        .unwrap();

        let workspace = resolve_agent_workspace(&settings, "research").unwrap();
        assert!(workspace.ends_with("workspace-research"));
    }

    #[test]
    fn expands_home_prefix() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/notes"), home.join("notes"));
            assert_eq!(expand_home("~"), home);
        }
        assert_eq!(expand_home("/abs/notes"), PathBuf::from("/abs/notes"));
        assert_eq!(expand_home("rel/~/x"), PathBuf::from("rel/~/x"));
    }

    #[test]
    fn agent_sessions_dir_layout() {
        let root = PathBuf::from("/data/agents");
        assert_eq!(
            agent_sessions_dir(&root, "main"),
            PathBuf::from("/data/agents/main/sessions")
        );
    }
}
