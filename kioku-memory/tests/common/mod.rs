#![allow(dead_code)]

use std::path::Path;

use kioku_memory::{Collaborators, ManagerParams, MemorySource, ResolvedMemorySearch};

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("kioku_memory=debug,warn")
        .with_test_writer()
        .try_init();
}

/// Defaults with background work off so tests drive every sync.
pub fn quiet_settings() -> ResolvedMemorySearch {
    let mut settings = ResolvedMemorySearch::default();
    settings.sync.watch = false;
    settings.sync.interval_minutes = 0;
    settings
}

pub fn with_sources(mut settings: ResolvedMemorySearch, sources: &[MemorySource]) -> ResolvedMemorySearch {
    settings.sources = sources.to_vec();
    settings
}

pub fn params(workspace: &Path, settings: ResolvedMemorySearch) -> ManagerParams {
    ManagerParams {
        agent_id: "main".to_string(),
        workspace_dir: workspace.to_path_buf(),
        settings,
        collaborators: Collaborators::workspace_defaults(workspace.join(".sessions")),
    }
}

pub fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, content).expect("write file");
}
