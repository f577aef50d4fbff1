pub mod config;
pub mod logging;
pub mod paths;

// Config re-exports
pub use config::{
    AgentDefaults,
    AgentEntry,
    AgentsSettings,
    ChunkingConfig,
    ChunkingPolicy,
    LoggingSettings,
    MemorySearchConfig,
    MemorySource,
    QueryConfig,
    QueryDefaults,
    ResolvedMemorySearch,
    Settings,
    SettingsError,
    SyncConfig,
    SyncPolicy,
    resolve_memory_search,
};
pub use paths::{DEFAULT_AGENT_ID, data_root, resolve_agent_workspace, sessions_root};
