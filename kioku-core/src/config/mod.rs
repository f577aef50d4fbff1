//! Configuration management for kioku.
//!
//! Settings are read from a single TOML file in the XDG config directory
//! (`~/.config/kioku/config.toml`, or `$KIOKU_CONFIG_DIR/config.toml`).
//!
//! ```toml
//! [agents.defaults]
//! workspace = "~/kioku/workspace"
//!
//! [agents.defaults.memory_search]
//! sources = ["memory", "sessions"]
//! extra_paths = ["~/notes"]
//!
//! [agents.defaults.memory_search.sync]
//! interval_minutes = 30
//!
//! [agents.list.research.memory_search.query]
//! max_results = 10
//!
//! [logging]
//! level = "info"
//! ```
//!
//! The user-facing structs keep every field optional; [`resolve_memory_search`]
//! merges per-agent overrides over the defaults into a [`ResolvedMemorySearch`].

pub mod memory;
mod settings;

pub use memory::{
    ChunkingPolicy, MemorySource, QueryDefaults, ResolvedMemorySearch, SyncPolicy,
    resolve_memory_search,
};
pub use settings::{
    AgentDefaults, AgentEntry, AgentsSettings, ChunkingConfig, LoggingSettings,
    MemorySearchConfig, QueryConfig, Settings, SettingsError, SyncConfig,
};
