//! Resolved memory search settings.
//!
//! These types hold the fully merged (non-optional) values consumed by
//! `kioku-memory`. They are produced from the user-facing TOML structs by
//! [`resolve_memory_search`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::settings::{MemorySearchConfig, Settings};

/// Origin of an indexed chunk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    /// Markdown memory notes in the workspace (and extra paths).
    Memory,
    /// Prior session transcripts.
    Sessions,
}

impl MemorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sessions => "sessions",
        }
    }
}

impl FromStr for MemorySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "sessions" => Ok(Self::Sessions),
            other => Err(format!("unknown memory source: {other}")),
        }
    }
}

impl fmt::Display for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved memory search settings for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMemorySearch {
    pub sources: Vec<MemorySource>,
    pub extra_paths: Vec<String>,
    pub chunking: ChunkingPolicy,
    pub sync: SyncPolicy,
    pub query: QueryDefaults,
}

impl Default for ResolvedMemorySearch {
    fn default() -> Self {
        Self {
            sources: vec![MemorySource::Memory],
            extra_paths: Vec::new(),
            chunking: ChunkingPolicy::default(),
            sync: SyncPolicy::default(),
            query: QueryDefaults::default(),
        }
    }
}

impl ResolvedMemorySearch {
    pub fn has_source(&self, source: MemorySource) -> bool {
        self.sources.contains(&source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingPolicy {
    pub tokens: usize,
    pub overlap: usize,
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self {
            tokens: default_chunk_tokens(),
            overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    pub on_search: bool,
    pub watch: bool,
    pub interval_minutes: u64,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            on_search: true,
            watch: true,
            interval_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryDefaults {
    pub max_results: usize,
    pub min_score: f64,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            min_score: default_min_score(),
        }
    }
}

fn default_chunk_tokens() -> usize {
    400
}

fn default_chunk_overlap() -> usize {
    80
}

fn default_max_results() -> usize {
    6
}

fn default_min_score() -> f64 {
    0.35
}

/// Resolve memory search settings for `agent_id`.
///
/// Returns `None` when memory search is disabled for the agent.
pub fn resolve_memory_search(settings: &Settings, agent_id: &str) -> Option<ResolvedMemorySearch> {
    let defaults = &settings.agents.defaults.memory_search;
    let overrides = settings.agent(agent_id).map(|entry| &entry.memory_search);

    let enabled = overrides
        .and_then(|o| o.enabled)
        .or(defaults.enabled)
        .unwrap_or(true);
    if !enabled {
        return None;
    }

    let mut resolved = ResolvedMemorySearch::default();
    apply_overrides(&mut resolved, defaults);
    if let Some(overrides) = overrides {
        apply_overrides(&mut resolved, overrides);
    }
    Some(resolved)
}

fn apply_overrides(resolved: &mut ResolvedMemorySearch, overrides: &MemorySearchConfig) {
    if let Some(sources) = &overrides.sources {
        let mut unique = Vec::with_capacity(sources.len());
        for source in sources {
            if !unique.contains(source) {
                unique.push(*source);
            }
        }
        resolved.sources = unique;
    }
    if let Some(paths) = &overrides.extra_paths {
        let mut unique: Vec<String> = Vec::with_capacity(paths.len());
        for path in paths {
            let trimmed = path.trim();
            if !trimmed.is_empty() && !unique.iter().any(|p| p == trimmed) {
                unique.push(trimmed.to_string());
            }
        }
        resolved.extra_paths = unique;
    }
    if let Some(tokens) = overrides.chunking.tokens {
        resolved.chunking.tokens = tokens;
    }
    if let Some(overlap) = overrides.chunking.overlap {
        resolved.chunking.overlap = overlap;
    }
    if let Some(on_search) = overrides.sync.on_search {
        resolved.sync.on_search = on_search;
    }
    if let Some(watch) = overrides.sync.watch {
        resolved.sync.watch = watch;
    }
    if let Some(minutes) = overrides.sync.interval_minutes {
        resolved.sync.interval_minutes = minutes;
    }
    if let Some(max_results) = overrides.query.max_results {
        resolved.query.max_results = max_results;
    }
    if let Some(min_score) = overrides.query.min_score {
        resolved.query.min_score = min_score;
    }
}
