use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kioku_core::MemorySource;
use serde::{Deserialize, Serialize};

/// Per-call overrides of the configured query defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub max_results: Option<usize>,
    pub min_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySearchResult {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Normalized to `[0, 1]` against the best hit of the same query.
    pub score: f64,
    pub snippet: String,
    pub source: MemorySource,
}

/// Progress of a sync pass, reported once per processed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    pub completed: usize,
    pub total: usize,
    pub label: String,
}

pub type ProgressFn = Arc<dyn Fn(SyncProgress) + Send + Sync>;

#[derive(Clone, Default)]
pub struct SyncRequest {
    pub reason: Option<String>,
    pub force: bool,
    pub progress: Option<ProgressFn>,
}

impl SyncRequest {
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

impl fmt::Debug for SyncRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRequest")
            .field("reason", &self.reason)
            .field("force", &self.force)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFileRequest {
    pub rel_path: String,
    /// 1-based first line.
    pub from: Option<i64>,
    pub lines: Option<i64>,
}

impl ReadFileRequest {
    pub fn new(rel_path: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            ..Self::default()
        }
    }

    pub fn slice(mut self, from: Option<i64>, lines: Option<i64>) -> Self {
        self.from = from;
        self.lines = lines;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFileResult {
    pub text: String,
    /// Workspace-relative path with forward slashes.
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFlag {
    pub enabled: bool,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub source: MemorySource,
    pub files: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStatus {
    pub backend: String,
    pub provider: String,
    pub model: String,
    pub requested_provider: String,
    pub agent_id: String,
    pub files: usize,
    pub chunks: usize,
    pub dirty: bool,
    pub workspace_dir: PathBuf,
    pub extra_paths: Vec<String>,
    pub sources: Vec<MemorySource>,
    pub source_counts: Vec<SourceCount>,
    pub vector: CapabilityFlag,
    pub fts: CapabilityFlag,
    pub cache: CacheStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingProbe {
    pub ok: bool,
    pub error: Option<String>,
}
