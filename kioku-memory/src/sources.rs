use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::chunker::{Chunker, MarkdownChunker};
use crate::errors::MemoryResult;
use crate::paths::{
    MEMORY_DIR, MEMORY_FILE, MEMORY_FILE_ALT, MemoryPathClassifier, PathClassifier, is_markdown,
    normalize_extra_paths,
};
use crate::sessions::{SessionSource, TranscriptSessions};

/// Lists the memory files eligible for indexing.
#[async_trait]
pub trait MemoryFileLister: Send + Sync {
    /// Absolute paths of every eligible file.
    async fn list(&self, workspace_dir: &Path, extra_paths: &[String])
    -> MemoryResult<Vec<PathBuf>>;
}

/// `MEMORY.md`, `memory.md`, `memory/**/*.md` and the configured extra paths.
///
/// Symbolic links are never listed nor followed.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkspaceMemoryFiles;

#[async_trait]
impl MemoryFileLister for WorkspaceMemoryFiles {
    async fn list(
        &self,
        workspace_dir: &Path,
        extra_paths: &[String],
    ) -> MemoryResult<Vec<PathBuf>> {
        let mut files = BTreeSet::new();

        for name in [MEMORY_FILE, MEMORY_FILE_ALT] {
            let path = workspace_dir.join(name);
            if is_regular_file(&path).await {
                files.insert(path);
            }
        }
        collect_markdown_tree(&workspace_dir.join(MEMORY_DIR), &mut files).await;

        for extra in normalize_extra_paths(workspace_dir, extra_paths) {
            let Ok(meta) = tokio::fs::symlink_metadata(&extra).await else {
                continue;
            };
            if meta.file_type().is_symlink() {
                continue;
            }
            if meta.is_dir() {
                collect_markdown_tree(&extra, &mut files).await;
            } else if meta.is_file() && is_markdown(&extra) {
                files.insert(extra);
            }
        }

        Ok(files.into_iter().collect())
    }
}

async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

async fn collect_markdown_tree(root: &Path, files: &mut BTreeSet<PathBuf>) {
    match tokio::fs::symlink_metadata(root).await {
        Ok(meta) if meta.is_dir() => {}
        _ => return,
    }

    for entry in WalkDir::new(root).into_iter().filter_map(|entry| entry.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if is_markdown(entry.path()) {
            files.insert(entry.into_path());
        }
    }
}

/// Pluggable pieces consumed by the sync orchestrator and the file reader.
#[derive(Clone)]
pub struct Collaborators {
    pub chunker: Arc<dyn Chunker>,
    pub classifier: Arc<dyn PathClassifier>,
    pub memory_files: Arc<dyn MemoryFileLister>,
    pub sessions: Arc<dyn SessionSource>,
}

impl Collaborators {
    /// Built-in markdown and transcript handling with sessions under `sessions_root`.
    pub fn workspace_defaults(sessions_root: impl Into<PathBuf>) -> Self {
        Self {
            chunker: Arc::new(MarkdownChunker),
            classifier: Arc::new(MemoryPathClassifier),
            memory_files: Arc::new(WorkspaceMemoryFiles),
            sessions: Arc::new(TranscriptSessions::new(sessions_root)),
        }
    }

    pub fn with_memory_files(mut self, lister: Arc<dyn MemoryFileLister>) -> Self {
        self.memory_files = lister;
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionSource>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
