use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use kioku_core::{MemorySource, ResolvedMemorySearch};
use tracing::{debug, warn};

use crate::chunker::remap_chunk_lines;
use crate::errors::{MemoryError, MemoryResult};
use crate::index::IndexRecord;
use crate::models::{ProgressFn, SyncProgress};
use crate::paths::{relative_path, to_slash};
use crate::sources::Collaborators;

pub(crate) type SyncOutcome = Result<(), Arc<MemoryError>>;
pub(crate) type SharedSync = Shared<BoxFuture<'static, SyncOutcome>>;

/// At most one sync pass per manager; late callers join the running one.
#[derive(Default)]
pub(crate) struct SingleFlight {
    slot: Arc<Mutex<Option<SharedSync>>>,
}

impl SingleFlight {
    /// Join the pass in flight, or spawn `start()` as the new one.
    ///
    /// The pass runs on its own task, so it finishes even if every caller
    /// stops waiting. The slot is cleared when the pass ends, including when
    /// it panics, so the next call starts a fresh pass.
    pub(crate) fn join_or_start<F, Fut>(&self, start: F) -> SharedSync
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MemoryResult<()>> + Send + 'static,
    {
        let mut guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = guard.as_ref() {
            return running.clone();
        }

        let work = start();
        let slot = Arc::clone(&self.slot);
        let task = tokio::spawn(async move {
            let _release = ReleaseSlot(slot);
            work.await.map_err(Arc::new)
        });

        let shared = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => Err(Arc::new(MemoryError::SyncTask(err.to_string()))),
            }
        }
        .boxed()
        .shared();

        *guard = Some(shared.clone());
        shared
    }

    pub(crate) fn is_running(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Empties the single-flight slot when the pass task finishes or unwinds.
struct ReleaseSlot(Arc<Mutex<Option<SharedSync>>>);

impl Drop for ReleaseSlot {
    fn drop(&mut self) {
        let finished = self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(finished);
    }
}

/// Inputs of one sync pass.
pub(crate) struct SyncScope<'a> {
    pub agent_id: &'a str,
    pub workspace_dir: &'a Path,
    pub settings: &'a ResolvedMemorySearch,
    pub collaborators: &'a Collaborators,
}

/// Discover, read and chunk every enabled source.
///
/// Unreadable memory files and session files that fail to build are skipped;
/// both still count toward progress.
pub(crate) async fn collect_records(
    scope: &SyncScope<'_>,
    progress: Option<&ProgressFn>,
) -> MemoryResult<Vec<IndexRecord>> {
    let settings = scope.settings;
    let collaborators = scope.collaborators;

    let memory_files = if settings.has_source(MemorySource::Memory) {
        collaborators
            .memory_files
            .list(scope.workspace_dir, &settings.extra_paths)
            .await?
    } else {
        Vec::new()
    };
    let session_files = if settings.has_source(MemorySource::Sessions) {
        collaborators.sessions.list(scope.agent_id).await?
    } else {
        Vec::new()
    };

    let total = memory_files.len() + session_files.len();
    let mut completed = 0;
    let mut records = Vec::new();
    let report = |completed: usize, source: MemorySource| {
        if let Some(progress) = progress {
            progress(SyncProgress {
                completed,
                total,
                label: source.to_string(),
            });
        }
    };

    for abs_path in &memory_files {
        match tokio::fs::read_to_string(abs_path).await {
            Ok(content) => {
                let path = to_slash(&relative_path(scope.workspace_dir, abs_path));
                let chunks = collaborators.chunker.chunk(&content, &settings.chunking);
                records.push(IndexRecord {
                    path,
                    source: MemorySource::Memory,
                    chunks,
                });
            }
            Err(err) => {
                debug!(path = %abs_path.display(), error = %err, "skipping unreadable memory file");
            }
        }
        completed += 1;
        report(completed, MemorySource::Memory);
    }

    for abs_path in &session_files {
        match collaborators.sessions.build(abs_path).await {
            Ok(Some(entry)) if !entry.content.trim().is_empty() => {
                let mut chunks = collaborators.chunker.chunk(&entry.content, &settings.chunking);
                remap_chunk_lines(&mut chunks, &entry.line_map);
                records.push(IndexRecord {
                    path: entry.path,
                    source: MemorySource::Sessions,
                    chunks,
                });
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    agent_id = scope.agent_id,
                    path = %abs_path.display(),
                    error = %err,
                    "skipping session transcript"
                );
            }
        }
        completed += 1;
        report(completed, MemorySource::Sessions);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::sessions::{SessionEntry, SessionSource};

    struct FixedSessions;

    #[async_trait]
    impl SessionSource for FixedSessions {
        async fn list(&self, _agent_id: &str) -> MemoryResult<Vec<PathBuf>> {
            Ok(vec![
                PathBuf::from("/sessions/broken.jsonl"),
                PathBuf::from("/sessions/ok.jsonl"),
                PathBuf::from("/sessions/blank.jsonl"),
            ])
        }

        async fn build(&self, path: &Path) -> MemoryResult<Option<SessionEntry>> {
            match path.file_name().and_then(|name| name.to_str()) {
                Some("broken.jsonl") => Err(MemoryError::SyncTask("corrupt".to_string())),
                Some("blank.jsonl") => Ok(Some(SessionEntry {
                    path: "sessions/blank.jsonl".to_string(),
                    content: "   ".to_string(),
                    line_map: Vec::new(),
                })),
                _ => Ok(Some(SessionEntry {
                    path: "sessions/ok.jsonl".to_string(),
                    content: "User: remember the deploy key\nAssistant: noted".to_string(),
                    line_map: vec![3, 7],
                })),
            }
        }
    }

    #[tokio::test]
    async fn collects_memory_and_session_records_with_progress() {
        let ws = tempfile::TempDir::new().unwrap();
        std::fs::write(ws.path().join("MEMORY.md"), "root memory").unwrap();
        std::fs::create_dir_all(ws.path().join("memory")).unwrap();
        std::fs::write(ws.path().join("memory/day.md"), "daily note").unwrap();

        let collaborators =
            Collaborators::workspace_defaults(ws.path()).with_sessions(Arc::new(FixedSessions));
        let settings = ResolvedMemorySearch {
            sources: vec![MemorySource::Memory, MemorySource::Sessions],
            ..ResolvedMemorySearch::default()
        };
        let scope = SyncScope {
            agent_id: "main",
            workspace_dir: ws.path(),
            settings: &settings,
            collaborators: &collaborators,
        };

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress: ProgressFn = Arc::new(move |update: SyncProgress| sink.lock().unwrap().push(update));

        let records = collect_records(&scope, Some(&progress)).await.unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["MEMORY.md", "memory/day.md", "sessions/ok.jsonl"]);

        let session = &records[2];
        assert_eq!(session.source, MemorySource::Sessions);
        assert_eq!(session.chunks[0].start_line, 3);
        assert_eq!(session.chunks[0].end_line, 7);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert!(seen.iter().all(|update| update.total == 5));
        assert_eq!(seen[1].label, "memory");
        assert_eq!(seen[4].label, "sessions");
        assert_eq!(seen[4].completed, 5);
    }

    #[tokio::test]
    async fn single_flight_shares_one_pass() {
        let flight = SingleFlight::default();
        let runs = Arc::new(AtomicUsize::new(0));

        let start = |runs: Arc<AtomicUsize>| {
            move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                Ok::<(), MemoryError>(())
            }
        };

        let first = flight.join_or_start(start(Arc::clone(&runs)));
        let second = flight.join_or_start(start(Arc::clone(&runs)));
        assert!(flight.is_running());

        let (a, b) = tokio::join!(first, second);
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // the slot is released once the pass ends
        flight.join_or_start(start(Arc::clone(&runs))).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panicked_pass_releases_the_slot() {
        let flight = SingleFlight::default();
        let failed = flight
            .join_or_start(|| async {
                tokio::task::yield_now().await;
                if true {
                    panic!("chunker exploded");
                }
                Ok::<(), MemoryError>(())
            })
            .await;
        assert!(matches!(failed, Err(ref err) if matches!(**err, MemoryError::SyncTask(_))));
        assert!(!flight.is_running());

        flight
            .join_or_start(|| async { Ok::<(), MemoryError>(()) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failures_reach_every_waiter() {
        let flight = SingleFlight::default();
        let first = flight.join_or_start(|| async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Err::<(), _>(MemoryError::PathRejected)
        });
        let second = flight.join_or_start(|| async { Ok::<(), MemoryError>(()) });

        let (a, b) = tokio::join!(first, second);
        assert!(matches!(a, Err(ref err) if matches!(**err, MemoryError::PathRejected)));
        assert!(matches!(b, Err(ref err) if matches!(**err, MemoryError::PathRejected)));
    }
}
