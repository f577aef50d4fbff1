use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use kioku_core::{MemorySource, ResolvedMemorySearch};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

use crate::errors::{MemoryError, MemoryResult};
use crate::index::IndexSnapshot;
use crate::models::{
    CacheStatus, CapabilityFlag, EmbeddingProbe, ManagerStatus, MemorySearchResult,
    ReadFileRequest, ReadFileResult, SearchOptions, SourceCount, SyncRequest,
};
use crate::paths::normalize_extra_paths;
use crate::reader::read_memory_file;
use crate::registry::{ManagerKey, MemoryManagerRegistry};
use crate::search::rank;
use crate::sources::Collaborators;
use crate::sync::{SingleFlight, SyncScope, collect_records};
use crate::tokenizer::tokenize;
use crate::watcher::{MemoryWatcher, watch_memory_paths};

pub const BACKEND: &str = "text";
pub const PROVIDER: &str = "text";
pub const MODEL: &str = "bm25";

/// Everything needed to build a manager for one agent.
#[derive(Debug, Clone)]
pub struct ManagerParams {
    pub agent_id: String,
    pub workspace_dir: PathBuf,
    pub settings: ResolvedMemorySearch,
    pub collaborators: Collaborators,
}

/// Text-only memory index for one (agent, workspace, settings) triple.
///
/// Cloning is cheap and every clone addresses the same index, sync slot and
/// background tasks. Obtain instances through [`MemoryManagerRegistry`].
#[derive(Clone)]
pub struct MemoryIndexManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    key: ManagerKey,
    agent_id: String,
    workspace_dir: PathBuf,
    settings: ResolvedMemorySearch,
    collaborators: Collaborators,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    dirty: AtomicBool,
    /// Bumped on every external change notification.
    changes: AtomicU64,
    last_sync_at: RwLock<Option<DateTime<Utc>>>,
    flight: SingleFlight,
    closed: AtomicBool,
    background: Mutex<Background>,
    registry: Weak<MemoryManagerRegistry>,
}

#[derive(Default)]
struct Background {
    interval_stop: Option<oneshot::Sender<()>>,
    watcher: Option<MemoryWatcher>,
}

impl ManagerInner {
    fn mark_dirty(&self) {
        self.changes.fetch_add(1, Ordering::SeqCst);
        self.dirty.store(true, Ordering::SeqCst);
    }

    fn install(&self, snapshot: IndexSnapshot) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        *self
            .last_sync_at
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }
}

impl MemoryIndexManager {
    pub(crate) fn start(
        key: ManagerKey,
        params: ManagerParams,
        registry: Weak<MemoryManagerRegistry>,
    ) -> Self {
        let inner = Arc::new(ManagerInner {
            key,
            agent_id: params.agent_id,
            workspace_dir: params.workspace_dir,
            settings: params.settings,
            collaborators: params.collaborators,
            snapshot: RwLock::new(Arc::new(IndexSnapshot::default())),
            dirty: AtomicBool::new(true),
            changes: AtomicU64::new(0),
            last_sync_at: RwLock::new(None),
            flight: SingleFlight::default(),
            closed: AtomicBool::new(false),
            background: Mutex::new(Background::default()),
            registry,
        });
        let manager = Self { inner };
        manager.start_background();
        manager
    }

    fn start_background(&self) {
        let Ok(handle) = Handle::try_current() else {
            debug!(
                agent_id = %self.inner.agent_id,
                "no async runtime, background memory sync disabled"
            );
            return;
        };
        let sync = &self.inner.settings.sync;
        let mut background = self.background();

        if sync.interval_minutes > 0 {
            background.interval_stop = spawn_interval_sync(
                &handle,
                Arc::downgrade(&self.inner),
                sync.interval_minutes,
            );
        }

        if sync.watch {
            let weak = Arc::downgrade(&self.inner);
            let extra_paths =
                normalize_extra_paths(&self.inner.workspace_dir, &self.inner.settings.extra_paths);
            match watch_memory_paths(&handle, &self.inner.workspace_dir, &extra_paths, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.mark_dirty();
                }
            }) {
                Ok(watcher) => background.watcher = Some(watcher),
                Err(err) => warn!(
                    agent_id = %self.inner.agent_id,
                    error = %err,
                    "memory watcher unavailable"
                ),
            }
        }
    }

    fn background(&self) -> std::sync::MutexGuard<'_, Background> {
        self.inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn agent_id(&self) -> &str {
        &self.inner.agent_id
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.inner.workspace_dir
    }

    pub fn settings(&self) -> &ResolvedMemorySearch {
        &self.inner.settings
    }

    pub fn key(&self) -> &ManagerKey {
        &self.inner.key
    }

    /// Whether both handles address the same live instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Flag the index stale so the next search resyncs first.
    pub fn mark_dirty(&self) {
        self.inner.mark_dirty();
    }

    /// The currently installed index.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(
            &self
                .inner
                .snapshot
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Rank indexed chunks against `query`.
    ///
    /// A dirty index is resynced first when `sync.on_search` is set. Queries
    /// with no searchable terms return nothing and leave the index alone.
    pub async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> MemoryResult<Vec<MemorySearchResult>> {
        if tokenize(query).is_empty() {
            return Ok(Vec::new());
        }
        if self.inner.settings.sync.on_search && self.is_dirty() {
            self.sync(SyncRequest::reason("search")).await?;
        }

        let defaults = &self.inner.settings.query;
        let max_results = options.max_results.unwrap_or(defaults.max_results);
        let min_score = options.min_score.unwrap_or(defaults.min_score);
        Ok(rank(&self.snapshot(), query, max_results, min_score))
    }

    pub async fn read_file(&self, request: ReadFileRequest) -> MemoryResult<ReadFileResult> {
        read_memory_file(
            &self.inner.workspace_dir,
            &self.inner.settings.extra_paths,
            self.inner.collaborators.classifier.as_ref(),
            &request,
        )
        .await
    }

    /// Rebuild the index from the source files.
    ///
    /// Calls made while a pass is running join that pass; their own `force`
    /// and `progress` are ignored.
    pub async fn sync(&self, request: SyncRequest) -> MemoryResult<()> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .flight
            .join_or_start(move || run_sync(inner, request))
            .await
            .map_err(MemoryError::Sync)
    }

    pub fn status(&self) -> ManagerStatus {
        let snapshot = self.snapshot();
        let settings = &self.inner.settings;

        let mut per_source: HashMap<MemorySource, (BTreeSet<&str>, usize)> = settings
            .sources
            .iter()
            .map(|source| (*source, (BTreeSet::new(), 0)))
            .collect();
        let mut files = BTreeSet::new();
        for doc in snapshot.docs() {
            files.insert(doc.path.as_str());
            if let Some((paths, chunks)) = per_source.get_mut(&doc.source) {
                paths.insert(doc.path.as_str());
                *chunks += 1;
            }
        }

        let source_counts = settings
            .sources
            .iter()
            .map(|source| {
                let (paths, chunks) = &per_source[source];
                SourceCount {
                    source: *source,
                    files: paths.len(),
                    chunks: *chunks,
                }
            })
            .collect();

        ManagerStatus {
            backend: BACKEND.to_string(),
            provider: PROVIDER.to_string(),
            model: MODEL.to_string(),
            requested_provider: PROVIDER.to_string(),
            agent_id: self.inner.agent_id.clone(),
            files: files.len(),
            chunks: snapshot.len(),
            dirty: self.is_dirty(),
            workspace_dir: self.inner.workspace_dir.clone(),
            extra_paths: settings.extra_paths.clone(),
            sources: settings.sources.clone(),
            source_counts,
            vector: CapabilityFlag {
                enabled: false,
                available: false,
            },
            fts: CapabilityFlag {
                enabled: true,
                available: true,
            },
            cache: CacheStatus { enabled: false },
            last_sync_at: *self
                .inner
                .last_sync_at
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Always available: this backend needs no embedding provider.
    pub async fn probe_embedding_availability(&self) -> EmbeddingProbe {
        EmbeddingProbe {
            ok: true,
            error: None,
        }
    }

    pub async fn probe_vector_availability(&self) -> bool {
        false
    }

    /// Stop background work and leave the registry.
    ///
    /// Idempotent. A sync already running finishes into this detached
    /// instance; the next registry lookup builds a fresh one.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut background = self.background();
            if let Some(stop) = background.interval_stop.take() {
                let _ = stop.send(());
            }
            background.watcher = None;
        }

        if let Some(registry) = self.inner.registry.upgrade() {
            registry.evict(self);
        }
        debug!(agent_id = %self.inner.agent_id, "memory manager closed");
    }
}

impl std::fmt::Debug for MemoryIndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIndexManager")
            .field("agent_id", &self.inner.agent_id)
            .field("workspace_dir", &self.inner.workspace_dir)
            .field("dirty", &self.is_dirty())
            .field("syncing", &self.inner.flight.is_running())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn run_sync(inner: Arc<ManagerInner>, request: SyncRequest) -> MemoryResult<()> {
    let started = std::time::Instant::now();
    let changes_at_start = inner.changes.load(Ordering::SeqCst);
    let reason = request.reason.as_deref().unwrap_or("manual");
    debug!(
        agent_id = %inner.agent_id,
        reason,
        force = request.force,
        "memory sync started"
    );

    let scope = SyncScope {
        agent_id: &inner.agent_id,
        workspace_dir: &inner.workspace_dir,
        settings: &inner.settings,
        collaborators: &inner.collaborators,
    };
    let records = collect_records(&scope, request.progress.as_ref()).await?;
    let snapshot = IndexSnapshot::build(&records);
    let chunks = snapshot.len();
    inner.install(snapshot);

    // a change seen mid-pass may not be in this snapshot
    let stale = inner.changes.load(Ordering::SeqCst) != changes_at_start;
    inner.dirty.store(stale, Ordering::SeqCst);

    info!(
        agent_id = %inner.agent_id,
        reason,
        files = records.len(),
        chunks,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "memory sync finished"
    );
    Ok(())
}

/// Resync every `minutes` until the stop sender fires or the manager is gone.
///
/// Returns `None` when the period is too large to schedule.
fn spawn_interval_sync(
    handle: &Handle,
    inner: Weak<ManagerInner>,
    minutes: u64,
) -> Option<oneshot::Sender<()>> {
    let period = Duration::from_secs(minutes.saturating_mul(60));
    let Some(first_tick) = Instant::now().checked_add(period) else {
        warn!(minutes, "memory sync interval out of range, periodic sync disabled");
        return None;
    };
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    handle.spawn(async move {
        let mut interval = interval_at(first_tick, period);
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = interval.tick() => {
                    let Some(inner) = inner.upgrade() else {
                        break;
                    };
                    let manager = MemoryIndexManager { inner };
                    if let Err(err) = manager.sync(SyncRequest::reason("interval")).await {
                        warn!(
                            agent_id = %manager.agent_id(),
                            error = %err,
                            "memory sync failed (interval)"
                        );
                    }
                }
            }
        }
    });

    debug!(minutes, "interval memory sync scheduled");
    Some(stop_tx)
}
