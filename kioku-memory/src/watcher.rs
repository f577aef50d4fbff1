use std::path::{Path, PathBuf};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::MemoryResult;
use crate::paths::{MEMORY_DIR, is_markdown};

/// Filesystem watch over the memory sources of one workspace.
///
/// Dropping it stops both the OS watch and the forwarding task.
pub(crate) struct MemoryWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for MemoryWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Call `on_change` whenever a markdown file under the watched roots changes.
pub(crate) fn watch_memory_paths<F>(
    handle: &Handle,
    workspace_dir: &Path,
    extra_paths: &[PathBuf],
    on_change: F,
) -> MemoryResult<MemoryWatcher>
where
    F: Fn() + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();

    let mut watcher: RecommendedWatcher =
        notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                if let Some(path) = event.paths.into_iter().find(|path| is_markdown(path)) {
                    let _ = tx.send(path);
                }
            }
            Err(err) => warn!("memory watcher error: {err}"),
        })?;

    for (root, mode) in watch_roots(workspace_dir, extra_paths) {
        if let Err(err) = watcher.watch(&root, mode) {
            warn!(path = %root.display(), error = %err, "failed to watch memory path");
        }
    }

    let task = handle.spawn(async move {
        while let Some(path) = rx.recv().await {
            debug!(path = %path.display(), "memory file changed");
            on_change();
        }
    });

    Ok(MemoryWatcher {
        _watcher: watcher,
        task,
    })
}

fn watch_roots(workspace_dir: &Path, extra_paths: &[PathBuf]) -> Vec<(PathBuf, RecursiveMode)> {
    let mut roots = Vec::new();
    if workspace_dir.is_dir() {
        roots.push((workspace_dir.to_path_buf(), RecursiveMode::NonRecursive));
    }

    let memory_dir = workspace_dir.join(MEMORY_DIR);
    if is_plain_dir(&memory_dir) {
        roots.push((memory_dir, RecursiveMode::Recursive));
    }

    for extra in extra_paths {
        let Ok(meta) = std::fs::symlink_metadata(extra) else {
            continue;
        };
        if meta.file_type().is_symlink() {
            continue;
        }
        if meta.is_dir() {
            roots.push((extra.clone(), RecursiveMode::Recursive));
        } else if meta.is_file() && is_markdown(extra) {
            roots.push((extra.clone(), RecursiveMode::NonRecursive));
        }
    }
    roots
}

fn is_plain_dir(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}
