use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kioku_core::{
    ResolvedMemorySearch, Settings, resolve_agent_workspace, resolve_memory_search, sessions_root,
};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::errors::MemoryResult;
use crate::manager::{ManagerParams, MemoryIndexManager};
use crate::paths::normalize_path;
use crate::sources::Collaborators;

/// Identity of a cached manager.
///
/// Every input that changes what gets indexed or how it is queried is part of
/// the key, so two agents never share an index by accident.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManagerKey {
    pub agent_id: String,
    pub workspace_dir: PathBuf,
    /// Hex SHA-256 of the JSON-serialized resolved settings.
    pub settings_fingerprint: String,
}

impl ManagerKey {
    pub fn new(
        agent_id: impl Into<String>,
        workspace_dir: impl Into<PathBuf>,
        settings: &ResolvedMemorySearch,
    ) -> MemoryResult<Self> {
        let encoded = serde_json::to_vec(settings)?;
        Ok(Self {
            agent_id: agent_id.into(),
            workspace_dir: workspace_dir.into(),
            settings_fingerprint: hex::encode(Sha256::digest(&encoded)),
        })
    }
}

/// Live managers keyed by [`ManagerKey`].
///
/// Shared by `Arc` between the components that need memory search; requests
/// with an identical key get the same instance.
#[derive(Default)]
pub struct MemoryManagerRegistry {
    managers: Mutex<HashMap<ManagerKey, MemoryIndexManager>>,
}

impl MemoryManagerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Manager for `agent_id` using the built-in collaborators.
    ///
    /// Returns `None` when memory search is disabled for the agent.
    pub fn get(
        self: &Arc<Self>,
        settings: &Settings,
        agent_id: &str,
    ) -> MemoryResult<Option<MemoryIndexManager>> {
        let Some(resolved) = resolve_memory_search(settings, agent_id) else {
            return Ok(None);
        };
        let workspace_dir = resolve_agent_workspace(settings, agent_id)?;
        let collaborators = Collaborators::workspace_defaults(sessions_root()?);

        self.get_with(ManagerParams {
            agent_id: agent_id.to_string(),
            workspace_dir,
            settings: resolved,
            collaborators,
        })
        .map(Some)
    }

    /// Manager for explicit parameters.
    ///
    /// Collaborators are not part of the key: the first instance built for a
    /// key keeps the collaborators it was created with.
    pub fn get_with(self: &Arc<Self>, params: ManagerParams) -> MemoryResult<MemoryIndexManager> {
        let workspace_dir = normalize_path(&std::path::absolute(&params.workspace_dir)?);
        let key = ManagerKey::new(&params.agent_id, workspace_dir.clone(), &params.settings)?;

        let mut managers = self.lock();
        if let Some(existing) = managers.get(&key) {
            return Ok(existing.clone());
        }

        info!(
            agent_id = %params.agent_id,
            workspace = %workspace_dir.display(),
            "creating memory manager"
        );
        let manager = MemoryIndexManager::start(
            key.clone(),
            ManagerParams {
                workspace_dir,
                ..params
            },
            Arc::downgrade(self),
        );
        managers.insert(key, manager.clone());
        Ok(manager)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Close every live manager.
    pub fn close_all(&self) {
        let managers: Vec<MemoryIndexManager> = self.lock().drain().map(|(_, m)| m).collect();
        for manager in managers {
            manager.close();
        }
    }

    /// Drop `manager` from the map unless a newer instance took its key.
    pub(crate) fn evict(&self, manager: &MemoryIndexManager) {
        let mut managers = self.lock();
        if managers
            .get(manager.key())
            .is_some_and(|current| current.ptr_eq(manager))
        {
            managers.remove(manager.key());
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ManagerKey, MemoryIndexManager>> {
        self.managers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MemoryManagerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManagerRegistry")
            .field("managers", &self.len())
            .finish()
    }
}
