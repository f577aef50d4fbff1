use std::path::{Component, Path, PathBuf};

use kioku_core::paths::expand_home;

pub const MEMORY_FILE: &str = "MEMORY.md";
pub const MEMORY_FILE_ALT: &str = "memory.md";
pub const MEMORY_DIR: &str = "memory";

/// Decides whether a workspace-relative path belongs to the memory namespace.
pub trait PathClassifier: Send + Sync {
    fn is_memory_path(&self, workspace_relative: &str) -> bool;
}

/// `MEMORY.md`, `memory.md` or anything under `memory/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryPathClassifier;

impl PathClassifier for MemoryPathClassifier {
    fn is_memory_path(&self, workspace_relative: &str) -> bool {
        is_memory_path(workspace_relative)
    }
}

pub fn is_memory_path(rel_path: &str) -> bool {
    let normalized = rel_path.trim().replace('\\', "/");
    let normalized = normalized.trim_start_matches("./");
    if normalized.is_empty() {
        return false;
    }
    normalized == MEMORY_FILE
        || normalized == MEMORY_FILE_ALT
        || normalized.starts_with(&format!("{MEMORY_DIR}/"))
}

/// Resolve `raw` against `base` and normalize `.`/`..` lexically.
pub fn resolve_path(base: &Path, raw: &Path) -> PathBuf {
    if raw.is_absolute() {
        normalize_path(raw)
    } else {
        normalize_path(&base.join(raw))
    }
}

/// Lexical normalization; symlinks are not resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = normalized.parent().is_none();
                if !at_root {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Path of `target` relative to `base`, using `..` where needed.
///
/// Both paths are expected to be absolute and normalized. When they share no
/// root (different drive prefixes) `target` is returned unchanged.
pub fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base_parts: Vec<Component<'_>> = base.components().collect();
    let target_parts: Vec<Component<'_>> = target.components().collect();

    let common = base_parts
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 {
        return target.to_path_buf();
    }

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &target_parts[common..] {
        relative.push(part.as_os_str());
    }
    relative
}

/// Render a relative path with forward slashes.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// True when a workspace-relative path stays inside the workspace.
pub fn is_workspace_contained(relative: &Path) -> bool {
    if relative.as_os_str().is_empty() || relative.is_absolute() || relative.has_root() {
        return false;
    }
    !matches!(relative.components().next(), Some(Component::ParentDir))
}

/// Resolve configured extra paths to absolute, normalized, de-duplicated paths.
pub fn normalize_extra_paths(workspace_dir: &Path, extra_paths: &[String]) -> Vec<PathBuf> {
    let mut resolved: Vec<PathBuf> = Vec::new();
    for raw in extra_paths {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let path = resolve_path(workspace_dir, &expand_home(trimmed));
        if !resolved.contains(&path) {
            resolved.push(path);
        }
    }
    resolved
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("md")
}
