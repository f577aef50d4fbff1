//! Sandboxed reads of memory documents.
//!
//! A path is served only when it is a memory document inside the workspace or
//! lies within a configured extra path, is a markdown file, and is a regular
//! file rather than a symlink. Every rejection is the same
//! [`MemoryError::PathRejected`] so callers cannot probe the filesystem layout.

use std::path::Path;

use crate::errors::{MemoryError, MemoryResult};
use crate::models::{ReadFileRequest, ReadFileResult};
use crate::paths::{
    PathClassifier, is_markdown, is_workspace_contained, normalize_extra_paths, normalize_path,
    relative_path, resolve_path, to_slash,
};

pub(crate) async fn read_memory_file(
    workspace_dir: &Path,
    extra_paths: &[String],
    classifier: &dyn PathClassifier,
    request: &ReadFileRequest,
) -> MemoryResult<ReadFileResult> {
    let raw = request.rel_path.trim();
    if raw.is_empty() {
        return Err(MemoryError::PathRejected);
    }

    let workspace_dir = normalize_path(workspace_dir);
    let abs_path = resolve_path(&workspace_dir, Path::new(raw));
    let rel_path = to_slash(&relative_path(&workspace_dir, &abs_path));

    let allowed_workspace =
        is_workspace_contained(Path::new(&rel_path)) && classifier.is_memory_path(&rel_path);
    let allowed = allowed_workspace
        || allowed_by_extra_paths(&workspace_dir, extra_paths, &abs_path).await;
    if !allowed || !is_markdown(&abs_path) {
        return Err(MemoryError::PathRejected);
    }

    let meta = tokio::fs::symlink_metadata(&abs_path)
        .await
        .map_err(|_| MemoryError::PathRejected)?;
    if meta.file_type().is_symlink() || !meta.is_file() {
        return Err(MemoryError::PathRejected);
    }

    let content = tokio::fs::read_to_string(&abs_path)
        .await
        .map_err(|_| MemoryError::PathRejected)?;

    Ok(ReadFileResult {
        text: slice_lines(&content, request.from, request.lines),
        path: rel_path,
    })
}

async fn allowed_by_extra_paths(workspace_dir: &Path, extra_paths: &[String], target: &Path) -> bool {
    for allowed in normalize_extra_paths(workspace_dir, extra_paths) {
        if extra_path_admits(&allowed, target).await {
            return true;
        }
    }
    false
}

async fn extra_path_admits(allowed: &Path, target: &Path) -> bool {
    let Ok(meta) = tokio::fs::symlink_metadata(allowed).await else {
        return false;
    };
    if meta.file_type().is_symlink() {
        return false;
    }
    if meta.is_dir() {
        return target.starts_with(allowed);
    }
    meta.is_file() && target == allowed && is_markdown(target)
}

/// Select `lines` lines starting at the 1-based `from`.
///
/// Without either bound the whole text is returned untouched.
fn slice_lines(content: &str, from: Option<i64>, lines: Option<i64>) -> String {
    let from = from.filter(|value| *value != 0);
    let lines = lines.filter(|value| *value != 0);
    if from.is_none() && lines.is_none() {
        return content.to_string();
    }

    let all: Vec<&str> = content.split('\n').collect();
    let start = from.unwrap_or(1).max(1) as usize;
    let count = lines.map(|value| value.max(1) as usize).unwrap_or(all.len().max(1));

    all.iter()
        .skip(start - 1)
        .take(count)
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_text_without_bounds() {
        assert_eq!(slice_lines("a\nb\nc", None, None), "a\nb\nc");
        assert_eq!(slice_lines("a\nb\nc", Some(0), Some(0)), "a\nb\nc");
    }

    #[test]
    fn slices_with_clamped_bounds() {
        let text = "one\ntwo\nthree\nfour";
        assert_eq!(slice_lines(text, Some(2), Some(2)), "two\nthree");
        assert_eq!(slice_lines(text, Some(3), None), "three\nfour");
        assert_eq!(slice_lines(text, None, Some(1)), "one");
        assert_eq!(slice_lines(text, Some(-4), Some(1)), "one");
        assert_eq!(slice_lines(text, Some(2), Some(-3)), "two");
        assert_eq!(slice_lines(text, Some(10), Some(2)), "");
    }
}
