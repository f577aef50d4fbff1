//! Session transcript discovery and extraction.
//!
//! Transcripts are JSONL files under `<sessions root>/<agent>/sessions/`.
//! Only user and assistant message text is indexed; everything else in the
//! transcript (tool calls, metadata records) is ignored.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use kioku_core::paths::agent_sessions_dir;
use serde_json::Value;

use crate::errors::MemoryResult;

pub const SESSION_EXTENSION: &str = "jsonl";
pub const SESSION_PATH_PREFIX: &str = "sessions";

/// Extracted, indexable text of one transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    /// Normalized path used in results, e.g. `sessions/2025-01-01.jsonl`.
    pub path: String,
    pub content: String,
    /// `line_map[i]` is the transcript line of content line `i + 1`.
    pub line_map: Vec<usize>,
}

#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Transcript files belonging to `agent_id`.
    async fn list(&self, agent_id: &str) -> MemoryResult<Vec<PathBuf>>;

    /// Extract indexable text; `None` when the file yields nothing.
    async fn build(&self, path: &Path) -> MemoryResult<Option<SessionEntry>>;
}

/// JSONL transcripts stored under a sessions root.
#[derive(Debug, Clone)]
pub struct TranscriptSessions {
    root: PathBuf,
}

impl TranscriptSessions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl SessionSource for TranscriptSessions {
    async fn list(&self, agent_id: &str) -> MemoryResult<Vec<PathBuf>> {
        let dir = agent_sessions_dir(&self.root, agent_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SESSION_EXTENSION) {
                continue;
            }
            if entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn build(&self, path: &Path) -> MemoryResult<Option<SessionEntry>> {
        let raw = tokio::fs::read_to_string(path).await?;
        let (content, line_map) = extract_transcript(&raw);
        if content.trim().is_empty() {
            return Ok(None);
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Some(SessionEntry {
            path: format!("{SESSION_PATH_PREFIX}/{name}"),
            content,
            line_map,
        }))
    }
}

/// Turn a JSONL transcript into `User: …` / `Assistant: …` lines.
///
/// Malformed JSON lines are skipped.
pub fn extract_transcript(raw: &str) -> (String, Vec<usize>) {
    let mut lines = Vec::new();
    let mut line_map = Vec::new();

    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(record) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if record.get("type").and_then(Value::as_str) != Some("message") {
            continue;
        }
        let Some(message) = record.get("message") else {
            continue;
        };
        let label = match message.get("role").and_then(Value::as_str) {
            Some("user") => "User",
            Some("assistant") => "Assistant",
            _ => continue,
        };
        let Some(text) = message.get("content").and_then(message_text) else {
            continue;
        };
        lines.push(format!("{label}: {text}"));
        line_map.push(idx + 1);
    }

    (lines.join("\n"), line_map)
}

fn message_text(content: &Value) -> Option<String> {
    let text = match content {
        Value::String(text) => collapse_whitespace(text),
        Value::Array(parts) => {
            let texts: Vec<String> = parts
                .iter()
                .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .map(collapse_whitespace)
                .filter(|text| !text.is_empty())
                .collect();
            texts.join(" ")
        }
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
