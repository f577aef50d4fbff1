use std::collections::HashMap;

use kioku_core::MemorySource;

use crate::chunker::Chunk;
use crate::tokenizer::{count_terms, tokenize};

pub const SNIPPET_MAX_CHARS: usize = 700;

/// One retrievable document of the current snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub id: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub source: MemorySource,
    pub text: String,
    pub snippet: String,
    /// Sum of term frequencies (at least 1).
    pub length: usize,
}

/// A term occurrence count within one document of the same snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub index: usize,
    pub tf: usize,
}

/// Chunks of one source file awaiting indexing.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub path: String,
    pub source: MemorySource,
    pub chunks: Vec<Chunk>,
}

/// Immutable inverted index.
///
/// Posting indices are only meaningful against the `docs` of the same
/// snapshot; a sync builds a whole new snapshot and swaps it in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSnapshot {
    docs: Vec<IndexedChunk>,
    postings: HashMap<String, Vec<Posting>>,
    doc_frequency: HashMap<String, usize>,
    avg_doc_length: f64,
}

impl IndexSnapshot {
    pub fn build(records: &[IndexRecord]) -> Self {
        let mut docs: Vec<IndexedChunk> = Vec::new();
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_frequency: HashMap<String, usize> = HashMap::new();

        for record in records {
            for chunk in &record.chunks {
                let terms = count_terms(tokenize(&chunk.text));
                if terms.is_empty() {
                    continue;
                }
                let index = docs.len();
                let length = terms.values().sum::<usize>().max(1);
                docs.push(IndexedChunk {
                    id: format!("{}:{}:{}", record.path, chunk.start_line, chunk.end_line),
                    path: record.path.clone(),
                    start_line: chunk.start_line,
                    end_line: chunk.end_line,
                    source: record.source,
                    text: chunk.text.clone(),
                    snippet: snippet_for_text(&chunk.text),
                    length,
                });

                for (term, tf) in terms {
                    *doc_frequency.entry(term.clone()).or_insert(0) += 1;
                    postings.entry(term).or_default().push(Posting { index, tf });
                }
            }
        }

        let avg_doc_length = if docs.is_empty() {
            0.0
        } else {
            docs.iter().map(|doc| doc.length as f64).sum::<f64>() / docs.len() as f64
        };

        Self {
            docs,
            postings,
            doc_frequency,
            avg_doc_length,
        }
    }

    pub fn docs(&self) -> &[IndexedChunk] {
        &self.docs
    }

    pub fn postings(&self) -> &HashMap<String, Vec<Posting>> {
        &self.postings
    }

    pub fn doc_frequency(&self) -> &HashMap<String, usize> {
        &self.doc_frequency
    }

    pub fn avg_doc_length(&self) -> f64 {
        self.avg_doc_length
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Collapse whitespace and cap at [`SNIPPET_MAX_CHARS`], ending with `…`
/// when truncated.
pub fn snippet_for_text(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= SNIPPET_MAX_CHARS {
        return normalized;
    }
    let mut snippet: String = normalized.chars().take(SNIPPET_MAX_CHARS - 1).collect();
    snippet.push('…');
    snippet
}
