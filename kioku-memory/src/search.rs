use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::index::IndexSnapshot;
use crate::models::MemorySearchResult;
use crate::tokenizer::tokenize;

pub const BM25_K1: f64 = 1.2;
pub const BM25_B: f64 = 0.75;
pub const PHRASE_BONUS: f64 = 0.2;
const SCORE_FLOOR: f64 = 1e-9;

/// Rank the snapshot's documents against `query`.
///
/// Scores are BM25 sums over distinct query terms plus a flat bonus when the
/// whole query appears verbatim, normalized by the best raw score. Results
/// below `min_score` are dropped. Equal scores keep index order, but callers
/// must not rely on any particular order among ties.
pub fn rank(
    snapshot: &IndexSnapshot,
    query: &str,
    max_results: usize,
    min_score: f64,
) -> Vec<MemorySearchResult> {
    let cleaned = query.trim();
    if cleaned.is_empty() || snapshot.is_empty() {
        return Vec::new();
    }

    let terms = tokenize(cleaned);
    if terms.is_empty() {
        return Vec::new();
    }

    let docs = snapshot.docs();
    let doc_count = docs.len() as f64;
    let avg_len = snapshot.avg_doc_length().max(1.0);
    let mut scores: HashMap<usize, f64> = HashMap::new();
    let mut seen = HashSet::new();

    for term in &terms {
        if !seen.insert(term.as_str()) {
            continue;
        }
        let Some(postings) = snapshot.postings().get(term) else {
            continue;
        };
        let df = snapshot.doc_frequency().get(term).copied().unwrap_or(0);
        if df == 0 {
            continue;
        }
        let df = df as f64;
        let idf = (1.0 + (doc_count - df + 0.5) / (df + 0.5)).ln();

        for posting in postings {
            let Some(doc) = docs.get(posting.index) else {
                continue;
            };
            let tf = posting.tf as f64;
            let norm = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * (doc.length as f64 / avg_len));
            let score = idf * (tf * (BM25_K1 + 1.0)) / norm.max(SCORE_FLOOR);
            *scores.entry(posting.index).or_insert(0.0) += score;
        }
    }

    if scores.is_empty() {
        return Vec::new();
    }

    let phrase = cleaned.to_lowercase();
    for (index, score) in scores.iter_mut() {
        if *score > 0.0 && docs[*index].text.to_lowercase().contains(&phrase) {
            *score += PHRASE_BONUS;
        }
    }

    let max_raw = scores.values().copied().fold(SCORE_FLOOR, f64::max);

    let mut ranked: Vec<(usize, f64)> = scores
        .into_iter()
        .map(|(index, raw)| (index, (raw / max_raw).clamp(0.0, 1.0)))
        .filter(|(_, score)| *score >= min_score)
        .collect();
    ranked.sort_by_key(|(index, _)| *index);
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(max_results);

    ranked
        .into_iter()
        .map(|(index, score)| {
            let doc = &docs[index];
            MemorySearchResult {
                path: doc.path.clone(),
                start_line: doc.start_line,
                end_line: doc.end_line,
                score,
                snippet: doc.snippet.clone(),
                source: doc.source,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use kioku_core::MemorySource;

    use super::*;
    use crate::chunker::Chunk;
    use crate::index::IndexRecord;

    fn snapshot(docs: &[(&str, &str)]) -> IndexSnapshot {
        let records: Vec<IndexRecord> = docs
            .iter()
            .map(|(path, text)| IndexRecord {
                path: path.to_string(),
                source: MemorySource::Memory,
                chunks: vec![Chunk {
                    start_line: 1,
                    end_line: 1,
                    text: text.to_string(),
                }],
            })
            .collect();
        IndexSnapshot::build(&records)
    }

    #[test]
    fn finds_matching_document() {
        let snap = snapshot(&[
            (
                "MEMORY.md",
                "OpenClaw supports lightweight text memory backend. BM25 retrieval works.",
            ),
            ("memory/other.md", "Unrelated gardening notes about tomatoes."),
        ]);

        let results = rank(&snap, "lightweight backend", 6, 0.35);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "MEMORY.md");
        assert!(results[0].score > 0.0);
        assert_eq!(results[0].score, 1.0);
    }

    #[test]
    fn empty_and_short_queries_return_nothing() {
        let snap = snapshot(&[("MEMORY.md", "some text")]);
        assert!(rank(&snap, "", 6, 0.0).is_empty());
        assert!(rank(&snap, "   \t", 6, 0.0).is_empty());
        assert!(rank(&snap, "a b ?", 6, 0.0).is_empty());
        assert!(rank(&IndexSnapshot::default(), "text", 6, 0.0).is_empty());
    }

    #[test]
    fn scores_stay_within_unit_interval_and_sorted() {
        let snap = snapshot(&[
            ("a.md", "rust rust rust memory"),
            ("b.md", "rust memory index"),
            ("c.md", "memory only here"),
            ("d.md", "nothing relevant"),
        ]);

        let results = rank(&snap, "rust memory", 10, 0.0);
        assert_eq!(results.len(), 3);
        for result in &results {
            assert!((0.0..=1.0).contains(&result.score));
        }
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(results[0].score, 1.0);
    }

    #[test]
    fn phrase_bonus_prefers_verbatim_match() {
        let snap = snapshot(&[
            ("a.md", "backend lightweight"),
            ("b.md", "lightweight backend"),
        ]);
        let results = rank(&snap, "lightweight backend", 10, 0.0);
        assert_eq!(results[0].path, "b.md");
        assert!(results[1].score < 1.0);
    }

    #[test]
    fn min_score_and_max_results_are_applied() {
        let snap = snapshot(&[
            ("a.md", "alpha alpha alpha beta"),
            ("b.md", "alpha gamma delta epsilon zeta eta theta"),
            ("c.md", "alpha"),
        ]);

        assert_eq!(rank(&snap, "alpha", 2, 0.0).len(), 2);
        let strict = rank(&snap, "alpha", 10, 0.99);
        assert!(strict.iter().all(|r| r.score >= 0.99));
        assert!(strict.len() < 3);
    }

    #[test]
    fn repeated_query_terms_count_once() {
        let snap = snapshot(&[("a.md", "memory notes"), ("b.md", "other memory text here")]);
        let once = rank(&snap, "notes", 10, 0.0);
        let twice = rank(&snap, "notes notes", 10, 0.0);
        assert_eq!(once.len(), twice.len());
        assert_eq!(once[0].path, twice[0].path);
    }
}
