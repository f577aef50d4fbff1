use kioku_core::ChunkingPolicy;

/// A line-bounded slice of a source text.
///
/// Line numbers are 1-based and inclusive, relative to the chunked text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

/// Splits raw text into ordered chunks.
pub trait Chunker: Send + Sync {
    fn chunk(&self, text: &str, policy: &ChunkingPolicy) -> Vec<Chunk>;
}

/// Default line-accumulating markdown chunker.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownChunker;

impl Chunker for MarkdownChunker {
    fn chunk(&self, text: &str, policy: &ChunkingPolicy) -> Vec<Chunk> {
        chunk_markdown(text, policy)
    }
}

const CHARS_PER_TOKEN: usize = 4;
const MIN_CHUNK_CHARS: usize = 32;

/// Accumulate whole lines until the character budget is reached.
///
/// The budget is `tokens * 4` characters. Consecutive chunks share trailing
/// lines worth roughly `overlap * 4` characters. Lines longer than the budget
/// are split into segments that keep the original line number.
pub fn chunk_markdown(content: &str, policy: &ChunkingPolicy) -> Vec<Chunk> {
    let max_chars = policy
        .tokens
        .saturating_mul(CHARS_PER_TOKEN)
        .max(MIN_CHUNK_CHARS);
    let overlap_chars = policy.overlap.saturating_mul(CHARS_PER_TOKEN);

    let mut chunks = Vec::new();
    let mut current: Vec<(String, usize)> = Vec::new();
    let mut current_chars = 0;

    for (idx, line) in content.split('\n').enumerate() {
        let line_no = idx + 1;
        for segment in split_line(line, max_chars) {
            let size = segment.len() + 1;
            if current_chars + size > max_chars && !current.is_empty() {
                chunks.push(build_chunk(&current));
                current = carry_overlap(&current, overlap_chars);
                current_chars = current.iter().map(|(s, _)| s.len() + 1).sum();
            }
            current_chars += size;
            current.push((segment, line_no));
        }
    }

    if !current.is_empty() {
        chunks.push(build_chunk(&current));
    }

    chunks
}

fn split_line(line: &str, max_chars: usize) -> Vec<String> {
    if line.chars().count() <= max_chars {
        return vec![line.to_string()];
    }
    line.chars()
        .collect::<Vec<_>>()
        .chunks(max_chars)
        .map(|segment| segment.iter().collect())
        .collect()
}

fn build_chunk(lines: &[(String, usize)]) -> Chunk {
    let start_line = lines.first().map(|(_, n)| *n).unwrap_or(1);
    let end_line = lines.last().map(|(_, n)| *n).unwrap_or(start_line);
    let text = lines
        .iter()
        .map(|(s, _)| s.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    Chunk {
        start_line,
        end_line,
        text,
    }
}

fn carry_overlap(lines: &[(String, usize)], overlap_chars: usize) -> Vec<(String, usize)> {
    if overlap_chars == 0 {
        return Vec::new();
    }
    let mut kept = Vec::new();
    let mut acc = 0;
    for entry in lines.iter().rev() {
        acc += entry.0.len() + 1;
        kept.push(entry.clone());
        if acc >= overlap_chars {
            break;
        }
    }
    kept.reverse();
    kept
}

/// Rewrite chunk line ranges through a 1-based line map.
///
/// `line_map[i]` is the source line of extracted line `i + 1`. Lines without
/// a mapping keep their value.
pub fn remap_chunk_lines(chunks: &mut [Chunk], line_map: &[usize]) {
    if line_map.is_empty() {
        return;
    }
    for chunk in chunks.iter_mut() {
        chunk.start_line = map_line(line_map, chunk.start_line);
        chunk.end_line = map_line(line_map, chunk.end_line);
    }
}

fn map_line(line_map: &[usize], line: usize) -> usize {
    line.checked_sub(1)
        .and_then(|idx| line_map.get(idx))
        .copied()
        .unwrap_or(line)
}
