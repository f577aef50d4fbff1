//! File-backed BM25 memory search for kioku agents.
//!
//! Memory notes (`MEMORY.md`, `memory/**/*.md`, extra paths) and optionally
//! session transcripts are chunked and held in an in-process inverted index.
//! Nothing is persisted; each process rebuilds the index from the files.

pub mod chunker;
pub mod errors;
pub mod index;
pub mod manager;
pub mod models;
pub mod paths;
pub(crate) mod reader;
pub mod registry;
pub mod search;
pub mod sessions;
pub mod sources;
pub(crate) mod sync;
pub mod tokenizer;
pub(crate) mod watcher;

pub use chunker::{Chunk, Chunker, MarkdownChunker, remap_chunk_lines};
pub use errors::{MemoryError, MemoryResult};
pub use index::{IndexRecord, IndexSnapshot, IndexedChunk, Posting};
pub use kioku_core::{ChunkingPolicy, MemorySource, ResolvedMemorySearch};
pub use manager::{ManagerParams, MemoryIndexManager};
pub use models::{
    CacheStatus, CapabilityFlag, EmbeddingProbe, ManagerStatus, MemorySearchResult, ProgressFn,
    ReadFileRequest, ReadFileResult, SearchOptions, SourceCount, SyncProgress, SyncRequest,
};
pub use paths::{MemoryPathClassifier, PathClassifier};
pub use registry::{ManagerKey, MemoryManagerRegistry};
pub use sessions::{SessionEntry, SessionSource, TranscriptSessions};
pub use sources::{Collaborators, MemoryFileLister, WorkspaceMemoryFiles};
