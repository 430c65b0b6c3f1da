use serde::{Deserialize, Serialize};

/// Whether a discovered file is source code or documentation, used to pick
/// discovery order and the per-kind token cap (SPEC_FULL.md §4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Code,
    Doc,
}

/// A single file discovered by the File Walker (C2).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileRecord {
    pub relative_path: String,
    pub kind: FileKind,
    pub language_hint: Option<String>,
    pub content: String,
    pub token_count: usize,
    /// False when the path or name indicates a test fixture (SPEC_FULL.md §3.1).
    pub is_implementation: bool,
}

/// The base token cap shared by code and documentation files; code is
/// capped at `10 * BASE_TOKEN_CAP`, docs at `1 * BASE_TOKEN_CAP` (§4.2).
pub const BASE_TOKEN_CAP: usize = 8192;
pub const CODE_TOKEN_CAP_MULTIPLIER: usize = 10;
pub const DOC_TOKEN_CAP_MULTIPLIER: usize = 1;

impl FileKind {
    pub fn cap_multiplier(self) -> usize {
        match self {
            FileKind::Code => CODE_TOKEN_CAP_MULTIPLIER,
            FileKind::Doc => DOC_TOKEN_CAP_MULTIPLIER,
        }
    }

    pub fn token_cap(self) -> usize {
        self.cap_multiplier() * BASE_TOKEN_CAP
    }
}

/// A bounded, token-capped span of a source file — the atomic unit of
/// retrieval (C3 Chunker output, persisted as part of a [`super::RepositoryIndex`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub owner_repo_id: String,
    pub source_path: String,
    pub text: String,
    pub token_count: usize,
    pub ordinal_within_file: usize,
    /// Populated once C5 has embedded the chunk; `None` before embedding or
    /// after being dropped during dimension reconciliation (§4.6).
    pub vector: Option<Vec<f32>>,
}

impl Chunk {
    pub fn dimension(&self) -> Option<usize> {
        self.vector.as_ref().map(Vec::len)
    }
}
