//! C3 Chunker (SPEC_FULL.md §4.3), built on `text-splitter`'s
//! `TextSplitter`/`MarkdownSplitter`, grounded on the teacher's original
//! `pipeline.rs::store_vector_chunks` (`TextSplitter::new(500..2000)`),
//! generalized to a configurable `(chunk_size, chunk_overlap)` pair and a
//! markdown-aware splitter for documentation files.

use std::sync::OnceLock;

use common::model::chunk::{Chunk, FileKind, FileRecord};
use text_splitter::{ChunkConfig, MarkdownSplitter, TextSplitter};
use tokenizers::Tokenizer;
use uuid::Uuid;

static CHUNK_TOKENIZER: OnceLock<Option<Tokenizer>> = OnceLock::new();

/// Loads the same optional BPE vocabulary the token counter uses, so
/// chunk boundaries and reported token counts agree. Falls back to
/// character-based capacity (scaled ~4 chars/token) when unavailable.
fn loaded_tokenizer() -> &'static Option<Tokenizer> {
    CHUNK_TOKENIZER.get_or_init(|| {
        let path = std::env::var("TOKENIZER_BPE_PATH").ok()?;
        Tokenizer::from_file(&path).ok()
    })
}

const CHARS_PER_TOKEN_ESTIMATE: usize = 4;

/// Splits `content` with a tokenizer-backed [`ChunkConfig`] when a real
/// vocabulary is loaded, else a character-count config scaled to
/// approximate the same token budget.
fn split(content: &str, is_markdown: bool, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let overlap = chunk_overlap.min(chunk_size.saturating_sub(1).max(1));
    if let Some(tokenizer) = loaded_tokenizer().clone() {
        let config = ChunkConfig::new(chunk_size)
            .with_sizer(tokenizer)
            .with_overlap(overlap)
            .unwrap_or_else(|_| ChunkConfig::new(chunk_size));
        if is_markdown {
            MarkdownSplitter::new(config).chunks(content).map(str::to_string).collect()
        } else {
            TextSplitter::new(config).chunks(content).map(str::to_string).collect()
        }
    } else {
        let char_capacity = chunk_size.saturating_mul(CHARS_PER_TOKEN_ESTIMATE).max(1);
        let char_overlap = overlap.saturating_mul(CHARS_PER_TOKEN_ESTIMATE);
        let config = ChunkConfig::new(char_capacity)
            .with_overlap(char_overlap)
            .unwrap_or_else(|_| ChunkConfig::new(char_capacity));
        if is_markdown {
            MarkdownSplitter::new(config).chunks(content).map(str::to_string).collect()
        } else {
            TextSplitter::new(config).chunks(content).map(str::to_string).collect()
        }
    }
}

/// Splits one file's content into ordered, overlap-aware chunks,
/// preserving source order and stamping each with a back-reference to
/// `source_path` and its `ordinal_within_file` (§4.3).
pub fn chunk(
    owner_repo_id: &str,
    file: &FileRecord,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    let is_markdown = matches!(file.kind, FileKind::Doc) && file.relative_path.ends_with(".md");
    let pieces = split(&file.content, is_markdown, chunk_size, chunk_overlap);

    pieces
        .into_iter()
        .enumerate()
        .map(|(ordinal, text)| {
            let token_count = text.len().div_ceil(CHARS_PER_TOKEN_ESTIMATE);
            Chunk {
                chunk_id: Uuid::new_v4().to_string(),
                owner_repo_id: owner_repo_id.to_string(),
                source_path: file.relative_path.clone(),
                text,
                token_count,
                ordinal_within_file: ordinal,
                vector: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::chunk::FileKind;

    fn file_record(content: &str, kind: FileKind, path: &str) -> FileRecord {
        FileRecord {
            relative_path: path.to_string(),
            kind,
            language_hint: None,
            content: content.to_string(),
            token_count: content.len().div_ceil(4),
            is_implementation: true,
        }
    }

    #[test]
    fn preserves_order_and_back_references() {
        let content = "fn a() {}\n".repeat(200);
        let record = file_record(&content, FileKind::Code, "src/lib.rs");
        let chunks = chunk("repo", &record, 50, 10);
        assert!(!chunks.is_empty());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.source_path, "src/lib.rs");
            assert_eq!(c.ordinal_within_file, i);
            assert_eq!(c.owner_repo_id, "repo");
            assert!(c.vector.is_none());
        }
    }

    #[test]
    fn short_file_yields_single_chunk() {
        let record = file_record("tiny file", FileKind::Code, "a.rs");
        let chunks = chunk("repo", &record, 500, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "tiny file");
    }

    #[test]
    fn markdown_file_uses_markdown_splitter() {
        let content = "# Title\n\nSome body text.\n\n## Section\n\nMore text.".repeat(10);
        let record = file_record(&content, FileKind::Doc, "docs/guide.md");
        let chunks = chunk("repo", &record, 30, 5);
        assert!(!chunks.is_empty());
    }
}
