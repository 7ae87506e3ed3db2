use crate::captures::{process_captures, Definition, LineRange, RawCapture};
use crate::error::{ChunkerError, Result};
use crate::language::Language;
use crate::markdown;
use crate::registry::{parser_for_language, ParserEntry};
use sha2::{Digest, Sha256};
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Parser, QueryCursor};

/// Chunking thresholds. Carried per-chunker so tests can tighten them
/// without touching process-wide state.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Definitions narrower than this many lines are not indexed
    /// (markdown sections are exempt).
    pub min_component_lines: usize,
    /// Hard cap on chunk text size; larger definitions split at line
    /// boundaries.
    pub max_chunk_bytes: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_component_lines: 4,
            max_chunk_bytes: 16 * 1024,
        }
    }
}

/// A contiguous range of source lines treated as one indexing unit.
/// Line numbers are 0-based inclusive internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChunk {
    pub rel_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    /// Hash of the whole file the chunk came from, hex.
    pub content_hash: String,
    /// Deterministic id derived from `(rel_path, start, end, content_hash)`.
    pub chunk_id: String,
    pub language: Language,
}

pub struct CodeChunker {
    config: ChunkerConfig,
}

impl CodeChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk raw file bytes. Malformed UTF-8 is decoded with replacement;
    /// the content hash is computed over the original bytes.
    pub fn chunk_bytes(&self, bytes: &[u8], rel_path: &str) -> Result<Vec<CodeChunk>> {
        let content = String::from_utf8_lossy(bytes);
        let content_hash = content_hash_hex(bytes);
        self.chunk_with_hash(&content, rel_path, &content_hash)
    }

    /// Chunk an in-memory string (hash computed over its UTF-8 bytes).
    pub fn chunk_str(&self, content: &str, rel_path: &str) -> Result<Vec<CodeChunk>> {
        let content_hash = content_hash_hex(content.as_bytes());
        self.chunk_with_hash(content, rel_path, &content_hash)
    }

    /// Definition records for one file, before materialization into chunks.
    /// Used by the outline query as well as the chunking path.
    pub fn definitions(&self, content: &str, rel_path: &str) -> Result<Vec<Definition>> {
        let language = Language::from_path(rel_path);
        let lines: Vec<&str> = content.lines().collect();

        if language.is_markdown() {
            return Ok(markdown::heading_definitions(&lines));
        }

        let Some(entry) = parser_for_language(language)? else {
            return Ok(Vec::new());
        };

        let captures = collect_captures(&entry, content, rel_path)?;
        Ok(process_captures(
            &captures,
            &lines,
            language,
            self.config.min_component_lines,
        ))
    }

    fn chunk_with_hash(
        &self,
        content: &str,
        rel_path: &str,
        content_hash: &str,
    ) -> Result<Vec<CodeChunk>> {
        let language = Language::from_path(rel_path);
        let definitions = self.definitions(content, rel_path)?;
        if definitions.is_empty() {
            return Ok(Vec::new());
        }

        let lines: Vec<&str> = content.lines().collect();

        // Definitions arrive sorted outer-first; keep the outermost of any
        // overlapping pair so a file's chunk ranges stay disjoint.
        let mut chunks = Vec::new();
        let mut next_free_row = 0usize;
        for def in &definitions {
            if def.start_line < next_free_row {
                continue;
            }
            next_free_row = def.end_line + 1;
            self.materialize(
                &lines,
                def,
                rel_path,
                content_hash,
                language,
                &mut chunks,
            );
        }

        Ok(chunks)
    }

    /// Emit one chunk for a definition, splitting at line boundaries when
    /// the text exceeds the byte cap.
    fn materialize(
        &self,
        lines: &[&str],
        def: &Definition,
        rel_path: &str,
        content_hash: &str,
        language: Language,
        out: &mut Vec<CodeChunk>,
    ) {
        let end = def.end_line.min(lines.len().saturating_sub(1));
        let mut piece_start = def.start_line;

        while piece_start <= end {
            let mut piece_end = piece_start;
            let mut bytes = lines[piece_start].len();
            while piece_end < end {
                let next = lines[piece_end + 1].len() + 1;
                if bytes + next > self.config.max_chunk_bytes {
                    break;
                }
                bytes += next;
                piece_end += 1;
            }

            let text = lines[piece_start..=piece_end].join("\n");
            out.push(CodeChunk {
                rel_path: rel_path.to_string(),
                start_line: piece_start,
                end_line: piece_end,
                chunk_id: chunk_id(rel_path, piece_start, piece_end, content_hash),
                content_hash: content_hash.to_string(),
                text,
                language,
            });

            piece_start = piece_end + 1;
        }
    }
}

impl Default for CodeChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

fn line_range(node: Node<'_>) -> LineRange {
    LineRange::new(node.start_position().row, node.end_position().row)
}

fn collect_captures(
    entry: &ParserEntry,
    content: &str,
    rel_path: &str,
) -> Result<Vec<RawCapture>> {
    let mut parser = Parser::new();
    parser
        .set_language(&entry.grammar)
        .map_err(|e| ChunkerError::parse(rel_path, e.to_string()))?;

    let tree = parser
        .parse(content, None)
        .ok_or_else(|| ChunkerError::parse(rel_path, "tree-sitter returned no tree"))?;

    let source = content.as_bytes();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(entry.query, tree.root_node(), source);

    let mut captures = Vec::new();
    while let Some(m) = matches.next() {
        for capture in m.captures {
            let capture_name = entry.query.capture_names()[capture.index as usize];
            let node = capture.node;
            let is_name = capture_name.contains("name");

            let name = if is_name {
                node.utf8_text(source).ok().map(str::to_string)
            } else {
                None
            };

            captures.push(RawCapture {
                capture_name: capture_name.to_string(),
                node: line_range(node),
                parent: node.parent().map(line_range),
                grandparent: node.parent().and_then(|p| p.parent()).map(line_range),
                name,
            });
        }
    }

    Ok(captures)
}

/// File content hash: sha-256 truncated to 128 bits, lowercase hex.
pub fn content_hash_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex_encode(&digest[..16])
}

/// Deterministic chunk id, formatted as a UUID so remote stores that
/// require UUID point ids accept it as-is.
pub fn chunk_id(rel_path: &str, start_line: usize, end_line: usize, content_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rel_path.as_bytes());
    hasher.update([0]);
    hasher.update(start_line.to_le_bytes());
    hasher.update(end_line.to_le_bytes());
    hasher.update(content_hash.as_bytes());
    let digest = hasher.finalize();
    let h = hex_encode(&digest[..16]);
    format!(
        "{}-{}-{}-{}-{}",
        &h[0..8],
        &h[8..12],
        &h[12..16],
        &h[16..20],
        &h[20..32]
    )
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chunk_id_is_stable() {
        let a = chunk_id("src/lib.rs", 3, 12, "aabbccdd");
        let b = chunk_id("src/lib.rs", 3, 12, "aabbccdd");
        assert_eq!(a, b);
        assert_ne!(a, chunk_id("src/lib.rs", 3, 13, "aabbccdd"));
        assert_ne!(a, chunk_id("src/lib.rs", 3, 12, "aabbccde"));
        assert_ne!(a, chunk_id("src/other.rs", 3, 12, "aabbccdd"));
    }

    #[test]
    fn chunk_id_looks_like_a_uuid() {
        let id = chunk_id("a.rs", 0, 5, "00ff");
        let groups: Vec<&str> = id.split('-').collect();
        assert_eq!(
            groups.iter().map(|g| g.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
    }

    #[test]
    fn content_hash_is_128_bit_hex() {
        let h = content_hash_hex(b"fn main() {}");
        assert_eq!(h.len(), 32);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn oversized_definitions_split_at_line_boundaries() {
        let chunker = CodeChunker::new(ChunkerConfig {
            min_component_lines: 4,
            max_chunk_bytes: 64,
        });
        let body: Vec<String> = (0..10)
            .map(|i| format!("    let padding_{i} = \"0123456789\";"))
            .collect();
        let code = format!("fn big() {{\n{}\n}}", body.join("\n"));
        let chunks = chunker.chunk_str(&code, "big.rs").unwrap();

        assert!(chunks.len() > 1, "expected a split, got {chunks:?}");
        for chunk in &chunks {
            assert!(chunk.text.len() <= 64);
        }
        // Pieces tile the definition without gaps.
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_line, pair[0].end_line + 1);
        }
        assert_eq!(chunks[0].start_line, 0);
        assert_eq!(chunks.last().unwrap().end_line, 11);
    }

    #[test]
    fn unknown_extension_yields_no_chunks() {
        let chunker = CodeChunker::default();
        let chunks = chunker.chunk_str("whatever content\nmore\n", "file.xyz").unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn lossy_decode_does_not_abort() {
        let chunker = CodeChunker::default();
        let mut bytes = b"fn ok() {\n    let a = 1;\n    let b = 2;\n    let c = a + b;\n}\n".to_vec();
        bytes.push(0xff);
        let chunks = chunker.chunk_bytes(&bytes, "weird.rs").unwrap();
        assert_eq!(chunks.len(), 1);
    }
}
