use crate::chunker::CodeChunker;
use crate::error::Result;
use std::path::Path;

/// Render the definitions of one file in the on-demand outline format:
/// a `# basename` header followed by one `start--end | header` line per
/// definition, with 1-based line numbers.
pub fn file_outline(chunker: &CodeChunker, rel_path: &str, content: &str) -> Result<String> {
    let basename = Path::new(rel_path)
        .file_name()
        .map_or(rel_path, |n| n.to_str().unwrap_or(rel_path));

    let mut out = format!("# {basename}\n");
    for def in chunker.definitions(content, rel_path)? {
        out.push_str(&format!(
            "{}--{} | {}\n",
            def.start_line + 1,
            def.end_line + 1,
            def.header_line
        ));
    }
    Ok(out)
}
