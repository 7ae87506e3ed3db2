//! Heading-based sectioning for markdown files.
//!
//! Markdown has no tree-sitter grammar here; a section runs from its
//! heading line to the line before the next heading (or end of file), so
//! section ranges are disjoint by construction. The minimum-span rule for
//! code definitions does not apply to markdown.

use crate::captures::Definition;

/// Split markdown lines into heading-delimited definition records.
/// Rows are 0-based inclusive, matching the tag-capture processor output.
pub fn heading_definitions(lines: &[&str]) -> Vec<Definition> {
    let heading_rows: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| is_atx_heading(line))
        .map(|(row, _)| row)
        .collect();

    let mut definitions = Vec::with_capacity(heading_rows.len());
    for (idx, &row) in heading_rows.iter().enumerate() {
        let end = heading_rows
            .get(idx + 1)
            .map_or(lines.len().saturating_sub(1), |next| next - 1);
        definitions.push(Definition {
            start_line: row,
            end_line: end,
            header_line: lines[row].to_string(),
            name: Some(heading_text(lines[row])),
        });
    }
    definitions
}

fn is_atx_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes)
        && trimmed
            .chars()
            .nth(hashes)
            .is_none_or(|c| c == ' ' || c == '\t')
}

fn heading_text(line: &str) -> String {
    line.trim_start()
        .trim_start_matches('#')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sections_run_to_the_next_heading() {
        let lines = vec![
            "# Title",
            "intro",
            "",
            "## Usage",
            "one",
            "two",
            "## License",
            "MIT",
        ];
        let defs = heading_definitions(&lines);
        let ranges: Vec<(usize, usize)> = defs
            .iter()
            .map(|d| (d.start_line, d.end_line))
            .collect();
        assert_eq!(ranges, vec![(0, 2), (3, 5), (6, 7)]);
        assert_eq!(defs[1].name.as_deref(), Some("Usage"));
        assert_eq!(defs[1].header_line, "## Usage");
    }

    #[test]
    fn hash_without_space_is_not_a_heading() {
        let lines = vec!["#!/bin/sh", "echo hi"];
        assert!(heading_definitions(&lines).is_empty());
    }

    #[test]
    fn no_headings_no_sections() {
        let lines = vec!["plain", "text"];
        assert!(heading_definitions(&lines).is_empty());
    }
}
