use crate::language::Language;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// One capture lifted out of a tag-query match, before processing.
///
/// Rows are 0-based. `parent` is the capture node's parent range and
/// `grandparent` one level further out; both are used only for `name.*`
/// captures (the identifier's parent is the definition node, and the
/// grandparent is the enclosing scope that may be promoted to its own
/// definition record).
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub capture_name: String,
    pub node: LineRange,
    pub parent: Option<LineRange>,
    pub grandparent: Option<LineRange>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn span(self) -> usize {
        self.end - self.start + 1
    }
}

/// A processed definition record. Rows are 0-based inclusive;
/// `header_line` is the verbatim source line at `start_line`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub start_line: usize,
    pub end_line: usize,
    pub header_line: String,
    pub name: Option<String>,
}

fn html_element_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^A-Z]*</?(div|span|button|input|h[1-6]|p|a|img|ul|li|form)\b")
            .expect("html element regex")
    })
}

/// Turn the ordered tag-query captures for one file into definition records.
///
/// Processing rules, in order:
/// - only `definition.*` / `name.*` captures participate;
/// - a `name.*` capture resolves to its parent node, `definition.*` to itself;
/// - ranges narrower than `min_component_lines` are discarded;
/// - ranges deduplicate on `(start, end)`, first capture wins;
/// - for JSX/TSX, ranges whose first line is a plain HTML element are dropped
///   (component definitions start with an uppercase name and survive);
/// - a surviving `name.*` capture also promotes its enclosing scope to a
///   record when that scope is new and wide enough;
/// - output is sorted by start ascending, end descending, so outer
///   definitions precede the ones nested in them.
pub fn process_captures(
    captures: &[RawCapture],
    lines: &[&str],
    language: Language,
    min_component_lines: usize,
) -> Vec<Definition> {
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    let mut definitions: Vec<Definition> = Vec::new();
    let filter_html = language.filters_html_elements();

    let header_at = |row: usize| lines.get(row).map_or(String::new(), |l| (*l).to_string());

    for capture in captures {
        let is_name = capture.capture_name.contains("name");
        let is_definition = capture.capture_name.contains("definition");
        if !is_name && !is_definition {
            continue;
        }

        let range = if is_name {
            capture.parent.unwrap_or(capture.node)
        } else {
            capture.node
        };

        if range.span() < min_component_lines {
            continue;
        }

        if filter_html && html_element_regex().is_match(&header_at(range.start)) {
            continue;
        }

        if seen.insert((range.start, range.end)) {
            definitions.push(Definition {
                start_line: range.start,
                end_line: range.end,
                header_line: header_at(range.start),
                name: capture.name.clone(),
            });
        }

        // A name capture also labels its enclosing scope when that scope
        // has not produced its own definition capture.
        if is_name {
            if let Some(enclosing) = capture.grandparent {
                if enclosing.span() >= min_component_lines
                    && seen.insert((enclosing.start, enclosing.end))
                {
                    definitions.push(Definition {
                        start_line: enclosing.start,
                        end_line: enclosing.end,
                        header_line: header_at(enclosing.start),
                        name: None,
                    });
                }
            }
        }
    }

    definitions.sort_by(|a, b| {
        a.start_line
            .cmp(&b.start_line)
            .then(b.end_line.cmp(&a.end_line))
    });
    definitions
}
