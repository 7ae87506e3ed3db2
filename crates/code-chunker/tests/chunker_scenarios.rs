use pretty_assertions::assert_eq;
use semindex_code_chunker::{ChunkerConfig, CodeChunk, CodeChunker};

fn ranges(chunks: &[CodeChunk]) -> Vec<(usize, usize)> {
    chunks.iter().map(|c| (c.start_line, c.end_line)).collect()
}

const SMALL_TS: &str = "\
// helpers for the demo app
import { log } from \"./log\";
export function greet(name: string): string {
    const prefix = \"hello\";
    const suffix = \"!\";
    const joined = prefix + \", \" + name;
    log(joined);
    const shouted = joined.toUpperCase();
    log(shouted);
    return joined + suffix;
}

export class Greeter {
    private count = 0;
    greet(name: string): string {
        this.count += 1;
        return greet(name);
    }
}
";

#[test]
fn small_ts_file_yields_function_and_class_ranges() {
    let chunker = CodeChunker::default();
    let chunks = chunker.chunk_str(SMALL_TS, "src/greet.ts").unwrap();

    assert_eq!(ranges(&chunks), vec![(2, 10), (12, 18)]);

    let lines: Vec<&str> = SMALL_TS.lines().collect();
    assert_eq!(chunks[0].text.lines().next(), Some(lines[2]));
    assert_eq!(chunks[1].text.lines().next(), Some(lines[12]));
}

#[test]
fn chunk_ranges_are_disjoint_and_ordered() {
    let chunker = CodeChunker::default();
    let chunks = chunker.chunk_str(SMALL_TS, "src/greet.ts").unwrap();

    for pair in chunks.windows(2) {
        assert!(pair[0].end_line < pair[1].start_line);
    }
    for chunk in &chunks {
        assert!(chunk.end_line >= chunk.start_line);
        assert!(chunk.end_line - chunk.start_line + 1 >= 4);
    }
}

#[test]
fn three_line_function_is_omitted_four_line_function_is_kept() {
    let code = "\
function tiny() {
    return 1;
}

function kept(a: number) {
    const b = a + 1;
    return b;
}
";
    let chunker = CodeChunker::default();
    let chunks = chunker.chunk_str(code, "src/min.ts").unwrap();

    assert_eq!(ranges(&chunks), vec![(4, 7)]);
}

#[test]
fn tsx_html_wrapper_is_dropped_component_is_kept() {
    let code = "\
export function Page() {
    return (
        <div className=\"x\">
            <span>one</span>
            <span>two</span>
            <span>three</span>
        </div>
    );
}

const Button = () => (
    <Fancy>
        <Inner />
        <Inner />
    </Fancy>
);
";
    let chunker = CodeChunker::default();
    let chunks = chunker.chunk_str(code, "src/page.tsx").unwrap();

    assert!(chunks
        .iter()
        .all(|c| !c.text.trim_start().starts_with("<div")));
    assert!(chunks
        .iter()
        .any(|c| c.text.starts_with("const Button")));
}

#[test]
fn markdown_sections_ignore_the_min_line_floor() {
    let doc = "\
# Title
intro text

## Small
one line only

## Bigger
a
b
c
d
";
    let chunker = CodeChunker::default();
    let chunks = chunker.chunk_str(doc, "README.md").unwrap();

    assert_eq!(ranges(&chunks), vec![(0, 2), (3, 5), (6, 10)]);
    assert!(chunks[1].end_line - chunks[1].start_line + 1 < 4);
}

#[test]
fn identical_content_produces_identical_chunk_ids() {
    let chunker = CodeChunker::new(ChunkerConfig::default());
    let first = chunker.chunk_str(SMALL_TS, "src/greet.ts").unwrap();
    let second = chunker.chunk_str(SMALL_TS, "src/greet.ts").unwrap();

    let first_ids: Vec<&str> = first.iter().map(|c| c.chunk_id.as_str()).collect();
    let second_ids: Vec<&str> = second.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(first_ids, second_ids);
}

#[test]
fn changed_content_changes_chunk_ids() {
    let chunker = CodeChunker::default();
    let original = chunker.chunk_str(SMALL_TS, "src/greet.ts").unwrap();
    let edited = SMALL_TS.replace("hello", "howdy");
    let changed = chunker.chunk_str(&edited, "src/greet.ts").unwrap();

    assert_eq!(original.len(), changed.len());
    for (a, b) in original.iter().zip(changed.iter()) {
        assert_ne!(a.chunk_id, b.chunk_id);
    }
}
