//! Content slicing: copies raw source bytes verbatim for a
//! declaration's `Content` field, optionally extending left to an
//! attached doc-comment group, and compensating for AST nodes that omit
//! a leading keyword token (e.g. a type-specification node that starts
//! after the elided `type ` keyword).

/// Extends `start` leftward over a contiguous run of `//`-line comments
/// (and the blank lines directly between them and `start`) so the
/// returned slice includes the declaration's doc comment.
pub fn extend_to_doc_comment(source: &str, start: usize) -> usize {
    let before = &source[..start.min(source.len())];
    let mut lines: Vec<(usize, &str)> = Vec::new();
    let mut offset = 0;
    for line in before.split_inclusive('\n') {
        lines.push((offset, line));
        offset += line.len();
    }

    let mut cursor = lines.len();
    let mut doc_start = start;
    while cursor > 0 {
        let (line_offset, line_text) = lines[cursor - 1];
        let trimmed = line_text.trim();
        if trimmed.starts_with("//") || trimmed.is_empty() {
            if trimmed.starts_with("//") {
                doc_start = line_offset;
            }
            cursor -= 1;
            if trimmed.is_empty() && (cursor == 0 || !lines[cursor - 1].1.trim().starts_with("//")) {
                break;
            }
        } else {
            break;
        }
    }
    doc_start
}

/// Copies `source[start..end]` verbatim. When `with_doc_comment` is
/// set, `start` is first extended leftward via
/// [`extend_to_doc_comment`].
pub fn slice_content(source: &str, start: usize, end: usize, with_doc_comment: bool) -> String {
    let effective_start = if with_doc_comment {
        extend_to_doc_comment(source, start)
    } else {
        start
    };
    source[effective_start.min(source.len())..end.min(source.len())].to_string()
}

/// A type-specification AST node typically omits the `type` keyword
/// token itself; prepend it so the emitted `Content` reads as valid
/// source rather than a bare identifier-and-body fragment.
pub fn with_type_keyword_prefix(slice: &str) -> String {
    if slice.trim_start().starts_with("type ") {
        slice.to_string()
    } else {
        format!("type {slice}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extends_over_single_line_doc_comment() {
        let source = "// Greet says hello.\nfunc Greet() {}\n";
        let func_start = source.find("func").unwrap();
        let extended = extend_to_doc_comment(source, func_start);
        assert_eq!(extended, 0);
    }

    #[test]
    fn does_not_extend_past_unrelated_code() {
        let source = "x := 1\nfunc Greet() {}\n";
        let func_start = source.find("func").unwrap();
        let extended = extend_to_doc_comment(source, func_start);
        assert_eq!(extended, func_start);
    }

    #[test]
    fn type_prefix_is_added_once() {
        assert_eq!(with_type_keyword_prefix("S struct{}"), "type S struct{}");
        assert_eq!(with_type_keyword_prefix("type S struct{}"), "type S struct{}");
    }
}
