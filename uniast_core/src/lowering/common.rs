//! Shared helpers used by every front-end's lowerer: identifier
//! classification against the bridge's semantic tables, dependency-list
//! insertion, and line/offset bookkeeping.

use crate::bridge::{SelectionKind, SemanticTables, SymbolKind};
use crate::identity::Identity;
use crate::model::{DependencySet, FileLine};

/// Converts a byte offset into a 1-based line number by counting `\n`
/// bytes up to that offset in the file's source buffer.
pub fn line_at_offset(source: &str, offset: usize) -> usize {
    source.as_bytes()[..offset.min(source.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

pub fn file_line(relative_path: &str, source: &str, start: usize, end: usize) -> FileLine {
    FileLine::new(relative_path, line_at_offset(source, start), start, end)
}

/// One token found while scanning a declaration body: either a bare
/// identifier or a `recv.selector` pair, with its byte span.
#[derive(Debug, Clone)]
pub enum BodyToken {
    Ident { name: String, start: usize, end: usize },
    Selector { recv: String, sel: String, start: usize, end: usize },
}

/// Scans a body slice for bare identifiers and `a.b`-shaped selector
/// expressions using a conservative token regex. This stands in for a
/// full AST walk: the bridge's semantic tables are still the source of
/// truth for *what* an identifier refers to, this just enumerates
/// *where* identifiers occur in source order.
pub fn scan_body_tokens(body: &str, body_offset: usize) -> Vec<BodyToken> {
    static TOKEN_RE: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
        regex::Regex::new(r"[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)?").unwrap()
    });
    let mut tokens = Vec::new();
    for m in TOKEN_RE.find_iter(body) {
        let text = m.as_str();
        let start = body_offset + m.start();
        let end = body_offset + m.end();
        if let Some(dot) = text.find('.') {
            tokens.push(BodyToken::Selector {
                recv: text[..dot].to_string(),
                sel: text[dot + 1..].to_string(),
                start,
                end,
            });
        } else {
            tokens.push(BodyToken::Ident {
                name: text.to_string(),
                start,
                end,
            });
        }
    }
    tokens
}

/// Classifies one body token against the bridge's semantic tables and,
/// on a match, inserts a `Dependency` into the correct list. Implements
/// the `SelectorExpr`/`Ident` classification policy from §4.4: a
/// cross-package alias selector becomes a typed dependency via `Uses`;
/// a bound method selection (per `Selections`) becomes a `MethodCalls`
/// entry; a package-scope variable receiver becomes `GlobalVars`; a
/// bare identifier is classified by `Uses` into `Types`/`GlobalVars`/
/// `FunctionCalls`, methods are ignored at the bare-identifier site
/// since `SelectorExpr` already handles them.
pub fn classify_and_insert(
    token: &BodyToken,
    relative_path: &str,
    source: &str,
    semantics: &SemanticTables,
    module: &str,
    function_calls: &mut DependencySet,
    method_calls: &mut DependencySet,
    types: &mut DependencySet,
    global_vars: &mut DependencySet,
) {
    match token {
        BodyToken::Selector { recv, sel, start, end } => {
            let selection_key = format!("{relative_path}:{start}:sel");
            if let Some(selection) = semantics.selections.get(&selection_key) {
                if matches!(selection.kind, SelectionKind::MethodVal | SelectionKind::MethodExpr) {
                    let method_identity = Identity::new(
                        module,
                        selection.receiver_type.pkg_path.clone(),
                        format!("{}.{}", selection.receiver_type.name, sel),
                    );
                    method_calls.insert_or_ignore(method_identity, file_line(relative_path, source, *start, *end));
                    return;
                }
            }
            let use_key = format!("{relative_path}:{recv}");
            if let Some(resolved) = semantics.uses.get(&use_key) {
                let site = file_line(relative_path, source, *start, *end);
                match resolved.kind {
                    SymbolKind::Package => {
                        // Cross-package reference: the selector's own
                        // `Uses` entry (keyed by the full selector) tells
                        // us what kind of declaration `sel` is.
                        let sel_key = format!("{relative_path}:{recv}.{sel}");
                        if let Some(target) = semantics.uses.get(&sel_key) {
                            insert_by_kind(target, site, function_calls, types, global_vars);
                        }
                    }
                    SymbolKind::Variable => {
                        global_vars.insert_or_ignore(resolved.identity.clone(), site);
                    }
                    _ => {}
                }
            }
        }
        BodyToken::Ident { name, start, end } => {
            let use_key = format!("{relative_path}:{name}");
            if let Some(resolved) = semantics.uses.get(&use_key) {
                let site = file_line(relative_path, source, *start, *end);
                if resolved.kind != SymbolKind::Builtin {
                    insert_by_kind(resolved, site, function_calls, types, global_vars);
                }
            }
        }
    }
}

fn insert_by_kind(
    resolved: &crate::bridge::ResolvedSymbol,
    site: FileLine,
    function_calls: &mut DependencySet,
    types: &mut DependencySet,
    global_vars: &mut DependencySet,
) {
    match resolved.kind {
        SymbolKind::Type => types.insert_or_ignore(resolved.identity.clone(), site),
        SymbolKind::Constant | SymbolKind::Variable => global_vars.insert_or_ignore(resolved.identity.clone(), site),
        SymbolKind::Function => function_calls.insert_or_ignore(resolved.identity.clone(), site),
        SymbolKind::Method | SymbolKind::Package | SymbolKind::Builtin => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_at_offset_counts_newlines() {
        let src = "a\nb\nc";
        assert_eq!(line_at_offset(src, 0), 1);
        assert_eq!(line_at_offset(src, 2), 2);
        assert_eq!(line_at_offset(src, 4), 3);
    }

    #[test]
    fn scan_body_tokens_splits_selectors_from_idents() {
        let tokens = scan_body_tokens("x.Hello(); Use(y)", 0);
        assert!(tokens.iter().any(|t| matches!(t, BodyToken::Selector { recv, sel, .. } if recv == "x" && sel == "Hello")));
        assert!(tokens.iter().any(|t| matches!(t, BodyToken::Ident { name, .. } if name == "Use")));
    }
}
