//! Variable lowering: const-group auto-numbering (`iota`-style),
//! peer-group linking, and dependency collection for non-const
//! initialisers, per §4.4.

use crate::bridge::SemanticTables;
use crate::identity::Identity;
use crate::lowering::common::{classify_and_insert, file_line, scan_body_tokens};
use crate::lowering::content::slice_content;
use crate::model::{DependencySet, Variable};

#[derive(Debug, Clone)]
pub struct VarSite<'a> {
    pub name: &'a str,
    pub is_const: bool,
    pub declared_type: Option<&'a str>,
    /// Raw initialiser text, e.g. `"iota"`, `"1"`, `"a.b.C"`. `None`
    /// when the declaration in a const group omits an initialiser and
    /// inherits the previous one.
    pub initializer: Option<&'a str>,
    pub decl_start: usize,
    pub decl_end: usize,
}

pub struct VarLoweringOptions {
    pub collect_comments: bool,
    pub auto_numbering_keyword: &'static str,
}

impl Default for VarLoweringOptions {
    fn default() -> Self {
        VarLoweringOptions {
            collect_comments: false,
            auto_numbering_keyword: "iota",
        }
    }
}

/// Lowers one parenthesised group of variable/const declarations,
/// applying the auto-numbering and type-inheritance rules and linking
/// each member's `Groups` to its peers.
pub fn lower_var_group(
    sites: &[VarSite],
    relative_path: &str,
    source: &str,
    module: &str,
    pkg_path: &str,
    semantics: &SemanticTables,
    options: &VarLoweringOptions,
) -> Vec<Variable> {
    let mut out = Vec::new();
    let mut last_type: Option<String> = None;
    let mut last_numeric: Option<i64> = None;

    for (position, site) in sites.iter().enumerate() {
        if site.name == "_" {
            continue;
        }

        let declared_type = site.declared_type.map(str::to_string).or_else(|| {
            if site.is_const {
                last_type.clone()
            } else {
                None
            }
        });
        if let Some(ref ty) = declared_type {
            last_type = Some(ty.clone());
        }

        let (content_suffix, numeric_value) = resolve_initializer(site, position, last_numeric, options);
        if let Some(v) = numeric_value {
            last_numeric = Some(v);
        }

        let identity = Identity::new(module, pkg_path, site.name);
        let mut dependencies = DependencySet::new();
        if let Some(init) = site.initializer {
            if init != options.auto_numbering_keyword {
                let init_offset = site.decl_end.saturating_sub(init.len());
                for token in scan_body_tokens(init, init_offset) {
                    let mut function_calls = DependencySet::new();
                    let mut method_calls = DependencySet::new();
                    let mut types = DependencySet::new();
                    classify_and_insert(
                        &token,
                        relative_path,
                        source,
                        semantics,
                        module,
                        &mut function_calls,
                        &mut method_calls,
                        &mut types,
                        &mut dependencies,
                    );
                    for dep in types.into_vec() {
                        dependencies.insert_or_ignore(dep.identity, dep.site);
                    }
                    for dep in function_calls.into_vec() {
                        dependencies.insert_or_ignore(dep.identity, dep.site);
                    }
                }
            }
        }

        let base_content = slice_content(source, site.decl_start, site.decl_end, options.collect_comments);
        let content = match content_suffix {
            Some(suffix) => format!("{} = {}", base_content.trim_end(), suffix),
            None => base_content,
        };

        out.push(Variable {
            identity,
            file_line: file_line(relative_path, source, site.decl_start, site.decl_end),
            is_const: site.is_const,
            is_exported: site.name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false),
            is_pointer: false,
            declared_type: declared_type.map(|ty| Identity::new(module, pkg_path, ty)),
            content,
            dependencies,
            groups: Vec::new(),
        });
    }

    if out.len() >= 2 {
        let all_identities: Vec<Identity> = out.iter().map(|v| v.identity.clone()).collect();
        for (i, var) in out.iter_mut().enumerate() {
            var.groups = all_identities
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, id)| id.clone())
                .collect();
        }
    }

    out
}

/// Implements the auto-numbering rule: when the initialiser textually
/// contains the auto-numbering keyword, the keyword is bound to its
/// 0-based position and the expression is (best-effort) evaluated;
/// non-numeric auto-numbered constants keep the raw initialiser text
/// with no computed value, per the design note on inconsistent
/// evaluator coverage.
fn resolve_initializer(
    site: &VarSite,
    position: usize,
    last_numeric: Option<i64>,
    options: &VarLoweringOptions,
) -> (Option<String>, Option<i64>) {
    match site.initializer {
        Some(expr) if expr.trim() == options.auto_numbering_keyword => {
            (Some(position.to_string()), Some(position as i64))
        }
        Some(expr) if expr.trim().parse::<i64>().is_ok() => {
            let v: i64 = expr.trim().parse().unwrap();
            (Some(v.to_string()), Some(v))
        }
        Some(expr) if expr.contains(options.auto_numbering_keyword) => {
            // Non-numeric auto-numbered expression: text preserved,
            // value not computed.
            (Some(expr.to_string()), None)
        }
        Some(_) => (None, None),
        None if site.is_const => {
            // Omitted initialiser in a const group inherits the
            // previous numeric value incremented by one.
            match last_numeric {
                Some(prev) => (Some((prev + 1).to_string()), Some(prev + 1)),
                None => (None, None),
            }
        }
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iota_group_auto_numbers_sequentially() {
        let source = "const ( A = iota; B; C )\n";
        let sites = vec![
            VarSite {
                name: "A",
                is_const: true,
                declared_type: None,
                initializer: Some("iota"),
                decl_start: source.find("A").unwrap(),
                decl_end: source.find(';').unwrap(),
            },
            VarSite {
                name: "B",
                is_const: true,
                declared_type: None,
                initializer: None,
                decl_start: source.rfind("B").unwrap(),
                decl_end: source.rfind("B").unwrap() + 1,
            },
            VarSite {
                name: "C",
                is_const: true,
                declared_type: None,
                initializer: None,
                decl_start: source.rfind('C').unwrap(),
                decl_end: source.rfind('C').unwrap() + 1,
            },
        ];
        let semantics = SemanticTables::default();
        let vars = lower_var_group(&sites, "p/file.go", source, "m", "p", &semantics, &VarLoweringOptions::default());
        assert_eq!(vars.len(), 3);
        assert!(vars[0].content.ends_with("= 0"));
        assert!(vars[1].content.ends_with("= 1"));
        assert!(vars[2].content.ends_with("= 2"));
        assert_eq!(vars[0].groups.len(), 2);
    }

    #[test]
    fn underscore_names_are_skipped() {
        let source = "var ( _ = foo(); X = 1 )\n";
        let sites = vec![
            VarSite {
                name: "_",
                is_const: false,
                declared_type: None,
                initializer: Some("foo()"),
                decl_start: 0,
                decl_end: 10,
            },
            VarSite {
                name: "X",
                is_const: false,
                declared_type: None,
                initializer: Some("1"),
                decl_start: 11,
                decl_end: 18,
            },
        ];
        let semantics = SemanticTables::default();
        let vars = lower_var_group(&sites, "p/file.go", source, "m", "p", &semantics, &VarLoweringOptions::default());
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].identity.name, "X");
    }
}
