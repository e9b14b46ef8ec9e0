//! Cross-module symbol resolver (§4.5): follows alias/default-export
//! chains to the declaring node, classifies it internal vs. external,
//! and mints a canonical `(ModPath, PkgPath, Name)` triple.

use std::collections::{HashMap, HashSet};

use crate::identity::Identity;

const MAX_ALIAS_HOPS: usize = 50;

/// One semantic symbol as exposed by a bridge: either a terminal
/// declaration or a re-export/alias pointing at another symbol.
#[derive(Debug, Clone)]
pub enum SymbolRef {
    Alias { points_to: String },
    DefaultExportAlias { file: String },
    Declaration {
        file: String,
        name: String,
        start_offset: usize,
        is_definition_node: bool,
        in_declaration_only_file: bool,
        is_external_dependency: bool,
        dependency_package_name: Option<String>,
        module_package_name: Option<String>,
        relative_pkg_path: Option<String>,
    },
}

pub trait SymbolTable {
    fn lookup(&self, symbol_key: &str) -> Option<SymbolRef>;
    /// For a default-export alias: the underlying file's default-export
    /// symbol key, if any.
    fn default_export_of(&self, file: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub identity: Identity,
}

/// Memoisation key: `(file, name, first-decl-start)`.
type MemoKey = (String, String, usize);

pub struct SymbolResolver<'a, T: SymbolTable> {
    table: &'a T,
    memo: HashMap<MemoKey, Option<ResolvedIdentity>>,
}

impl<'a, T: SymbolTable> SymbolResolver<'a, T> {
    pub fn new(table: &'a T) -> Self {
        SymbolResolver { table, memo: HashMap::new() }
    }

    pub fn resolve(&mut self, symbol_key: &str) -> Option<ResolvedIdentity> {
        let terminal = self.follow_aliases(symbol_key)?;
        let SymbolRef::Declaration {
            file,
            name,
            start_offset,
            is_external_dependency,
            dependency_package_name,
            module_package_name,
            relative_pkg_path,
            ..
        } = terminal
        else {
            return None;
        };

        let memo_key = (file.clone(), name.clone(), start_offset);
        if let Some(cached) = self.memo.get(&memo_key) {
            return cached.clone();
        }

        let mod_path = if is_external_dependency {
            rewrite_dependency_module_name(dependency_package_name.as_deref().unwrap_or(&file))
        } else {
            module_package_name.unwrap_or_default()
        };
        let pkg_path = relative_pkg_path.unwrap_or_else(|| ".".to_string());

        let resolved = ResolvedIdentity {
            identity: Identity::new(mod_path, pkg_path, name),
        };
        self.memo.insert(memo_key, Some(resolved.clone()));
        Some(resolved)
    }

    /// Follows alias/re-export/default-export chains at most
    /// [`MAX_ALIAS_HOPS`] steps; a repeating node breaks the loop
    /// (`ResolverCircular`).
    fn follow_aliases(&self, start_key: &str) -> Option<SymbolRef> {
        let mut visited = HashSet::new();
        let mut current = start_key.to_string();
        for _ in 0..MAX_ALIAS_HOPS {
            if !visited.insert(current.clone()) {
                tracing::warn!(symbol = %start_key, "alias chain repeats a node, breaking");
                return None;
            }
            match self.table.lookup(&current)? {
                SymbolRef::Alias { points_to } => current = points_to,
                SymbolRef::DefaultExportAlias { file } => {
                    current = self.table.default_export_of(&file)?;
                }
                decl @ SymbolRef::Declaration { .. } => return Some(decl),
            }
        }
        tracing::warn!(symbol = %start_key, "alias chain exceeded hop bound");
        None
    }
}

impl Clone for ResolvedIdentity {
    fn clone(&self) -> Self {
        ResolvedIdentity { identity: self.identity.clone() }
    }
}

/// `@types/*` packages are rewritten to the runtime package they type;
/// bare `lib.*` platform-checker files collapse to a generic pseudo-
/// module, per §4.5 step 4.
fn rewrite_dependency_module_name(raw: &str) -> String {
    if let Some(rest) = raw.strip_prefix("@types/") {
        return rest.to_string();
    }
    if raw.starts_with("lib.") || raw == "lib" {
        return "es".to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeTable {
        entries: HashMap<String, SymbolRef>,
        default_exports: HashMap<String, String>,
    }

    impl SymbolTable for FakeTable {
        fn lookup(&self, key: &str) -> Option<SymbolRef> {
            self.entries.get(key).cloned()
        }
        fn default_export_of(&self, file: &str) -> Option<String> {
            self.default_exports.get(file).cloned()
        }
    }

    #[test]
    fn resolves_through_alias_chain() {
        let mut entries = HashMap::new();
        entries.insert(
            "a".to_string(),
            SymbolRef::Alias { points_to: "b".to_string() },
        );
        entries.insert(
            "b".to_string(),
            SymbolRef::Declaration {
                file: "src/widget.ts".to_string(),
                name: "Widget".to_string(),
                start_offset: 10,
                is_definition_node: true,
                in_declaration_only_file: false,
                is_external_dependency: false,
                dependency_package_name: None,
                module_package_name: Some("app".to_string()),
                relative_pkg_path: Some("src".to_string()),
            },
        );
        let table = FakeTable { entries, default_exports: HashMap::new() };
        let mut resolver = SymbolResolver::new(&table);
        let resolved = resolver.resolve("a").unwrap();
        assert_eq!(resolved.identity.name, "Widget");
        assert_eq!(resolved.identity.mod_path, "app");
    }

    #[test]
    fn breaks_on_repeating_alias_node() {
        let mut entries = HashMap::new();
        entries.insert("a".to_string(), SymbolRef::Alias { points_to: "b".to_string() });
        entries.insert("b".to_string(), SymbolRef::Alias { points_to: "a".to_string() });
        let table = FakeTable { entries, default_exports: HashMap::new() };
        let mut resolver = SymbolResolver::new(&table);
        assert!(resolver.resolve("a").is_none());
    }

    #[test]
    fn rewrites_types_scoped_package() {
        assert_eq!(rewrite_dependency_module_name("@types/node"), "node");
        assert_eq!(rewrite_dependency_module_name("lib.dom.d.ts"), "es");
    }
}
