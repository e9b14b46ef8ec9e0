//! The UniAST data model: declarations, containers, and the compact
//! graph representation emitted at `Repository::Graph`.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// A relative path plus 1-based line and byte-offset span into the file
/// as it stood at lowering time. Offsets are only valid against that
/// snapshot (invariant 6): a consumer re-reading a changed file must
/// fall back to `line`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLine {
    pub path: String,
    pub line: usize,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl FileLine {
    pub fn new(path: impl Into<String>, line: usize, start_offset: usize, end_offset: usize) -> Self {
        FileLine {
            path: path.into(),
            line,
            start_offset,
            end_offset,
        }
    }
}

/// One dependency-list entry: the identity referenced plus the
/// file/offset of the reference site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(flatten)]
    pub identity: Identity,
    pub site: FileLine,
}

/// An insertion-ordered, duplicate-free-by-identity list. Duplicate
/// checking rides a side `HashSet` so repeated `insert_or_ignore` calls
/// during a body walk stay O(1) instead of re-scanning the `Vec`.
#[derive(Debug, Clone, Default)]
pub struct DependencySet {
    items: Vec<Dependency>,
    seen: HashSet<Identity>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_or_ignore(&mut self, identity: Identity, site: FileLine) {
        if self.seen.insert(identity.clone()) {
            self.items.push(Dependency { identity, site });
        }
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.seen.contains(identity)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Dependency> {
        self.items
    }

    pub fn as_slice(&self) -> &[Dependency] {
        &self.items
    }
}

impl Serialize for DependencySet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.items.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DependencySet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let items = Vec::<Dependency>::deserialize(deserializer)?;
        let mut set = DependencySet::new();
        for dep in items {
            set.insert_or_ignore(dep.identity, dep.site);
        }
        Ok(set)
    }
}

/// A parameter or result entry: the dependency identity plus the
/// call-site position it occupies in the declared list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    #[serde(flatten)]
    pub identity: Identity,
    pub position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receiver {
    #[serde(rename = "Type")]
    pub type_identity: Identity,
    pub is_pointer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    #[serde(flatten)]
    pub identity: Identity,
    pub file_line: FileLine,
    pub exported: bool,
    pub is_method: bool,
    pub is_interface_method: bool,
    pub receiver: Option<Receiver>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub function_calls: DependencySet,
    pub method_calls: DependencySet,
    pub types: DependencySet,
    pub global_vars: DependencySet,
    pub signature: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Struct,
    Interface,
    Typedef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    #[serde(flatten)]
    pub identity: Identity,
    pub file_line: FileLine,
    pub exported: bool,
    pub type_kind: TypeKind,
    pub content: String,
    #[serde(default)]
    pub sub_struct: DependencySet,
    #[serde(default)]
    pub inline_struct: DependencySet,
    /// Short method name -> identity, populated by the post-pass.
    #[serde(default)]
    pub methods: BTreeMap<String, Identity>,
    /// Interface identities this type structurally satisfies,
    /// deduplicated regardless of whether both value and pointer forms
    /// matched.
    #[serde(default)]
    pub implements: Vec<Identity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    #[serde(flatten)]
    pub identity: Identity,
    pub file_line: FileLine,
    pub is_const: bool,
    pub is_exported: bool,
    pub is_pointer: bool,
    pub declared_type: Option<Identity>,
    pub content: String,
    #[serde(default)]
    pub dependencies: DependencySet,
    /// Peers declared in the same parenthesised group, self excluded.
    #[serde(default)]
    pub groups: Vec<Identity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Package {
    pub pkg_path: String,
    pub is_main: bool,
    pub is_test: bool,
    #[serde(default)]
    pub functions: BTreeMap<String, Function>,
    #[serde(default)]
    pub types: BTreeMap<String, TypeDecl>,
    #[serde(default)]
    pub vars: BTreeMap<String, Variable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEntry {
    pub literal: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileImports {
    pub package: String,
    pub imports: Vec<ImportEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    TypeScript,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub dir: String,
    pub language: Option<Language>,
    #[serde(default)]
    pub packages: BTreeMap<String, Package>,
    /// Dependency name -> versioned key (e.g. `ext.com/lib@v1.2.3`).
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub files: BTreeMap<String, FileImports>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    FUNC,
    TYPE,
    VAR,
    UNKNOWN,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    Dependency,
    Implement,
    Group,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    #[serde(flatten)]
    pub identity: Identity,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(rename = "Type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Edge>,
}

impl GraphNode {
    pub fn placeholder(identity: Identity) -> Self {
        GraphNode {
            identity,
            kind: NodeKind::UNKNOWN,
            dependencies: Vec::new(),
            references: Vec::new(),
            implements: Vec::new(),
            groups: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    #[serde(rename = "ASTVersion")]
    pub ast_version: String,
    #[serde(rename = "ToolVersion")]
    pub tool_version: String,
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub modules: BTreeMap<String, Module>,
    /// Keyed by `mod?pkg#name`.
    #[serde(default)]
    pub graph: BTreeMap<String, GraphNode>,
}

impl Repository {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Repository {
            ast_version: std::env::var("ABCODER_AST_VERSION").unwrap_or_else(|_| "unknown".to_string()),
            tool_version: std::env::var("ABCODER_TOOL_VERSION").unwrap_or_else(|_| "unknown".to_string()),
            id: id.into(),
            path: path.into(),
            modules: BTreeMap::new(),
            graph: BTreeMap::new(),
        }
    }

    pub fn module_mut(&mut self, name: &str) -> &mut Module {
        self.modules.entry(name.to_string()).or_insert_with(|| Module {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Merge another repository's modules and graph into this one,
    /// keyed by module name — the "combined" aggregation mode for
    /// worker results.
    pub fn merge(&mut self, other: Repository) {
        for (name, module) in other.modules {
            match self.modules.entry(name) {
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(module);
                }
                std::collections::btree_map::Entry::Occupied(mut slot) => {
                    let existing = slot.get_mut();
                    for (pkg_path, package) in module.packages {
                        existing.packages.entry(pkg_path).or_insert(package);
                    }
                    for (path, imports) in module.files {
                        existing.files.entry(path).or_insert(imports);
                    }
                    for (dep_name, dep_key) in module.dependencies {
                        existing.dependencies.entry(dep_name).or_insert(dep_key);
                    }
                }
            }
        }
        for (key, node) in other.graph {
            self.graph.entry(key).or_insert(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_set_dedups_by_identity() {
        let mut set = DependencySet::new();
        let id = Identity::new("m", "p", "Foo");
        set.insert_or_ignore(id.clone(), FileLine::new("f.go", 1, 0, 1));
        set.insert_or_ignore(id.clone(), FileLine::new("f.go", 5, 10, 11));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn graph_key_matches_identity_full() {
        let id = Identity::new("m", "p", "Foo");
        assert_eq!(id.full(), format!("{}?{}#{}", "m", "p", "Foo"));
    }
}
