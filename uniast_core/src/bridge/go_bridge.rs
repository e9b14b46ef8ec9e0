//! Go adapter: `go list -json -deps` for package/dependency enumeration
//! plus a long-lived `gopls` subprocess speaking LSP-over-stdio for
//! `documentSymbol`/`definition`, which together stand in for
//! `Uses`/`Defs`/`Types`/`Selections`.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use lsp_types::{
    DocumentSymbolParams, DocumentSymbolResponse, GotoDefinitionParams, InitializeParams, Location, Position,
    SymbolInformation, SymbolKind as LspSymbolKind, TextDocumentIdentifier, TextDocumentPositionParams, Url,
};
use serde_json::{json, Value};

use crate::bridge::{
    BridgeOptions, CheckedFile, LoadedPackage, ResolvedSymbol, SemanticTables, Selection, SelectionKind, SymbolKind,
    TypeCheckerBridge,
};
use crate::classify::default_alias;
use crate::errors::IndexError;
use crate::identity::{is_stdlib_package, Identity};
use crate::lowering::common::{scan_body_tokens, BodyToken};
use crate::manifest::go::{list_all_packages, GoListPackage};
use crate::pipeline::extract_go_imports;

/// Frames and unframes LSP's `Content-Length`-prefixed JSON-RPC
/// messages over a child process's stdio, the same shape the pack's
/// other LSP-driving crates use against `gopls`/`tower-lsp` peers.
struct GoplsClient {
    child: Child,
    next_id: i64,
}

impl GoplsClient {
    fn spawn(workspace_root: &Path) -> Result<Self, IndexError> {
        let child = Command::new("gopls")
            .arg("serve")
            .current_dir(workspace_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| IndexError::PackageLoadFailed {
                pkg_path: workspace_root.display().to_string(),
                underlying: format!("failed to spawn gopls: {e}"),
            })?;
        let mut client = GoplsClient { child, next_id: 1 };
        client.initialize(workspace_root)?;
        Ok(client)
    }

    fn initialize(&mut self, workspace_root: &Path) -> Result<(), IndexError> {
        let root_uri = Url::from_directory_path(workspace_root).ok();
        let params = InitializeParams {
            root_uri,
            ..Default::default()
        };
        let params_value = serde_json::to_value(params).unwrap_or_else(|_| json!({}));
        self.request("initialize", params_value)?;
        self.notify("initialized", json!({}))?;
        Ok(())
    }

    fn write_message(&mut self, value: &Value) -> Result<(), IndexError> {
        let body = serde_json::to_vec(value).map_err(|e| IndexError::PackageLoadFailed {
            pkg_path: "gopls".to_string(),
            underlying: e.to_string(),
        })?;
        let stdin = self.child.stdin.as_mut().ok_or_else(|| IndexError::PackageLoadFailed {
            pkg_path: "gopls".to_string(),
            underlying: "stdin closed".to_string(),
        })?;
        write!(stdin, "Content-Length: {}\r\n\r\n", body.len()).map_err(io_err)?;
        stdin.write_all(&body).map_err(io_err)?;
        stdin.flush().map_err(io_err)?;
        Ok(())
    }

    fn read_message(&mut self) -> Result<Value, IndexError> {
        let stdout = self.child.stdout.as_mut().ok_or_else(|| IndexError::PackageLoadFailed {
            pkg_path: "gopls".to_string(),
            underlying: "stdout closed".to_string(),
        })?;
        let mut reader = BufReader::new(stdout);
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).map_err(io_err)?;
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                break;
            }
            if let Some(value) = trimmed.strip_prefix("Content-Length: ") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
        let mut buf = vec![0u8; content_length];
        std::io::Read::read_exact(&mut reader, &mut buf).map_err(io_err)?;
        serde_json::from_slice(&buf).map_err(|e| IndexError::PackageLoadFailed {
            pkg_path: "gopls".to_string(),
            underlying: e.to_string(),
        })
    }

    fn request(&mut self, method: &str, params: Value) -> Result<Value, IndexError> {
        let id = self.next_id;
        self.next_id += 1;
        self.write_message(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))?;
        loop {
            let response = self.read_message()?;
            if response.get("id").and_then(Value::as_i64) == Some(id) {
                return Ok(response.get("result").cloned().unwrap_or(Value::Null));
            }
            // Notifications/requests interleaved before our response
            // arrives are discarded; this adapter only needs request/
            // response round trips, not server-initiated pushes.
        }
    }

    fn notify(&mut self, method: &str, params: Value) -> Result<(), IndexError> {
        self.write_message(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        }))
    }

    fn document_symbols(&mut self, file_uri: &Url) -> Result<DocumentSymbolResponse, IndexError> {
        let params = DocumentSymbolParams {
            text_document: TextDocumentIdentifier { uri: file_uri.clone() },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        let value = self.request("textDocument/documentSymbol", serde_json::to_value(params).unwrap())?;
        serde_json::from_value(value).map_err(|e| IndexError::PackageLoadFailed {
            pkg_path: file_uri.to_string(),
            underlying: e.to_string(),
        })
    }

    /// `textDocument/definition` at one position, normalised to a flat
    /// list of locations regardless of which of the three response
    /// shapes (`Scalar`/`Array`/`Link`) the server chose.
    fn goto_definition(&mut self, uri: &Url, position: Position) -> Result<Vec<Location>, IndexError> {
        let params = GotoDefinitionParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
                position,
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        let value = self.request("textDocument/definition", serde_json::to_value(params).unwrap())?;
        let response: Option<lsp_types::GotoDefinitionResponse> = serde_json::from_value(value).ok();
        Ok(match response {
            Some(lsp_types::GotoDefinitionResponse::Scalar(loc)) => vec![loc],
            Some(lsp_types::GotoDefinitionResponse::Array(locs)) => locs,
            Some(lsp_types::GotoDefinitionResponse::Link(links)) => links
                .into_iter()
                .map(|l| Location { uri: l.target_uri, range: l.target_selection_range })
                .collect(),
            None => Vec::new(),
        })
    }
}

fn io_err(e: std::io::Error) -> IndexError {
    IndexError::PackageLoadFailed {
        pkg_path: "gopls".to_string(),
        underlying: e.to_string(),
    }
}

impl Drop for GoplsClient {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

/// Converts a byte offset into `gopls`'s `Position` (0-based line,
/// UTF-16 code-unit column), counting from the start of `source`.
fn offset_to_position(source: &str, offset: usize) -> Position {
    let offset = offset.min(source.len());
    let mut line = 0u32;
    let mut character = 0u32;
    for ch in source[..offset].chars() {
        if ch == '\n' {
            line += 1;
            character = 0;
        } else {
            character += ch.len_utf16() as u32;
        }
    }
    Position { line, character }
}

fn lsp_symbol_kind(kind: LspSymbolKind) -> SymbolKind {
    if kind == LspSymbolKind::FUNCTION {
        SymbolKind::Function
    } else if kind == LspSymbolKind::METHOD {
        SymbolKind::Method
    } else if kind == LspSymbolKind::STRUCT
        || kind == LspSymbolKind::INTERFACE
        || kind == LspSymbolKind::CLASS
        || kind == LspSymbolKind::TYPE_PARAMETER
    {
        SymbolKind::Type
    } else if kind == LspSymbolKind::CONSTANT {
        SymbolKind::Constant
    } else if kind == LspSymbolKind::VARIABLE || kind == LspSymbolKind::FIELD {
        SymbolKind::Variable
    } else if kind == LspSymbolKind::PACKAGE || kind == LspSymbolKind::MODULE || kind == LspSymbolKind::NAMESPACE {
        SymbolKind::Package
    } else {
        SymbolKind::Builtin
    }
}

/// Every import visible in one Go file, keyed by the alias it
/// introduces into that file's scope (§4.3's alias-default rule, blank
/// `_` and dot `.` imports excluded since neither binds a usable name).
fn import_aliases(content: &str) -> HashMap<String, String> {
    let mut aliases = HashMap::new();
    for entry in extract_go_imports(content) {
        let alias = match entry.alias.as_deref() {
            Some("_") | Some(".") => continue,
            Some(explicit) => explicit.to_string(),
            None => default_alias(&entry.literal),
        };
        aliases.insert(alias, entry.literal);
    }
    aliases
}

pub struct GoBridge {
    workspace_root: PathBuf,
    module: String,
    gopls: Option<GoplsClient>,
    cache: HashMap<String, Arc<LoadedPackage>>,
    list_cache: Option<Vec<GoListPackage>>,
}

impl GoBridge {
    pub fn new(workspace_root: impl Into<PathBuf>, module: impl Into<String>) -> Self {
        GoBridge {
            workspace_root: workspace_root.into(),
            module: module.into(),
            gopls: None,
            cache: HashMap::new(),
            list_cache: None,
        }
    }

    fn ensure_gopls(&mut self) -> Result<&mut GoplsClient, IndexError> {
        if self.gopls.is_none() {
            self.gopls = Some(GoplsClient::spawn(&self.workspace_root)?);
        }
        Ok(self.gopls.as_mut().unwrap())
    }

    fn ensure_listed(&mut self) -> Result<&[GoListPackage], IndexError> {
        if self.list_cache.is_none() {
            let packages = list_all_packages(&self.workspace_root)?;
            self.list_cache = Some(packages);
        }
        Ok(self.list_cache.as_ref().unwrap())
    }

    fn document_symbols(&mut self, uri: &Url) -> Result<Vec<SymbolInformation>, IndexError> {
        match self.ensure_gopls()?.document_symbols(uri)? {
            DocumentSymbolResponse::Flat(symbols) => Ok(symbols),
            // The client never advertises hierarchical-symbol support
            // (`InitializeParams::default()`), so a conformant server
            // replies with the flat shape; a `Nested` reply would mean
            // the server ignored that, which this bridge can't use.
            DocumentSymbolResponse::Nested(_) => Ok(Vec::new()),
        }
    }

    fn goto_definition(&mut self, uri: &Url, position: Position) -> Result<Vec<Location>, IndexError> {
        self.ensure_gopls()?.goto_definition(uri, position)
    }

    /// The module a given import path's package belongs to: empty for
    /// standard library, the owning `go.mod` module path otherwise.
    /// Falls back to the import path itself when `go list` has no
    /// record of it (e.g. the dependency graph wasn't walked that far).
    fn module_for_import(&mut self, import_path: &str) -> String {
        if is_stdlib_package(import_path) {
            return String::new();
        }
        match self.ensure_listed() {
            Ok(listed) => listed
                .iter()
                .find(|p| p.import_path == import_path)
                .and_then(|p| p.module.as_ref())
                .map(|m| m.path.clone())
                .unwrap_or_else(|| import_path.to_string()),
            Err(_) => import_path.to_string(),
        }
    }

    /// Which package a resolved location's file belongs to, as
    /// `(pkg_path, module)`, by matching its parent directory against
    /// `go list`'s own `Dir` field.
    fn package_for_file(&mut self, file_path: &Path) -> Option<(String, String)> {
        let dir = file_path.parent()?;
        let listed = self.ensure_listed().ok()?;
        listed.iter().find_map(|p| {
            let pkg_dir = p.dir.as_deref()?;
            if Path::new(pkg_dir) != dir {
                return None;
            }
            let module = if p.standard {
                String::new()
            } else {
                p.module.as_ref().map(|m| m.path.clone()).unwrap_or_else(|| p.import_path.clone())
            };
            Some((p.import_path.clone(), module))
        })
    }

    /// Resolves the identifier at `position` in `uri` to its
    /// declaration via `textDocument/definition`, then classifies that
    /// declaration's kind via `textDocument/documentSymbol` on the
    /// target file.
    fn resolve_symbol_at(&mut self, uri: &Url, position: Position) -> Option<ResolvedSymbol> {
        let loc = self.goto_definition(uri, position).ok()?.into_iter().next()?;
        let target_path = loc.uri.to_file_path().ok()?;
        let (pkg_path, module) = self.package_for_file(&target_path)?;
        let symbols = self.document_symbols(&loc.uri).ok()?;
        let line = loc.range.start.line;
        let symbol = symbols.into_iter().find(|s| s.location.range.start.line == line)?;
        let kind = lsp_symbol_kind(symbol.kind);
        if kind == SymbolKind::Builtin {
            return None;
        }
        let name = if symbol.kind == LspSymbolKind::METHOD {
            match &symbol.container_name {
                Some(container) => format!("{container}.{}", symbol.name),
                None => symbol.name.clone(),
            }
        } else {
            symbol.name.clone()
        };
        Some(ResolvedSymbol { kind, identity: Identity::new(module, pkg_path, name) })
    }

    /// Resolves a `recv.sel` selector expression's `sel` identifier to
    /// its declaration and, when that declaration is a method (i.e.
    /// `documentSymbol` reports a `container_name`, gopls' stand-in for
    /// a receiver type), returns the `MethodVal` selection §4.4 needs.
    fn resolve_selection_at(&mut self, uri: &Url, sel_position: Position, object_name: &str) -> Option<Selection> {
        let loc = self.goto_definition(uri, sel_position).ok()?.into_iter().next()?;
        let symbols = self.document_symbols(&loc.uri).ok()?;
        let line = loc.range.start.line;
        let symbol = symbols.into_iter().find(|s| s.location.range.start.line == line)?;
        if symbol.kind != LspSymbolKind::METHOD {
            return None;
        }
        let container = symbol.container_name?;
        let target_path = loc.uri.to_file_path().ok()?;
        let (pkg_path, module) = self.package_for_file(&target_path)?;
        Some(Selection {
            kind: SelectionKind::MethodVal,
            receiver_type: Identity::new(module, pkg_path, container),
            object_name: object_name.to_string(),
        })
    }

    /// Builds the `Uses`/`Defs`/`Selections` tables for one package by
    /// driving `gopls`: `documentSymbol` supplies `Defs` for this
    /// package's own declarations, and `textDocument/definition` at
    /// every identifier/selector site `scan_body_tokens` finds (the
    /// same scan `lowering::common::classify_and_insert` expects to
    /// look up against) resolves `Uses`/`Selections` so the two tables
    /// are keyed exactly the way the lowering engine reads them.
    fn semantic_tables_for(&mut self, files: &[CheckedFile], pkg_path: &str) -> SemanticTables {
        let mut tables = SemanticTables::default();
        let workspace_root = self.workspace_root.clone();
        let module = self.module.clone();

        for file in files {
            let Ok(uri) = Url::from_file_path(workspace_root.join(&file.relative_path)) else {
                continue;
            };

            if let Ok(symbols) = self.document_symbols(&uri) {
                for sym in &symbols {
                    let key = format!("{}:{}", file.relative_path, sym.location.range.start.line);
                    tables.defs.insert(
                        key,
                        ResolvedSymbol {
                            kind: lsp_symbol_kind(sym.kind),
                            identity: Identity::new(module.clone(), pkg_path, sym.name.clone()),
                        },
                    );
                }
            }

            let aliases = import_aliases(&file.content);

            for token in scan_body_tokens(&file.content, 0) {
                match token {
                    BodyToken::Ident { name, start, .. } => {
                        let use_key = format!("{}:{}", file.relative_path, name);
                        if tables.uses.contains_key(&use_key) {
                            continue;
                        }
                        let position = offset_to_position(&file.content, start);
                        if let Some(resolved) = self.resolve_symbol_at(&uri, position) {
                            tables.uses.insert(use_key, resolved);
                        }
                    }
                    BodyToken::Selector { recv, sel, start, .. } => {
                        let sel_offset = start + recv.len() + 1;
                        let sel_position = offset_to_position(&file.content, sel_offset);

                        if let Some(import_path) = aliases.get(&recv) {
                            let recv_key = format!("{}:{}", file.relative_path, recv);
                            if !tables.uses.contains_key(&recv_key) {
                                let import_module = self.module_for_import(import_path);
                                tables.uses.insert(
                                    recv_key,
                                    ResolvedSymbol {
                                        kind: SymbolKind::Package,
                                        identity: Identity::new(import_module, import_path.clone(), String::new()),
                                    },
                                );
                            }
                            let sel_key = format!("{}:{}.{}", file.relative_path, recv, sel);
                            if !tables.uses.contains_key(&sel_key) {
                                if let Some(resolved) = self.resolve_symbol_at(&uri, sel_position) {
                                    tables.uses.insert(sel_key, resolved);
                                }
                            }
                            continue;
                        }

                        let selection_key = format!("{}:{}:sel", file.relative_path, start);
                        if !tables.selections.contains_key(&selection_key) {
                            if let Some(selection) = self.resolve_selection_at(&uri, sel_position, &recv) {
                                tables.selections.insert(selection_key, selection);
                                continue;
                            }
                        }

                        let recv_key = format!("{}:{}", file.relative_path, recv);
                        if !tables.uses.contains_key(&recv_key) {
                            let recv_position = offset_to_position(&file.content, start);
                            if let Some(resolved) = self.resolve_symbol_at(&uri, recv_position) {
                                if resolved.kind == SymbolKind::Variable {
                                    tables.uses.insert(recv_key, resolved);
                                }
                            }
                        }
                    }
                }
            }
        }
        tables
    }
}

impl TypeCheckerBridge for GoBridge {
    fn load_package(&mut self, pkg_path: &str, options: &BridgeOptions) -> Result<Arc<LoadedPackage>, IndexError> {
        if let Some(hit) = self.cache.get(pkg_path) {
            return Ok(hit.clone());
        }

        let listed = self.ensure_listed()?;
        let entry = listed
            .iter()
            .find(|p| p.import_path == pkg_path)
            .ok_or_else(|| IndexError::ModuleNotFound(pkg_path.to_string()))?
            .clone();

        let dir = entry
            .dir
            .clone()
            .map(PathBuf::from)
            .ok_or_else(|| IndexError::PackageLoadFailed {
                pkg_path: pkg_path.to_string(),
                underlying: "go list reported no Dir".to_string(),
            })?;

        let mut files = Vec::new();
        for name in &entry.go_files {
            let full_path = dir.join(name);
            let content = std::fs::read_to_string(&full_path).map_err(|e| IndexError::PackageLoadFailed {
                pkg_path: pkg_path.to_string(),
                underlying: e.to_string(),
            })?;
            files.push(CheckedFile {
                relative_path: full_path
                    .strip_prefix(&self.workspace_root)
                    .unwrap_or(&full_path)
                    .to_string_lossy()
                    .to_string(),
                content,
                is_test: false,
            });
        }
        if options.include_tests {
            for name in &entry.test_go_files {
                let full_path = dir.join(name);
                if let Ok(content) = std::fs::read_to_string(&full_path) {
                    files.push(CheckedFile {
                        relative_path: full_path
                            .strip_prefix(&self.workspace_root)
                            .unwrap_or(&full_path)
                            .to_string_lossy()
                            .to_string(),
                        content,
                        is_test: true,
                    });
                }
            }
        }

        let semantics = self.semantic_tables_for(&files, pkg_path);

        let pkg = Arc::new(LoadedPackage {
            pkg_path: pkg_path.to_string(),
            is_main: entry.import_path.ends_with("/main") || entry.import_path == "main",
            is_test_only: false,
            files,
            semantics,
        });
        self.cache.insert(pkg_path.to_string(), pkg.clone());
        Ok(pkg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_go_list_package_shapes() {
        let bytes = br#"{"ImportPath":"example.com/m/p","Dir":"/tmp/m/p","GoFiles":["a.go"],"Deps":["fmt"]}"#;
        let parsed: GoListPackage = serde_json::from_slice(bytes).unwrap();
        assert_eq!(parsed.import_path, "example.com/m/p");
        assert_eq!(parsed.go_files, vec!["a.go".to_string()]);
    }

    #[test]
    fn import_aliases_default_and_explicit() {
        let content = "package p\n\nimport (\n\t\"fmt\"\n\tw \"github.com/acme/widget\"\n)\n";
        let aliases = import_aliases(content);
        assert_eq!(aliases.get("fmt").map(String::as_str), Some("fmt"));
        assert_eq!(aliases.get("w").map(String::as_str), Some("github.com/acme/widget"));
    }

    #[test]
    fn offset_to_position_counts_utf16_columns() {
        let pos = offset_to_position("a\nbc", 3);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.character, 1);
    }
}
