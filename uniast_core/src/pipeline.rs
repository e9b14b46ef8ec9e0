//! Orchestration: ties discovery, the per-language bridge, the lowering
//! engine, the external-reference follower, and the post-pass together.
//! This is the one module both the direct (single-process) CLI path
//! and the worker subprocess entrypoint (§4.8) build on, so the two
//! only differ in how they drive it, not in what it does.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::bridge::{go_bridge::GoBridge, ts_bridge::TsBridge, BridgeOptions, TypeCheckerBridge};
use crate::discovery::go_discovery::{discover_go_modules, GoDiscoveryOptions};
use crate::discovery::ts_discovery::{discover_ts_modules, TsDiscoveryOptions};
use crate::discovery::DiscoveredModule;
use crate::errors::IndexError;
use crate::external_ref::{follow_external_reference, FollowRequest};
use crate::identity::Identity;
use crate::lowering::go_lowerer::GoLowerer;
use crate::lowering::ts_lowerer::TsLowerer;
use crate::lowering::{merge_into_package, Lowerer};
use crate::manifest::go::parse_go_mod;
use crate::manifest::node::parse_package_json;
use crate::model::{FileImports, ImportEntry, Language as ModelLanguage, Module, Package, Repository, TypeKind};
use crate::postpass::method_binding::bind_methods;
use crate::postpass::{run_post_pass, SubtypingChecker, TypeHandleIndex};
use crate::workdist::evaluator::ProjectMetrics;
use crate::workdist::WorkerContext;

/// Which language front-end a run is driving. Kept distinct from
/// `cli::args::Language` so this module has no dependency on `clap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontEnd {
    Go,
    TypeScript,
}

impl FrontEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrontEnd::Go => "go",
            FrontEnd::TypeScript => "typescript",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "go" => Some(FrontEnd::Go),
            "typescript" | "ts" | "js" => Some(FrontEnd::TypeScript),
            _ => None,
        }
    }

    fn model_language(&self) -> ModelLanguage {
        match self {
            FrontEnd::Go => ModelLanguage::Go,
            FrontEnd::TypeScript => ModelLanguage::TypeScript,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub front_end: FrontEnd,
    pub repo_dir: PathBuf,
    pub refer_code_depth: u32,
    pub include_tests: bool,
    pub collect_comments: bool,
    pub exclude_patterns: Vec<String>,
    pub load_by_packages: bool,
    pub tsconfig: Option<PathBuf>,
    pub no_dist: bool,
    pub src_globs: Vec<String>,
}

/// Runs per-language discovery over `options.repo_dir`.
pub fn discover_modules(options: &PipelineOptions) -> Result<Vec<DiscoveredModule>, IndexError> {
    match options.front_end {
        FrontEnd::Go => discover_go_modules(
            &options.repo_dir,
            &GoDiscoveryOptions {
                excludes: options.exclude_patterns.clone(),
                load_by_packages: options.load_by_packages,
                include_tests: options.include_tests,
            },
        ),
        FrontEnd::TypeScript => discover_ts_modules(
            &options.repo_dir,
            &TsDiscoveryOptions {
                excludes: options.exclude_patterns.clone(),
                tsconfig_path: options.tsconfig.clone(),
                no_dist: options.no_dist,
                src_globs: options.src_globs.clone(),
            },
        ),
    }
}

/// Walks `module`'s packages on disk to produce the evaluator's input
/// metrics, counting only source files of the active front-end.
pub fn compute_project_metrics(repo_dir: &Path, module: &DiscoveredModule, front_end: FrontEnd) -> ProjectMetrics {
    let extensions: &[&str] = match front_end {
        FrontEnd::Go => &["go"],
        FrontEnd::TypeScript => &["ts", "tsx", "js", "jsx", "mjs", "cjs"],
    };
    let module_dir = repo_dir.join(&module.dir);

    let mut total_files = 0usize;
    let mut total_bytes = 0u64;
    let mut largest_package_files = 0usize;
    let package_count = module.packages.len();

    for pkg in &module.packages {
        let pkg_dir = module_dir.join(&pkg.dir);
        let mut pkg_files = 0usize;
        if let Ok(entries) = std::fs::read_dir(&pkg_dir) {
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                let matches = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|ext| extensions.contains(&ext))
                    .unwrap_or(false);
                if matches {
                    pkg_files += 1;
                    total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
                }
            }
        }
        total_files += pkg_files;
        largest_package_files = largest_package_files.max(pkg_files);
    }

    let avg_files_per_package = if package_count > 0 {
        total_files as f64 / package_count as f64
    } else {
        0.0
    };

    ProjectMetrics {
        total_files,
        total_bytes,
        package_count,
        largest_package_files,
        avg_files_per_package,
    }
}

static GO_IMPORT_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)import\s*\(\s*(?P<body>.*?)\)").unwrap());
static GO_IMPORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*(?:(?P<alias>\w+)\s+)?"(?P<path>[^"]+)"\s*$"#).unwrap());
static GO_SINGLE_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^import\s+(?:(?P<alias>\w+)\s+)?"(?P<path>[^"]+)"\s*$"#).unwrap());

pub(crate) fn extract_go_imports(content: &str) -> Vec<ImportEntry> {
    let mut entries = Vec::new();
    if let Some(block) = GO_IMPORT_BLOCK.captures(content) {
        let body = block.name("body").map(|m| m.as_str()).unwrap_or("");
        for cap in GO_IMPORT_LINE.captures_iter(body) {
            entries.push(ImportEntry {
                literal: cap["path"].to_string(),
                alias: cap.name("alias").map(|m| m.as_str().to_string()),
            });
        }
    }
    for cap in GO_SINGLE_IMPORT.captures_iter(content) {
        entries.push(ImportEntry {
            literal: cap["path"].to_string(),
            alias: cap.name("alias").map(|m| m.as_str().to_string()),
        });
    }
    entries
}

static TS_IMPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^import\s+(?:(?P<default>\w+)|\*\s+as\s+(?P<ns>\w+))?[^'"]*from\s+['"](?P<path>[^'"]+)['"]"#)
        .unwrap()
});
static TS_SIDE_EFFECT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?m)^import\s+['"](?P<path>[^'"]+)['"]"#).unwrap());
static TS_REQUIRE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"require\(\s*['"](?P<path>[^'"]+)['"]\s*\)"#).unwrap());

fn extract_ts_imports(content: &str) -> Vec<ImportEntry> {
    let mut entries = Vec::new();
    for cap in TS_IMPORT_FROM.captures_iter(content) {
        let alias = cap
            .name("ns")
            .or_else(|| cap.name("default"))
            .map(|m| m.as_str().to_string());
        entries.push(ImportEntry { literal: cap["path"].to_string(), alias });
    }
    for cap in TS_SIDE_EFFECT.captures_iter(content) {
        entries.push(ImportEntry { literal: cap["path"].to_string(), alias: None });
    }
    for cap in TS_REQUIRE.captures_iter(content) {
        entries.push(ImportEntry { literal: cap["path"].to_string(), alias: None });
    }
    entries
}

fn extract_imports(front_end: FrontEnd, content: &str) -> Vec<ImportEntry> {
    match front_end {
        FrontEnd::Go => extract_go_imports(content),
        FrontEnd::TypeScript => extract_ts_imports(content),
    }
}

/// Loads and lowers one package, returning its declarations plus a
/// per-file import list for `Module.Files`. Generic over the bridge
/// and lowerer rather than trait objects: `TypeCheckerBridge`/`Lowerer`
/// carry an implicit `Sized` bound (as `follow_external_reference`
/// does), so callers pick the concrete Go or TS pair once per module
/// and thread it through instead of boxing.
fn process_package<B: TypeCheckerBridge, L: Lowerer>(
    front_end: FrontEnd,
    bridge: &mut B,
    lowerer: &L,
    module_name: &str,
    pkg_path: &str,
    bridge_options: &BridgeOptions,
) -> Result<(Package, Vec<(String, Vec<ImportEntry>)>), IndexError> {
    let loaded = bridge.load_package(pkg_path, bridge_options)?;
    let mut package = Package {
        pkg_path: pkg_path.to_string(),
        is_main: loaded.is_main,
        is_test: loaded.is_test_only,
        ..Default::default()
    };
    let mut file_imports = Vec::new();
    for file in &loaded.files {
        if file.is_test && !bridge_options.include_tests {
            continue;
        }
        let lowered = lowerer.lower_file(file, module_name, pkg_path, &loaded.semantics, bridge_options.collect_comments);
        merge_into_package(&mut package, lowered);
        file_imports.push((file.relative_path.clone(), extract_imports(front_end, &file.content)));
    }
    Ok((package, file_imports))
}

fn populate_module_dependencies(module: &mut Module, front_end: FrontEnd, module_dir: &Path) {
    match front_end {
        FrontEnd::Go => {
            if let Ok(content) = std::fs::read_to_string(module_dir.join("go.mod")) {
                let gomod = parse_go_mod(&content);
                for req in gomod.requires {
                    module.dependencies.insert(req.path.clone(), format!("{}@{}", req.path, req.version));
                }
            }
        }
        FrontEnd::TypeScript => {
            if let Ok(content) = std::fs::read_to_string(module_dir.join("package.json")) {
                if let Ok(manifest) = parse_package_json(&content) {
                    for dep in manifest.dependencies.iter().chain(manifest.dev_dependencies.iter()) {
                        module.dependencies.insert(dep.clone(), dep.clone());
                    }
                }
            }
        }
    }
}

fn collect_external_targets(package: &Package, module_name: &str, out: &mut Vec<Identity>) {
    let mut push = |id: &Identity| {
        if !id.is_builtin() && id.mod_path != module_name {
            out.push(id.clone());
        }
    };
    for function in package.functions.values() {
        for dep in function
            .function_calls
            .iter()
            .chain(function.method_calls.iter())
            .chain(function.types.iter())
            .chain(function.global_vars.iter())
        {
            push(&dep.identity);
        }
    }
    for type_decl in package.types.values() {
        for dep in type_decl.sub_struct.iter().chain(type_decl.inline_struct.iter()) {
            push(&dep.identity);
        }
    }
    for var in package.vars.values() {
        for dep in var.dependencies.iter() {
            push(&dep.identity);
        }
    }
}

fn bridge_options_for(options: &PipelineOptions) -> BridgeOptions {
    let exclude_patterns = options
        .exclude_patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();
    BridgeOptions {
        refer_code_depth: options.refer_code_depth,
        include_tests: options.include_tests,
        collect_comments: options.collect_comments,
        exclude_patterns,
    }
}

/// Lowers every package in one discovered module: per-package loading,
/// import extraction, and depth-budgeted external-reference following.
/// Returns a repository containing just this module, not yet through
/// the post-pass (callers merge multiple modules' results before
/// finalizing, so cross-module method binding and graph edges see the
/// whole picture).
pub fn lower_module(options: &PipelineOptions, module: &DiscoveredModule) -> (Repository, Vec<IndexError>) {
    let workspace_root = options.repo_dir.join(&module.dir);
    match options.front_end {
        FrontEnd::Go => {
            let mut bridge = GoBridge::new(workspace_root.clone(), module.name.clone());
            let lowerer = GoLowerer { module: module.name.clone() };
            lower_module_with(options, module, &workspace_root, &mut bridge, &lowerer)
        }
        FrontEnd::TypeScript => {
            let mut bridge = TsBridge::new(workspace_root.clone(), module.name.clone());
            let lowerer = TsLowerer { module: module.name.clone() };
            lower_module_with(options, module, &workspace_root, &mut bridge, &lowerer)
        }
    }
}

fn lower_module_with<B: TypeCheckerBridge, L: Lowerer>(
    options: &PipelineOptions,
    module: &DiscoveredModule,
    workspace_root: &Path,
    bridge: &mut B,
    lowerer: &L,
) -> (Repository, Vec<IndexError>) {
    let mut errors = Vec::new();
    let mut repository = Repository::new(format!("module:{}", module.name), options.repo_dir.display().to_string());
    let bridge_options = bridge_options_for(options);

    {
        let module_entry = repository.module_mut(&module.name);
        module_entry.dir = module.dir.to_string_lossy().to_string();
        module_entry.language = Some(options.front_end.model_language());
        populate_module_dependencies(module_entry, options.front_end, workspace_root);
    }

    let mut external_targets: Vec<Identity> = Vec::new();

    for pkg in &module.packages {
        if pkg.is_test && !options.include_tests {
            continue;
        }
        match process_package(options.front_end, bridge, lowerer, &module.name, &pkg.pkg_path, &bridge_options) {
            Ok((package, file_imports)) => {
                collect_external_targets(&package, &module.name, &mut external_targets);
                let module_entry = repository.module_mut(&module.name);
                for (path, imports) in file_imports {
                    module_entry.files.insert(path, FileImports { package: pkg.pkg_path.clone(), imports });
                }
                module_entry.packages.insert(pkg.pkg_path.clone(), package);
            }
            Err(e) => {
                tracing::warn!(package = %pkg.pkg_path, error = %e, "failed to load/lower package");
                errors.push(e);
            }
        }
    }

    for target in external_targets {
        if let Err(e) = follow_external_reference(
            &mut repository,
            bridge,
            lowerer,
            FollowRequest { target: &target, remaining_depth: options.refer_code_depth },
            &bridge_options,
        ) {
            errors.push(e);
        }
    }

    (repository, errors)
}

/// A batch handed to a worker subprocess over stdin: loads and lowers
/// each assigned package independently and returns a fragment (or
/// error) per package, the unit `WorkerMessage::Result` carries.
pub fn run_worker_batch(context: &WorkerContext, package_paths: &[String]) -> Vec<(String, Result<Repository, IndexError>)> {
    let front_end = FrontEnd::parse(&context.language).unwrap_or(FrontEnd::Go);
    match front_end {
        FrontEnd::Go => {
            let mut bridge = GoBridge::new(context.workspace_root.clone(), context.module_name.clone());
            let lowerer = GoLowerer { module: context.module_name.clone() };
            run_worker_batch_with(front_end, context, package_paths, &mut bridge, &lowerer)
        }
        FrontEnd::TypeScript => {
            let mut bridge = TsBridge::new(context.workspace_root.clone(), context.module_name.clone());
            let lowerer = TsLowerer { module: context.module_name.clone() };
            run_worker_batch_with(front_end, context, package_paths, &mut bridge, &lowerer)
        }
    }
}

fn run_worker_batch_with<B: TypeCheckerBridge, L: Lowerer>(
    front_end: FrontEnd,
    context: &WorkerContext,
    package_paths: &[String],
    bridge: &mut B,
    lowerer: &L,
) -> Vec<(String, Result<Repository, IndexError>)> {
    let exclude_patterns = context.exclude_patterns.iter().filter_map(|p| Regex::new(p).ok()).collect();
    let bridge_options = BridgeOptions {
        refer_code_depth: context.refer_code_depth,
        include_tests: context.include_tests,
        collect_comments: context.collect_comments,
        exclude_patterns,
    };

    let mut results = Vec::new();
    for pkg_path in package_paths {
        let outcome = process_package(front_end, bridge, lowerer, &context.module_name, pkg_path, &bridge_options)
            .map(|(package, file_imports)| {
                let mut repo = Repository::new(format!("worker:{pkg_path}"), context.workspace_root.display().to_string());
                let module_entry = repo.module_mut(&context.module_name);
                module_entry.language = Some(front_end.model_language());
                for (path, imports) in file_imports {
                    module_entry.files.insert(path, FileImports { package: pkg_path.clone(), imports });
                }
                module_entry.packages.insert(pkg_path.clone(), package);
                repo
            });
        results.push((pkg_path.clone(), outcome));
    }
    results
}

/// Structural subtyping via method-name-set comparison: since lowering
/// is regex-based there is no real type-checker handle to query, so
/// handles are `Identity::full()` strings and "satisfies" means the
/// type's bound methods (populated by `bind_methods`, which must run
/// before this checker is built) are a superset of the interface's.
struct MethodSetChecker {
    type_methods: HashMap<String, HashSet<String>>,
    interface_methods: HashMap<String, HashSet<String>>,
}

impl SubtypingChecker for MethodSetChecker {
    fn satisfies(&self, type_handle: &str, interface_handle: &str) -> bool {
        let Some(type_methods) = self.type_methods.get(type_handle) else { return false };
        let Some(interface_methods) = self.interface_methods.get(interface_handle) else { return false };
        !interface_methods.is_empty() && interface_methods.is_subset(type_methods)
    }
}

fn build_subtyping_checker(repository: &Repository) -> (TypeHandleIndex, MethodSetChecker) {
    let mut handles = TypeHandleIndex::default();
    let mut checker = MethodSetChecker { type_methods: HashMap::new(), interface_methods: HashMap::new() };

    for module in repository.modules.values() {
        for package in module.packages.values() {
            for type_decl in package.types.values() {
                let handle = type_decl.identity.full();
                let method_names: HashSet<String> = type_decl.methods.keys().cloned().collect();
                match type_decl.type_kind {
                    TypeKind::Interface => {
                        handles.interfaces.insert(handle.clone(), type_decl.identity.clone());
                        checker.interface_methods.insert(handle, method_names);
                    }
                    TypeKind::Struct | TypeKind::Typedef => {
                        handles.types.insert(handle.clone(), type_decl.identity.clone());
                        checker.type_methods.insert(handle, method_names);
                    }
                }
            }
        }
    }

    (handles, checker)
}

/// Runs the post-pass over a fully merged repository: method binding,
/// then interface-implementer discovery (which depends on methods
/// already being bound), then graph materialisation with reverse
/// references. Callers merge every module's `lower_module` output
/// before calling this once, so cross-module edges are visible.
pub fn finalize_repository(mut repository: Repository) -> Repository {
    bind_methods(&mut repository);
    let (handles, checker) = build_subtyping_checker(&repository);
    run_post_pass(repository, &handles, &checker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_end_parses_aliases() {
        assert_eq!(FrontEnd::parse("go"), Some(FrontEnd::Go));
        assert_eq!(FrontEnd::parse("ts"), Some(FrontEnd::TypeScript));
        assert_eq!(FrontEnd::parse("bogus"), None);
    }

    #[test]
    fn extracts_grouped_and_single_go_imports() {
        let src = "package p\n\nimport (\n\t\"fmt\"\n\tw \"github.com/acme/widget\"\n)\n\nimport \"os\"\n";
        let imports = extract_go_imports(src);
        assert!(imports.iter().any(|i| i.literal == "fmt"));
        assert!(imports.iter().any(|i| i.literal == "github.com/acme/widget" && i.alias.as_deref() == Some("w")));
        assert!(imports.iter().any(|i| i.literal == "os"));
    }

    #[test]
    fn extracts_ts_default_and_side_effect_imports() {
        let src = "import React from 'react';\nimport './polyfill';\nimport * as path from 'path';\n";
        let imports = extract_ts_imports(src);
        assert!(imports.iter().any(|i| i.literal == "react" && i.alias.as_deref() == Some("React")));
        assert!(imports.iter().any(|i| i.literal == "./polyfill"));
        assert!(imports.iter().any(|i| i.literal == "path" && i.alias.as_deref() == Some("path")));
    }

    #[test]
    fn method_set_checker_requires_full_superset() {
        let mut checker = MethodSetChecker { type_methods: HashMap::new(), interface_methods: HashMap::new() };
        checker.type_methods.insert("m?p#S".to_string(), ["Read".to_string(), "Write".to_string()].into_iter().collect());
        checker.interface_methods.insert("m?p#RW".to_string(), ["Read".to_string(), "Write".to_string()].into_iter().collect());
        checker.interface_methods.insert("m?p#Closer".to_string(), ["Close".to_string()].into_iter().collect());

        assert!(checker.satisfies("m?p#S", "m?p#RW"));
        assert!(!checker.satisfies("m?p#S", "m?p#Closer"));
    }
}
