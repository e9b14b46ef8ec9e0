//! ECMAScript-family front-end discovery: monorepo detection, per-module
//! source-directory resolution, and `isMain`/`isTest` package
//! classification.

use std::path::{Path, PathBuf};

use crate::discovery::{build_exclusions, is_excluded, DiscoveredModule, DiscoveredPackage};
use crate::errors::IndexError;
use crate::manifest::node::{expand_workspace_globs, parse_package_json, parse_tsconfig};

#[derive(Default)]
pub struct TsDiscoveryOptions {
    pub excludes: Vec<String>,
    pub tsconfig_path: Option<PathBuf>,
    pub no_dist: bool,
    /// `--src <glob,glob,...>` overrides directory discovery entirely.
    pub src_globs: Vec<String>,
}

/// Monorepo detection prefers the manifest's own `workspaces` field
/// (manifest-driven discovery) when a root `package.json` declares one;
/// otherwise it falls back to counting `package.json` files in the tree
/// and treating >= 2 as a monorepo, per the design note resolving the
/// ambiguity between the two variants the ECMAScript front-end ships.
pub fn discover_ts_modules(repo_root: &Path, options: &TsDiscoveryOptions) -> Result<Vec<DiscoveredModule>, IndexError> {
    let exclusions = build_exclusions(&options.excludes);

    let root_manifest_path = repo_root.join("package.json");
    let root_manifest = std::fs::read_to_string(&root_manifest_path)
        .ok()
        .and_then(|content| parse_package_json(&content).ok());

    let module_dirs: Vec<PathBuf> = if let Some(ref manifest) = root_manifest {
        if !manifest.workspaces.is_empty() {
            expand_workspace_globs(repo_root, &manifest.workspaces)
        } else {
            count_heuristic_modules(repo_root, &exclusions)
        }
    } else {
        count_heuristic_modules(repo_root, &exclusions)
    };

    let mut modules = Vec::new();
    if module_dirs.is_empty() {
        // Single package: the main manifest is the sole module.
        if let Some(manifest) = root_manifest {
            let packages = discover_packages_in_module(repo_root, repo_root, &exclusions, options)?;
            modules.push(DiscoveredModule {
                name: manifest.name,
                dir: PathBuf::new(),
                packages,
            });
        }
    } else {
        for rel_dir in module_dirs {
            let module_dir = repo_root.join(&rel_dir);
            let Ok(content) = std::fs::read_to_string(module_dir.join("package.json")) else {
                continue;
            };
            let Ok(manifest) = parse_package_json(&content) else {
                continue;
            };
            let packages = discover_packages_in_module(repo_root, &module_dir, &exclusions, options)?;
            modules.push(DiscoveredModule {
                name: manifest.name,
                dir: rel_dir,
                packages,
            });
        }
    }
    Ok(modules)
}

fn count_heuristic_modules(repo_root: &Path, exclusions: &[regex::Regex]) -> Vec<PathBuf> {
    let mut manifests = Vec::new();
    for entry in walkdir::WalkDir::new(repo_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name() == "package.json")
    {
        let dir = entry.path().parent().unwrap_or(repo_root);
        let rel = dir.strip_prefix(repo_root).unwrap_or(dir);
        if is_excluded(rel, exclusions) {
            continue;
        }
        manifests.push(rel.to_path_buf());
    }
    if manifests.len() >= 2 {
        manifests.retain(|p| !p.as_os_str().is_empty());
        manifests
    } else {
        Vec::new()
    }
}

fn discover_packages_in_module(
    repo_root: &Path,
    module_dir: &Path,
    exclusions: &[regex::Regex],
    options: &TsDiscoveryOptions,
) -> Result<Vec<DiscoveredPackage>, IndexError> {
    let source_dirs = resolve_source_dirs(module_dir, options);

    let mut packages = Vec::new();
    for src_dir in source_dirs {
        let abs_src_dir = module_dir.join(&src_dir);
        if !abs_src_dir.is_dir() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&abs_src_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
        {
            let rel_to_repo = entry.path().strip_prefix(repo_root).unwrap_or(entry.path());
            if is_excluded(rel_to_repo, exclusions) {
                continue;
            }
            let has_source_file = std::fs::read_dir(entry.path())
                .map(|mut it| {
                    it.any(|e| {
                        e.ok()
                            .map(|e| {
                                e.path()
                                    .extension()
                                    .and_then(|x| x.to_str())
                                    .map(|x| matches!(x, "ts" | "tsx" | "js" | "jsx"))
                                    .unwrap_or(false)
                            })
                            .unwrap_or(false)
                    })
                })
                .unwrap_or(false);
            if !has_source_file {
                continue;
            }
            let rel_to_module = entry.path().strip_prefix(module_dir).unwrap_or(entry.path());
            let pkg_path = if rel_to_module.as_os_str().is_empty() {
                ".".to_string()
            } else {
                rel_to_module.to_string_lossy().to_string()
            };
            let is_main = entry.path().join("index.ts").is_file()
                || entry.path().join("index.js").is_file()
                || entry.path().join("main.ts").is_file();
            let is_test = pkg_path.contains("test") || pkg_path.contains("__tests__");
            packages.push(DiscoveredPackage {
                pkg_path,
                dir: rel_to_module.to_path_buf(),
                is_main,
                is_test,
            });
        }
    }
    Ok(packages)
}

fn resolve_source_dirs(module_dir: &Path, options: &TsDiscoveryOptions) -> Vec<PathBuf> {
    if !options.src_globs.is_empty() {
        return options.src_globs.iter().map(PathBuf::from).collect();
    }

    let tsconfig_path = options
        .tsconfig_path
        .clone()
        .unwrap_or_else(|| module_dir.join("tsconfig.json"));
    if let Ok(content) = std::fs::read_to_string(&tsconfig_path) {
        if let Ok(cfg) = parse_tsconfig(&content) {
            let mut dirs = Vec::new();
            if let Some(root) = cfg.root_dir {
                dirs.push(PathBuf::from(root));
            }
            if !options.no_dist {
                if let Some(out) = cfg.out_dir {
                    dirs.push(PathBuf::from(out));
                }
            }
            if !dirs.is_empty() {
                return dirs;
            }
        }
    }

    let mut dirs = vec![PathBuf::from("src"), PathBuf::from("lib")];
    if !options.no_dist {
        dirs.push(PathBuf::from("dist"));
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_src_lib_dist_without_tsconfig() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = resolve_source_dirs(dir.path(), &TsDiscoveryOptions::default());
        assert_eq!(dirs, vec![PathBuf::from("src"), PathBuf::from("lib"), PathBuf::from("dist")]);
    }

    #[test]
    fn no_dist_flag_excludes_dist_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let options = TsDiscoveryOptions {
            no_dist: true,
            ..Default::default()
        };
        let dirs = resolve_source_dirs(dir.path(), &options);
        assert!(!dirs.contains(&PathBuf::from("dist")));
    }

    #[test]
    fn single_package_repo_yields_one_module() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"name":"solo"}"#).unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/index.ts"), "export const x = 1;").unwrap();

        let modules = discover_ts_modules(dir.path(), &TsDiscoveryOptions::default()).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name, "solo");
        assert!(modules[0].packages.iter().any(|p| p.is_main));
    }
}
