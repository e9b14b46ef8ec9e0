//! Compiled-typed (Go) front-end discovery: locate `go.mod` manifests,
//! enumerate packages either by directory walk or by a single
//! "all packages under this module" checker call.

use std::path::Path;

use crate::discovery::{build_exclusions, is_excluded, DiscoveredModule, DiscoveredPackage};
use crate::errors::IndexError;
use crate::manifest::go::{list_all_packages, parse_go_mod};
use crate::manifest::{discover_manifest_roots, ManifestRoot};

pub struct GoDiscoveryOptions {
    pub excludes: Vec<String>,
    /// Forces per-directory enumeration instead of one "all packages"
    /// checker call (`--load-by-packages`).
    pub load_by_packages: bool,
    pub include_tests: bool,
}

impl Default for GoDiscoveryOptions {
    fn default() -> Self {
        GoDiscoveryOptions {
            excludes: Vec::new(),
            load_by_packages: false,
            include_tests: false,
        }
    }
}

pub fn discover_go_modules(repo_root: &Path, options: &GoDiscoveryOptions) -> Result<Vec<DiscoveredModule>, IndexError> {
    let exclusions = build_exclusions(&options.excludes);
    let exclude_set = globset::GlobSetBuilder::new().build().unwrap_or_else(|_| globset::GlobSet::empty());

    let roots: Vec<ManifestRoot> = discover_manifest_roots(repo_root, "go.mod", &exclude_set, |path| {
        std::fs::read_to_string(path).ok().map(|content| parse_go_mod(&content).module_path)
    });

    let mut modules = Vec::new();
    for root in roots {
        let module_dir = repo_root.join(&root.relative_dir);
        let packages = if options.load_by_packages {
            discover_by_directory_walk(&module_dir, &root.module_name, &exclusions)
        } else {
            discover_via_go_list(&module_dir, &root.module_name, options.include_tests)?
        };
        modules.push(DiscoveredModule {
            name: root.module_name,
            dir: root.relative_dir,
            packages,
        });
    }
    Ok(modules)
}

fn discover_via_go_list(module_dir: &Path, module_name: &str, include_tests: bool) -> Result<Vec<DiscoveredPackage>, IndexError> {
    let listed = list_all_packages(module_dir)?;
    let packages = listed
        .into_iter()
        .filter(|p| !p.standard && p.import_path.starts_with(module_name))
        .filter(|p| include_tests || !p.go_files.is_empty())
        .map(|p| DiscoveredPackage {
            pkg_path: p.import_path.clone(),
            dir: p.dir.map(std::path::PathBuf::from).unwrap_or_default(),
            is_main: p.import_path.ends_with("/main") || p.import_path == module_name,
            is_test: p.go_files.is_empty() && !p.test_go_files.is_empty(),
        })
        .collect();
    Ok(packages)
}

fn discover_by_directory_walk(module_dir: &Path, module_name: &str, exclusions: &[regex::Regex]) -> Vec<DiscoveredPackage> {
    let mut packages = Vec::new();
    for entry in walkdir::WalkDir::new(module_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        let rel = entry.path().strip_prefix(module_dir).unwrap_or(entry.path());
        if is_excluded(rel, exclusions) {
            continue;
        }
        let has_go_file = std::fs::read_dir(entry.path())
            .map(|mut it| it.any(|e| e.ok().map(|e| e.path().extension().map(|x| x == "go").unwrap_or(false)).unwrap_or(false)))
            .unwrap_or(false);
        if !has_go_file {
            continue;
        }
        let pkg_path = if rel.as_os_str().is_empty() {
            module_name.to_string()
        } else {
            format!("{module_name}/{}", rel.to_string_lossy())
        };
        packages.push(DiscoveredPackage {
            pkg_path,
            dir: rel.to_path_buf(),
            is_main: rel.file_name().map(|n| n == "main").unwrap_or(false),
            is_test: rel.to_string_lossy().contains("test"),
        });
    }
    packages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_walk_finds_go_package_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/file.go"), "package sub\n").unwrap();
        std::fs::create_dir_all(dir.path().join("nogofiles")).unwrap();
        std::fs::write(dir.path().join("nogofiles/readme.md"), "hi").unwrap();

        let packages = discover_by_directory_walk(dir.path(), "example.com/m", &[]);
        assert!(packages.iter().any(|p| p.pkg_path == "example.com/m/sub"));
        assert!(!packages.iter().any(|p| p.pkg_path.contains("nogofiles")));
    }
}
