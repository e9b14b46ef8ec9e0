//! Manifest discovery and parsing: module-root detection and the
//! per-language dependency-manifest readers that feed discovery (§4.9)
//! and the import classifier (§4.3).

pub mod go;
pub mod node;

use std::path::{Path, PathBuf};

/// One discovered manifest: the module name it declares and the
/// directory (relative to the repo root) it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRoot {
    pub module_name: String,
    pub relative_dir: PathBuf,
}

/// Walks the repo tree collecting every file matching `manifest_name`,
/// then sorts by directory path length descending so the most-specific
/// module wins when a file nests under multiple module roots.
pub fn discover_manifest_roots(
    repo_root: &Path,
    manifest_name: &str,
    exclude: &globset::GlobSet,
    mut read_module_name: impl FnMut(&Path) -> Option<String>,
) -> Vec<ManifestRoot> {
    let mut roots = Vec::new();
    for entry in walkdir::WalkDir::new(repo_root)
        .into_iter()
        .filter_entry(|e| {
            let rel = e.path().strip_prefix(repo_root).unwrap_or(e.path());
            !exclude.is_match(rel)
        })
        .filter_map(|e| e.ok())
    {
        if entry.file_name() == manifest_name {
            let dir = entry.path().parent().unwrap_or(repo_root);
            let relative_dir = dir.strip_prefix(repo_root).unwrap_or(dir).to_path_buf();
            if let Some(module_name) = read_module_name(entry.path()) {
                roots.push(ManifestRoot {
                    module_name,
                    relative_dir,
                });
            }
        }
    }
    roots.sort_by_key(|r| std::cmp::Reverse(r.relative_dir.as_os_str().len()));
    roots
}

/// The manifest root (if any) that owns `file_path`, i.e. the deepest
/// root whose directory is a prefix of the file's directory.
pub fn owning_root<'a>(roots: &'a [ManifestRoot], file_relative_path: &Path) -> Option<&'a ManifestRoot> {
    roots
        .iter()
        .find(|r| file_relative_path.starts_with(&r.relative_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owning_root_prefers_most_specific() {
        let roots = vec![
            ManifestRoot {
                module_name: "outer".into(),
                relative_dir: PathBuf::from(""),
            },
            ManifestRoot {
                module_name: "inner".into(),
                relative_dir: PathBuf::from("vendor/sub"),
            },
        ];
        let mut sorted = roots.clone();
        sorted.sort_by_key(|r| std::cmp::Reverse(r.relative_dir.as_os_str().len()));
        let found = owning_root(&sorted, Path::new("vendor/sub/file.go")).unwrap();
        assert_eq!(found.module_name, "inner");
    }
}
