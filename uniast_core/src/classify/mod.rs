//! Import classifier (§4.3): splits a file's raw import list into
//! `Std`/`Project`/`ThirdParty` buckets keyed by the alias visible
//! inside that file.

use std::collections::HashMap;

use crate::identity::is_stdlib_package;

#[derive(Debug, Clone)]
pub struct RawImport {
    pub path: String,
    pub explicit_alias: Option<String>,
    /// True when discovery has flagged this import path as
    /// generator-output; such imports are external by policy even when
    /// textually inside the current module.
    pub is_generator_output: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClassifiedImports {
    pub std: HashMap<String, String>,
    pub project: HashMap<String, String>,
    /// alias -> (external module key, import path)
    pub third_party: HashMap<String, (String, String)>,
}

/// Strips a trailing major-version suffix (`/v2`, `/v10`) the way Go
/// module paths encode breaking-change versions, so the default alias
/// matches the package's actual exported name.
fn strip_version_suffix(last_segment: &str) -> &str {
    if let Some(rest) = last_segment.strip_prefix('v') {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
            return "";
        }
    }
    last_segment
}

pub(crate) fn default_alias(path: &str) -> String {
    let last = path.rsplit('/').next().unwrap_or(path);
    let stripped = strip_version_suffix(last);
    if stripped.is_empty() {
        // The import path's own last segment was purely a version
        // marker (`.../v2`); fall back to the segment before it.
        let mut segs: Vec<&str> = path.split('/').collect();
        segs.pop();
        segs.pop();
        segs.last().copied().unwrap_or(path).to_string()
    } else {
        stripped.to_string()
    }
}

pub fn classify_imports(imports: &[RawImport], current_module: &str) -> ClassifiedImports {
    let mut out = ClassifiedImports::default();
    for import in imports {
        let alias = import
            .explicit_alias
            .clone()
            .unwrap_or_else(|| default_alias(&import.path));

        if import.is_generator_output {
            out.third_party.insert(alias, (import.path.clone(), import.path.clone()));
            continue;
        }
        if is_stdlib_package(&import.path) {
            out.std.insert(alias, import.path.clone());
        } else if import.path == current_module || import.path.starts_with(&format!("{current_module}/")) {
            out.project.insert(alias, import.path.clone());
        } else {
            out.third_party.insert(alias, (import.path.clone(), import.path.clone()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_alias_is_last_segment() {
        assert_eq!(default_alias("github.com/acme/widget"), "widget");
    }

    #[test]
    fn default_alias_strips_version_suffix() {
        assert_eq!(default_alias("github.com/acme/widget/v2"), "widget");
    }

    #[test]
    fn explicit_alias_overrides_default() {
        let imports = vec![RawImport {
            path: "github.com/acme/widget".into(),
            explicit_alias: Some("w".into()),
            is_generator_output: false,
        }];
        let classified = classify_imports(&imports, "example.com/app");
        assert!(classified.third_party.contains_key("w"));
    }

    #[test]
    fn project_imports_require_module_prefix_boundary() {
        let imports = vec![
            RawImport {
                path: "example.com/app/sub".into(),
                explicit_alias: None,
                is_generator_output: false,
            },
            RawImport {
                path: "example.com/appendix".into(),
                explicit_alias: None,
                is_generator_output: false,
            },
        ];
        let classified = classify_imports(&imports, "example.com/app");
        assert!(classified.project.contains_key("sub"));
        assert!(classified.third_party.contains_key("appendix"));
    }

    #[test]
    fn generator_output_is_external_even_inside_module() {
        let imports = vec![RawImport {
            path: "example.com/app/gen".into(),
            explicit_alias: None,
            is_generator_output: true,
        }];
        let classified = classify_imports(&imports, "example.com/app");
        assert!(classified.third_party.contains_key("gen"));
        assert!(!classified.project.contains_key("gen"));
    }

    #[test]
    fn stdlib_import_is_classified_std() {
        let imports = vec![RawImport {
            path: "encoding/json".into(),
            explicit_alias: None,
            is_generator_output: false,
        }];
        let classified = classify_imports(&imports, "example.com/app");
        assert!(classified.std.contains_key("json"));
    }
}
