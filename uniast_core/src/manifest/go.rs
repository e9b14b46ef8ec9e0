//! `go.mod` parsing and the `go list -json -deps` dependency enumeration
//! used by the compiled-typed front-end's discovery step.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

/// The module declaration line plus a handful of `require` entries;
/// `go.mod` is not TOML/JSON, so this is a small line-oriented reader
/// rather than a full parser — the checker bridge is the source of
/// truth for anything beyond module identity and direct dependencies.
#[derive(Debug, Clone, Default)]
pub struct GoMod {
    pub module_path: String,
    pub go_version: Option<String>,
    pub requires: Vec<GoRequire>,
}

#[derive(Debug, Clone)]
pub struct GoRequire {
    pub path: String,
    pub version: String,
    pub indirect: bool,
}

pub fn parse_go_mod(content: &str) -> GoMod {
    let mut gomod = GoMod::default();
    let mut in_require_block = false;
    for raw_line in content.lines() {
        let line = raw_line.split("//").next().unwrap_or(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("module ") {
            gomod.module_path = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("go ") {
            gomod.go_version = Some(rest.trim().to_string());
        } else if line == "require (" {
            in_require_block = true;
        } else if in_require_block && line == ")" {
            in_require_block = false;
        } else if in_require_block || line.starts_with("require ") {
            let body = line.strip_prefix("require ").unwrap_or(line);
            if let Some(req) = parse_require_entry(body) {
                gomod.requires.push(req);
            }
        }
    }
    gomod
}

fn parse_require_entry(body: &str) -> Option<GoRequire> {
    let indirect = body.trim_end().ends_with("// indirect");
    let body = body.split("//").next().unwrap_or(body).trim();
    let mut parts = body.split_whitespace();
    let path = parts.next()?.to_string();
    let version = parts.next()?.to_string();
    Some(GoRequire { path, version, indirect })
}

/// One record from `go list -json -deps`: enough of the schema to drive
/// package/dependency discovery. Replacement and local-vs-versioned
/// resolution surface through `replace` when present.
#[derive(Debug, Clone, Deserialize)]
pub struct GoListPackage {
    #[serde(rename = "ImportPath")]
    pub import_path: String,
    #[serde(rename = "Dir")]
    pub dir: Option<String>,
    #[serde(rename = "Module")]
    pub module: Option<GoListModule>,
    #[serde(rename = "GoFiles", default)]
    pub go_files: Vec<String>,
    #[serde(rename = "TestGoFiles", default)]
    pub test_go_files: Vec<String>,
    #[serde(rename = "Deps", default)]
    pub deps: Vec<String>,
    #[serde(rename = "Standard", default)]
    pub standard: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoListModule {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Version")]
    pub version: Option<String>,
    #[serde(rename = "Replace")]
    pub replace: Option<Box<GoListModule>>,
}

/// Invokes `go list -json -deps ./...` in `module_dir` and parses the
/// resulting stream of concatenated JSON objects (one per package, not
/// wrapped in an array — `go list -json` emits a value stream).
pub fn list_all_packages(module_dir: &Path) -> Result<Vec<GoListPackage>, crate::errors::IndexError> {
    let output = Command::new("go")
        .args(["list", "-json", "-deps", "./..."])
        .current_dir(module_dir)
        .output()
        .map_err(|e| crate::errors::IndexError::PackageLoadFailed {
            pkg_path: module_dir.display().to_string(),
            underlying: format!("failed to spawn `go list`: {e}"),
        })?;

    if !output.status.success() {
        return Err(crate::errors::IndexError::PackageLoadFailed {
            pkg_path: module_dir.display().to_string(),
            underlying: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    parse_go_list_stream(&output.stdout)
}

fn parse_go_list_stream(bytes: &[u8]) -> Result<Vec<GoListPackage>, crate::errors::IndexError> {
    let text = String::from_utf8_lossy(bytes);
    let mut de = serde_json::Deserializer::from_str(&text).into_iter::<GoListPackage>();
    let mut packages = Vec::new();
    for item in &mut de {
        match item {
            Ok(pkg) => packages.push(pkg),
            Err(e) => {
                return Err(crate::errors::IndexError::PackageLoadFailed {
                    pkg_path: "go list".to_string(),
                    underlying: e.to_string(),
                })
            }
        }
    }
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_module_path_and_go_version() {
        let gomod = parse_go_mod(
            "module example.com/widget\n\ngo 1.22\n\nrequire (\n\tgithub.com/acme/lib v1.2.3\n\tgithub.com/acme/other v0.0.1 // indirect\n)\n",
        );
        assert_eq!(gomod.module_path, "example.com/widget");
        assert_eq!(gomod.go_version.as_deref(), Some("1.22"));
        assert_eq!(gomod.requires.len(), 2);
        assert!(!gomod.requires[0].indirect);
        assert!(gomod.requires[1].indirect);
    }

    #[test]
    fn parses_single_line_require() {
        let gomod = parse_go_mod("module m\ngo 1.21\nrequire github.com/acme/lib v1.0.0\n");
        assert_eq!(gomod.requires.len(), 1);
        assert_eq!(gomod.requires[0].path, "github.com/acme/lib");
    }

    #[test]
    fn parses_concatenated_json_stream() {
        let stream = r#"{"ImportPath":"a","Dir":"/a","Standard":true}{"ImportPath":"b","Dir":"/b","Deps":["a"]}"#;
        let packages = parse_go_list_stream(stream.as_bytes()).unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[1].deps, vec!["a".to_string()]);
    }
}
