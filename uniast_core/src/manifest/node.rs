//! `package.json`/`tsconfig.json` manifest reading and workspace-glob
//! expansion for the ECMAScript-family front-end.

use std::path::{Path, PathBuf};

use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct PackageJson {
    pub name: String,
    pub main: Option<String>,
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
    /// `workspaces` globs, when this manifest is a monorepo root.
    pub workspaces: Vec<String>,
}

pub fn parse_package_json(content: &str) -> Result<PackageJson, serde_json::Error> {
    let value: Value = serde_json::from_str(content)?;
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let main = value.get("main").and_then(Value::as_str).map(str::to_string);
    let dependencies = string_keys(value.get("dependencies"));
    let dev_dependencies = string_keys(value.get("devDependencies"));
    let workspaces = match value.get("workspaces") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::Object(obj)) => obj
            .get("packages")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    Ok(PackageJson {
        name,
        main,
        dependencies,
        dev_dependencies,
        workspaces,
    })
}

fn string_keys(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Object(obj)) => obj.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

/// `tsconfig.json`'s `compilerOptions.rootDir`/`outDir`, used by
/// discovery to find source directories before falling back to
/// `src`/`lib`.
#[derive(Debug, Clone, Default)]
pub struct TsConfig {
    pub root_dir: Option<String>,
    pub out_dir: Option<String>,
}

pub fn parse_tsconfig(content: &str) -> Result<TsConfig, serde_json::Error> {
    // tsconfig.json commonly carries `//`-style comments and trailing
    // commas; strip line comments defensively before handing it to a
    // strict JSON parser rather than pulling in a JSONC crate for two
    // fields.
    let stripped: String = content
        .lines()
        .map(|line| {
            if let Some(idx) = find_unquoted_comment(line) {
                &line[..idx]
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    let value: Value = serde_json::from_str(&stripped)?;
    let opts = value.get("compilerOptions");
    Ok(TsConfig {
        root_dir: opts
            .and_then(|o| o.get("rootDir"))
            .and_then(Value::as_str)
            .map(str::to_string),
        out_dir: opts
            .and_then(|o| o.get("outDir"))
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn find_unquoted_comment(line: &str) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'/' if !in_string && i + 1 < bytes.len() && bytes[i + 1] == b'/' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Resolves a `workspaces` glob list against the repo root, returning
/// the set of directories that contain their own `package.json`.
pub fn expand_workspace_globs(repo_root: &Path, globs: &[String]) -> Vec<PathBuf> {
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in globs {
        if let Ok(glob) = globset::Glob::new(pattern) {
            builder.add(glob);
        }
    }
    let Ok(set) = builder.build() else {
        return Vec::new();
    };
    let mut dirs = Vec::new();
    for entry in walkdir::WalkDir::new(repo_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        let rel = entry.path().strip_prefix(repo_root).unwrap_or(entry.path());
        if set.is_match(rel) && entry.path().join("package.json").is_file() {
            dirs.push(rel.to_path_buf());
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_dependencies() {
        let pkg = parse_package_json(
            r#"{"name":"@acme/a","dependencies":{"lodash":"^4.0.0"},"devDependencies":{"jest":"^29"}}"#,
        )
        .unwrap();
        assert_eq!(pkg.name, "@acme/a");
        assert_eq!(pkg.dependencies, vec!["lodash".to_string()]);
        assert_eq!(pkg.dev_dependencies, vec!["jest".to_string()]);
    }

    #[test]
    fn parses_workspaces_array_and_object_forms() {
        let array_form = parse_package_json(r#"{"name":"root","workspaces":["packages/*"]}"#).unwrap();
        assert_eq!(array_form.workspaces, vec!["packages/*".to_string()]);

        let object_form =
            parse_package_json(r#"{"name":"root","workspaces":{"packages":["packages/*","apps/*"]}}"#).unwrap();
        assert_eq!(object_form.workspaces.len(), 2);
    }

    #[test]
    fn tsconfig_strips_line_comments_before_parsing() {
        let cfg = parse_tsconfig(
            "{\n  // root comment\n  \"compilerOptions\": { \"rootDir\": \"src\", \"outDir\": \"dist\" }\n}\n",
        )
        .unwrap();
        assert_eq!(cfg.root_dir.as_deref(), Some("src"));
        assert_eq!(cfg.out_dir.as_deref(), Some("dist"));
    }
}
