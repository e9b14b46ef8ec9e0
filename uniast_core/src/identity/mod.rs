//! The `Identity` triple and the path-classification rules that decide
//! whether a given identity is external to the module currently being
//! lowered, or belongs to the standard library.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// `(ModPath, PkgPath, Name)` — uniquely names one declaration anywhere
/// reachable from the repository. Empty `mod_path` is reserved for
/// built-in/primitive names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "ModPath")]
    pub mod_path: String,
    #[serde(rename = "PkgPath")]
    pub pkg_path: String,
    #[serde(rename = "Name")]
    pub name: String,
}

impl Identity {
    pub fn new(mod_path: impl Into<String>, pkg_path: impl Into<String>, name: impl Into<String>) -> Self {
        Identity {
            mod_path: mod_path.into(),
            pkg_path: pkg_path.into(),
            name: name.into(),
        }
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        Identity::new("", "", name)
    }

    /// `mod?pkg#name`, the key shape used by `Repository::Graph`.
    pub fn full(&self) -> String {
        format!("{}?{}#{}", self.mod_path, self.pkg_path, self.name)
    }

    /// Last package segment plus the declaration name, for short
    /// human-facing labels (diagnostics, worker progress lines).
    pub fn call_name(&self) -> String {
        let last_seg = self.pkg_path.rsplit(['/', '.']).next().unwrap_or(&self.pkg_path);
        if last_seg.is_empty() {
            self.name.clone()
        } else {
            format!("{last_seg}.{}", self.name)
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.mod_path.is_empty()
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full())
    }
}

/// An identity is external to `current_module` when its module differs,
/// its module key carries a version delimiter (`@`), or its package
/// path matches one of the caller-supplied generator-output patterns
/// (the same exclusion mechanism used for discovery, fed through here
/// so generated code is always treated as a transclusion boundary
/// rather than first-party source).
pub fn is_external(id: &Identity, current_module: &str, generator_patterns: &[regex::Regex]) -> bool {
    if id.is_builtin() {
        return false;
    }
    if id.mod_path != current_module {
        return true;
    }
    if id.mod_path.contains('@') {
        return true;
    }
    generator_patterns.iter().any(|re| re.is_match(&id.pkg_path))
}

/// Standard-library packages are recognised by the "no dot in the first
/// path component" rule, with results cached in a process-local LRU so
/// repeated lookups for common imports (`fmt`, `strings`, `os`) don't
/// re-walk the string each time. Capacity matches the resource model's
/// 10,000-entry bound.
const STDLIB_LRU_CAPACITY: usize = 10_000;

struct StdlibCache {
    entries: HashMap<String, bool>,
    order: VecDeque<String>,
}

impl StdlibCache {
    fn new() -> Self {
        StdlibCache {
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get_or_compute(&mut self, pkg_path: &str) -> bool {
        if let Some(&hit) = self.entries.get(pkg_path) {
            return hit;
        }
        let first_seg = pkg_path.split('/').next().unwrap_or(pkg_path);
        let value = !first_seg.contains('.');
        if self.order.len() >= STDLIB_LRU_CAPACITY {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
        self.entries.insert(pkg_path.to_string(), value);
        self.order.push_back(pkg_path.to_string());
        value
    }
}

static STDLIB_CACHE: Lazy<Mutex<StdlibCache>> = Lazy::new(|| Mutex::new(StdlibCache::new()));

/// True when `pkg_path`'s first path segment contains no `.`, the
/// heuristic both shipped front-ends use to recognise standard-library
/// imports. Result is memoised in a process-wide, mutex-guarded LRU.
pub fn is_stdlib_package(pkg_path: &str) -> bool {
    STDLIB_CACHE.lock().expect("stdlib cache poisoned").get_or_compute(pkg_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_and_call_name() {
        let id = Identity::new("a.b/c", "a.b/c/pkg", "S.Hello");
        assert_eq!(id.full(), "a.b/c?a.b/c/pkg#S.Hello");
        assert_eq!(id.call_name(), "pkg.S.Hello");
    }

    #[test]
    fn builtin_identity_is_never_external() {
        let id = Identity::builtin("string");
        assert!(!is_external(&id, "a.b/c", &[]));
    }

    #[test]
    fn versioned_module_key_is_external() {
        let id = Identity::new("ext.com/lib@v2", "ext.com/lib", "Config");
        assert!(is_external(&id, "ext.com/lib@v2", &[]));
    }

    #[test]
    fn stdlib_detection_by_dotless_first_segment() {
        assert!(is_stdlib_package("fmt"));
        assert!(is_stdlib_package("encoding/json"));
        assert!(!is_stdlib_package("github.com/acme/widget"));
    }
}
